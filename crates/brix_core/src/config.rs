//! Library configuration and the per-session read-only state.
//!
//! Configuration comes from a JSON file or from the environment:
//!
//! - `LDRAW_LIB`: LDraw library root (required)
//! - `BRIX_OVERRIDES`: local override root, searched last
//! - `BRIX_COLORS`: JSON color table; defaults to `<root>/LDConfig.ldr`
//! - `BRIX_COLOR_OVERRIDES`: JSON table merged on top

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::builder::{BuildOptions, GeometryBuilder};
use crate::color::{BaseMaterial, ColorError, ColorResolver, ColorTable};
use crate::library::{LibraryLayout, PartLocator};

pub const ENV_LIBRARY: &str = "LDRAW_LIB";
pub const ENV_OVERRIDES: &str = "BRIX_OVERRIDES";
pub const ENV_COLORS: &str = "BRIX_COLORS";
pub const ENV_COLOR_OVERRIDES: &str = "BRIX_COLOR_OVERRIDES";

/// Errors that can occur while loading configuration or opening a session.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("LDraw library root {0} is not a directory")]
    MissingRoot(PathBuf),

    #[error("Color table error: {0}")]
    Color(#[from] ColorError),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the library and color tables live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// LDraw library root
    pub ldraw_root: PathBuf,

    /// Local last-resort root for helper parts and the placeholder
    #[serde(default)]
    pub overrides_root: Option<PathBuf>,

    /// JSON color table; `LDConfig.ldr` in the library root when absent
    #[serde(default)]
    pub colors: Option<PathBuf>,

    /// Curated corrections merged over the color table
    #[serde(default)]
    pub color_overrides: Option<PathBuf>,
}

impl LibraryConfig {
    pub fn new(ldraw_root: impl Into<PathBuf>) -> Self {
        Self {
            ldraw_root: ldraw_root.into(),
            overrides_root: None,
            colors: None,
            color_overrides: None,
        }
    }

    /// Read a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build the configuration from environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        let root = std::env::var_os(ENV_LIBRARY).ok_or(ConfigError::MissingEnv(ENV_LIBRARY))?;
        let optional = |name: &str| std::env::var_os(name).map(PathBuf::from);

        Ok(Self {
            ldraw_root: PathBuf::from(root),
            overrides_root: optional(ENV_OVERRIDES),
            colors: optional(ENV_COLORS),
            color_overrides: optional(ENV_COLOR_OVERRIDES),
        })
    }

    /// Load the color tables and open a session.
    pub fn open(&self) -> ConfigResult<Session> {
        if !self.ldraw_root.is_dir() {
            return Err(ConfigError::MissingRoot(self.ldraw_root.clone()));
        }

        let mut colors = match &self.colors {
            Some(path) => ColorTable::load_json(path)?,
            None => ColorTable::load_ldconfig(self.ldraw_root.join("LDConfig.ldr"))?,
        };
        if let Some(path) = &self.color_overrides {
            let overrides = ColorTable::load_json(path)?;
            log::debug!("Merging {} color overrides", overrides.len());
            colors.merge(&overrides);
        }

        let layout = LibraryLayout::new(&self.ldraw_root, self.overrides_root.clone());
        log::info!(
            "Opened LDraw library at {} with {} colors",
            self.ldraw_root.display(),
            colors.len()
        );
        Ok(Session::new(layout, colors))
    }
}

/// Everything that stays fixed for the lifetime of an engine session.
#[derive(Clone, Debug)]
pub struct Session {
    locator: PartLocator,
    colors: ColorTable,
}

impl Session {
    pub fn new(layout: LibraryLayout, colors: ColorTable) -> Self {
        Self {
            locator: PartLocator::new(layout),
            colors,
        }
    }

    pub fn layout(&self) -> &LibraryLayout {
        self.locator.layout()
    }

    pub fn locator(&self) -> &PartLocator {
        &self.locator
    }

    pub fn colors(&self) -> &ColorTable {
        &self.colors
    }

    /// Color resolver with `material_code` as the base material.
    pub fn resolver(&self, material_code: u32) -> ColorResolver<'_> {
        ColorResolver::new(&self.colors, BaseMaterial::from_table(&self.colors, material_code))
    }

    pub fn builder(&self, options: BuildOptions, material_code: u32) -> GeometryBuilder<'_> {
        GeometryBuilder::new(&self.locator, self.resolver(material_code), options)
    }
}
