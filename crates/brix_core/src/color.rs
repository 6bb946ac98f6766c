//! LDraw color table and color-token resolution.
//!
//! The table maps an LDraw color code to a category, a name and a linear
//! RGB value in the working color space (ACEScg). It can be read from the
//! pre-converted JSON resource or straight from the community `LDConfig.ldr`,
//! and a curated override table can be merged on top.
//!
//! Category ordinals are positions in first-seen order, so every table source
//! keeps document order.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use brix_math::Vec3;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// The "inherit from whoever instanced me" color code.
pub const AMBIENT_CODE: u32 = 16;

/// Effective code recorded for direct (inline hex) colors.
pub const DIRECT_COLOR_CODE: u32 = 0;

/// Color used for anything that cannot be resolved. Loud on purpose.
pub const ERROR_COLOR: Vec3 = Vec3::new(1.0, 0.0, 0.5);

/// Errors that can occur while loading a color table.
#[derive(Error, Debug)]
pub enum ColorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LDConfig error at line {line}: {message}")]
    Ldconfig { line: usize, message: String },
}

/// Result type for color table operations.
pub type ColorResult<T> = Result<T, ColorError>;

/// One row of the color table.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorEntry {
    pub code: u32,
    pub category: String,
    pub name: String,
    /// Linear RGB in the working color space
    pub rgb: Vec3,
}

/// On-disk shape of a table row: `"4": {"category": ..., "name": ..., "rgb": [r, g, b]}`.
#[derive(Serialize, Deserialize)]
struct ColorRecord {
    category: String,
    name: String,
    rgb: [f32; 3],
}

/// Immutable lookup from color code to [`ColorEntry`].
#[derive(Clone, Debug, Default)]
pub struct ColorTable {
    entries: Vec<ColorEntry>,
    by_code: HashMap<u32, usize>,
    categories: Vec<String>,
    category_index: HashMap<String, usize>,
}

impl ColorTable {
    /// Build a table from entries in document order. Later duplicates replace earlier ones.
    pub fn from_entries(entries: impl IntoIterator<Item = ColorEntry>) -> Self {
        let mut table = Self::default();
        for entry in entries {
            table.upsert(entry);
        }
        table.reindex_categories();
        table
    }

    /// Parse the JSON color table.
    pub fn from_json_str(json: &str) -> ColorResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load the JSON color table from disk.
    pub fn load_json<P: AsRef<Path>>(path: P) -> ColorResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_json_str(&content)?;
        log::debug!(
            "Loaded {} colors in {} categories from {}",
            table.len(),
            table.categories.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// Parse an `LDConfig.ldr` color configuration.
    ///
    /// Category headers look like `0 // LDraw Solid Colours` and entries like
    /// `0 !COLOUR Black CODE 0 VALUE #1B2A34 EDGE #808080`.
    pub fn from_ldconfig_str(content: &str) -> ColorResult<Self> {
        let mut entries = Vec::new();
        let mut current_category = String::new();

        for (index, line) in content.lines().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() < 3 || tokens[0] != "0" {
                continue;
            }

            if tokens[1] == "//"
                && tokens.len() >= 5
                && tokens[2] == "LDraw"
                && tokens[tokens.len() - 1] == "Colours"
            {
                current_category = tokens[3..tokens.len() - 1].join(" ");
                continue;
            }

            if tokens[1] != "!COLOUR" || tokens.len() < 7 || tokens[3] != "CODE" || tokens[5] != "VALUE" {
                continue;
            }

            let Ok(code) = tokens[4].parse::<u32>() else {
                continue;
            };

            let hex = tokens[6].trim_start_matches('#');
            let rgb = hex_to_working_rgb(hex).ok_or_else(|| ColorError::Ldconfig {
                line: index + 1,
                message: format!("invalid color value '{}'", tokens[6]),
            })?;

            entries.push(ColorEntry {
                code,
                category: current_category.clone(),
                name: tokens[2].to_string(),
                rgb,
            });
        }

        Ok(Self::from_entries(entries))
    }

    /// Load an `LDConfig.ldr` from disk.
    pub fn load_ldconfig<P: AsRef<Path>>(path: P) -> ColorResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_ldconfig_str(&String::from_utf8_lossy(&bytes))
    }

    /// Serialize the table back to JSON, preserving order.
    pub fn to_json_string(&self) -> ColorResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Overlay another table: existing codes are replaced in place, new codes appended.
    pub fn merge(&mut self, overrides: &ColorTable) {
        for entry in &overrides.entries {
            self.upsert(entry.clone());
        }
        self.reindex_categories();
    }

    /// Look up a color code.
    pub fn get(&self, code: u32) -> Option<&ColorEntry> {
        self.by_code.get(&code).map(|&i| &self.entries[i])
    }

    /// Ordinal of a category name in first-seen order.
    pub fn category_index(&self, category: &str) -> Option<usize> {
        self.category_index.get(category).copied()
    }

    /// Category ordinal of a color code.
    pub fn category_of(&self, code: u32) -> Option<usize> {
        self.get(code).and_then(|entry| self.category_index(&entry.category))
    }

    /// All categories in first-seen order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColorEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn upsert(&mut self, entry: ColorEntry) {
        if let Some(&i) = self.by_code.get(&entry.code) {
            self.entries[i] = entry;
        } else {
            self.by_code.insert(entry.code, self.entries.len());
            self.entries.push(entry);
        }
    }

    fn reindex_categories(&mut self) {
        self.categories.clear();
        self.category_index.clear();
        for entry in &self.entries {
            if !self.category_index.contains_key(&entry.category) {
                self.category_index
                    .insert(entry.category.clone(), self.categories.len());
                self.categories.push(entry.category.clone());
            }
        }
    }
}

impl Serialize for ColorTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            let record = ColorRecord {
                category: entry.category.clone(),
                name: entry.name.clone(),
                rgb: entry.rgb.to_array(),
            };
            map.serialize_entry(&entry.code.to_string(), &record)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ColorTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = ColorTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from color code to {category, name, rgb}")
            }

            // Visiting the map directly keeps document order, which category ordinals depend on.
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ColorTable, A::Error> {
                let mut entries = Vec::new();
                while let Some((key, record)) = access.next_entry::<String, ColorRecord>()? {
                    let code = key
                        .trim()
                        .parse::<u32>()
                        .map_err(|_| de::Error::custom(format!("invalid color code '{}'", key)))?;
                    entries.push(ColorEntry {
                        code,
                        category: record.category,
                        name: record.name,
                        rgb: Vec3::from_array(record.rgb),
                    });
                }
                Ok(ColorTable::from_entries(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

/// A color field as written in a part file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColorToken {
    /// Code 16: inherit the instancing context's color
    #[default]
    Ambient,

    /// A color table code
    Code(u32),

    /// Inline color `0x2RRGGBB`, stored as the six hex digits
    Direct(String),

    /// Anything else; resolves to [`ERROR_COLOR`]
    Invalid(String),
}

impl ColorToken {
    /// Classify a raw color field.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();

        if let Some(rest) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
            return match rest.strip_prefix('2') {
                Some(hex) if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
                    ColorToken::Direct(hex.to_ascii_uppercase())
                }
                _ => ColorToken::Invalid(token.to_string()),
            };
        }

        match token.parse::<u32>() {
            Ok(code) => Self::from_code(code),
            Err(_) => ColorToken::Invalid(token.to_string()),
        }
    }

    /// Token for a numeric code; 16 becomes [`ColorToken::Ambient`].
    pub fn from_code(code: u32) -> Self {
        if code == AMBIENT_CODE {
            ColorToken::Ambient
        } else {
            ColorToken::Code(code)
        }
    }

    pub fn is_ambient(&self) -> bool {
        matches!(self, ColorToken::Ambient)
    }

    /// The ambient context a child inherits when referenced with this token.
    pub fn inherit(&self, ambient: &ColorToken) -> ColorToken {
        if self.is_ambient() {
            ambient.clone()
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for ColorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorToken::Ambient => write!(f, "{}", AMBIENT_CODE),
            ColorToken::Code(code) => write!(f, "{}", code),
            ColorToken::Direct(hex) => write!(f, "0x2{}", hex),
            ColorToken::Invalid(raw) => f.write_str(raw),
        }
    }
}

/// Where a resolved color came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSource {
    /// Unpainted code 16 at the top: the caller's base material
    Base,
    /// A color table entry
    Table,
    /// An inline hex color
    Direct,
    /// Unknown code or malformed token
    Fallback,
}

/// Result of resolving a color token.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedColor {
    pub rgb: Vec3,
    /// True when the color came from an explicit code rather than inheritance
    pub is_static: bool,
    pub code: u32,
    /// Material category ordinal
    pub category: usize,
    pub source: ColorSource,
}

/// The material used for code 16 when nothing above paints it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BaseMaterial {
    pub code: u32,
    pub rgb: Vec3,
    pub category: usize,
}

impl BaseMaterial {
    /// Base material taken from a table entry. Unknown codes fall back to white.
    pub fn from_table(table: &ColorTable, code: u32) -> Self {
        match table.get(code) {
            Some(entry) => Self {
                code,
                rgb: entry.rgb,
                category: table.category_index(&entry.category).unwrap_or(0),
            },
            None => {
                log::warn!("Base material code {} not in color table, using white", code);
                Self {
                    code,
                    rgb: Vec3::ONE,
                    category: 0,
                }
            }
        }
    }
}

/// Resolves color tokens against a table and a base material.
#[derive(Clone, Copy, Debug)]
pub struct ColorResolver<'a> {
    table: &'a ColorTable,
    base: BaseMaterial,
}

impl<'a> ColorResolver<'a> {
    pub fn new(table: &'a ColorTable, base: BaseMaterial) -> Self {
        Self { table, base }
    }

    pub fn table(&self) -> &'a ColorTable {
        self.table
    }

    pub fn base(&self) -> BaseMaterial {
        self.base
    }

    /// Resolve `token` in a context whose current color is `ambient`.
    ///
    /// Code 16 defers to the ambient color; an ambient that is itself 16
    /// yields the base material and `is_static = false`.
    pub fn resolve(&self, token: &ColorToken, ambient: &ColorToken) -> ResolvedColor {
        match (token, ambient) {
            (ColorToken::Ambient, ColorToken::Ambient) => self.base_color(),
            (ColorToken::Ambient, painted) => self.resolve_explicit(painted),
            (explicit, _) => self.resolve_explicit(explicit),
        }
    }

    /// Convenience wrapper over raw tokens.
    pub fn resolve_str(&self, token: &str, ambient: &str) -> ResolvedColor {
        self.resolve(&ColorToken::parse(token), &ColorToken::parse(ambient))
    }

    fn base_color(&self) -> ResolvedColor {
        ResolvedColor {
            rgb: self.base.rgb,
            is_static: false,
            code: AMBIENT_CODE,
            category: self.base.category,
            source: ColorSource::Base,
        }
    }

    fn resolve_explicit(&self, token: &ColorToken) -> ResolvedColor {
        match token {
            ColorToken::Ambient => self.base_color(),
            ColorToken::Code(code) => match self.table.get(*code) {
                Some(entry) => ResolvedColor {
                    rgb: entry.rgb,
                    is_static: true,
                    code: *code,
                    category: self
                        .table
                        .category_index(&entry.category)
                        .unwrap_or(self.base.category),
                    source: ColorSource::Table,
                },
                None => self.fallback(*code),
            },
            ColorToken::Direct(hex) => match hex_to_working_rgb(hex) {
                Some(rgb) => ResolvedColor {
                    rgb,
                    is_static: true,
                    code: DIRECT_COLOR_CODE,
                    category: self.base.category,
                    source: ColorSource::Direct,
                },
                None => self.fallback(DIRECT_COLOR_CODE),
            },
            ColorToken::Invalid(_) => self.fallback(DIRECT_COLOR_CODE),
        }
    }

    fn fallback(&self, code: u32) -> ResolvedColor {
        ResolvedColor {
            rgb: ERROR_COLOR,
            is_static: true,
            code,
            category: self.base.category,
            source: ColorSource::Fallback,
        }
    }
}

/// Convert an sRGB channel in [0, 1] to linear.
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Linear sRGB (D65) to ACEScg, Bradford adapted.
const SRGB_TO_ACESCG: [[f32; 3]; 3] = [
    [0.613_132_4, 0.339_538, 0.047_416_7],
    [0.070_124_38, 0.916_394, 0.013_451_524],
    [0.020_587_658, 0.109_574_57, 0.869_785_4],
];

/// Convert six hex digits `RRGGBB` (sRGB) to the working linear space.
pub fn hex_to_working_rgb(hex: &str) -> Option<Vec3> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }

    let channel = |i: usize| -> Option<f32> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .ok()
            .map(|v| srgb_to_linear(v as f32 / 255.0))
    };
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);

    let m = &SRGB_TO_ACESCG;
    Some(Vec3::new(
        m[0][0] * r + m[0][1] * g + m[0][2] * b,
        m[1][0] * r + m[1][1] * g + m[1][2] * b,
        m[2][0] * r + m[2][1] * g + m[2][2] * b,
    ))
}
