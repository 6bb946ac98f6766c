//! Brix Core - LDraw part resolution and geometry building.
//!
//! This crate provides:
//!
//! - **Library access**: part lookup across the official, unofficial and override roots
//! - **Colors**: the LDraw color table and code-16 inheritance
//! - **Geometry building**: recursive part walking with BFC winding and a subpart cache
//! - **Documents**: MPD splitting, unofficial part materialization and model loading
//! - **Scene assembly**: unique part prototypes plus per-placement instances
//!
//! # Example
//!
//! ```ignore
//! use brix_core::{LibraryConfig, LoadOptions, Model, SceneBuilder};
//!
//! let session = LibraryConfig::from_env()?.open()?;
//! let model = Model::load(&session, "castle.mpd", &LoadOptions::default())?;
//! let scene = SceneBuilder::new(&session).build(&model)?;
//! println!("Loaded {} prototypes, {} instances",
//!     scene.prototype_count(),
//!     scene.instance_count());
//! ```

pub mod builder;
pub mod cache;
pub mod color;
pub mod config;
pub mod diagnostics;
pub mod fragment;
pub mod library;
pub mod line;
pub mod model;
pub mod mpd;
pub mod part;
pub mod scene;
pub mod winding;

// Re-export commonly used types
pub use builder::{BuildContext, BuildError, BuildOptions, BuildResult, GeometryBuilder};
pub use cache::{CacheKey, SubpartCache};
pub use color::{BaseMaterial, ColorEntry, ColorResolver, ColorSource, ColorTable, ColorToken, ResolvedColor};
pub use config::{ConfigError, LibraryConfig, Session};
pub use diagnostics::{Diagnostic, Diagnostics};
pub use fragment::{GeometryFragment, Polygon, PolygonKind, Provenance};
pub use library::{LibraryLayout, PartKind, PartLocator, ResolvedPart};
pub use line::{classify, LineRecord, MetaCommand};
pub use model::{LoadError, LoadOptions, Model, Placement};
pub use mpd::{MpdDocument, Segment};
pub use part::{build_part, PartMesh, PartName, PartOptions, PrintMode};
pub use scene::{Instance, Prototype, Scene, SceneBuilder};
pub use winding::Winding;
