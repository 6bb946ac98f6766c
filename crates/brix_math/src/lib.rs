// Re-export glam for convenience
pub use glam::*;

// BRIX math types
mod bounds;
mod transform;

pub use bounds::Bounds;
pub use transform::{ldraw_matrix, Mat4Ext};
