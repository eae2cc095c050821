//! Entities module - composition data and the pure math derived from it
//!
//! - `composition` - host snapshot (Composition, LayerRecord)
//! - `grid` - tempo/duration -> beat grid
//! - `geometry` - per-layer placement on the grid and its transforms

pub mod composition;
pub mod geometry;
pub mod grid;

pub use composition::{Composition, LayerRecord};
pub use geometry::{derive_geometry, derive_on_grid, DragEdge, GeometryError, LayerGeometry};
pub use grid::{compute_grid, GridInputs, GridParameters};
