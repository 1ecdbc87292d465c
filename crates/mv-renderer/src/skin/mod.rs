//! Vertex skinning.
//!
//! [`cache::SkinCache`] turns per-bone weighted mesh batches into renderable
//! vertex records; [`region::RegionMarker`] remembers which cache ranges
//! carry normals so corner data can inherit that across batches.

mod cache;
mod region;

pub use cache::*;
pub use region::*;
