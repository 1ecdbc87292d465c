//! Global render settings and wireframe modes.

use serde::{Deserialize, Serialize};

/// Global rendering settings, published to shaders once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Disable lighting as a whole.
    pub disable_lighting: bool,
    /// Disable specular lighting.
    pub disable_specular: bool,
    /// Ignore the material ambient color.
    pub disable_surface_ambient: bool,
    /// Disable backface culling regardless of material flags.
    pub disable_backface_culling: bool,
    /// Value subtracted from surface alpha, for reflection or blur effects.
    /// Must be >= 0; surfaces become force-transparent when it is positive.
    pub transparency_subtract: f32,
}

/// Ways to display model wireframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WireframeMode {
    /// No wireframe shown.
    #[default]
    None,
    /// Layers the wireframe over the filled polygons.
    Overlay,
    /// Replaces polygons with outlines.
    ReplaceLine,
    /// Replaces polygons with points.
    ReplacePoint,
}
