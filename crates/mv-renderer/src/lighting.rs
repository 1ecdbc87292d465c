//! Directional lighting.

use glam::Vec3;
use mv_core::Color;
use serde::{Deserialize, Serialize};

/// Number of light slots published to shaders.
pub const LIGHT_COUNT: usize = 4;

/// One directional light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    /// Direction the light travels, world space.
    pub direction: Vec3,
    pub diffuse: Color,
    pub diffuse_intensity: f32,
    pub ambient: Color,
    pub ambient_intensity: f32,
}

impl Light {
    pub fn new(
        direction: Vec3,
        diffuse_intensity: f32,
        diffuse: Color,
        ambient_intensity: f32,
        ambient: Color,
    ) -> Self {
        Self {
            direction,
            diffuse,
            diffuse_intensity,
            ambient,
            ambient_intensity,
        }
    }

    /// A light contributing nothing.
    pub fn off() -> Self {
        Self::new(Vec3::Y, 0.0, Color::BLACK, 0.0, Color::BLACK)
    }
}

/// The default light array: one white key light from above, the remaining
/// slots off.
pub fn default_lights() -> [Light; LIGHT_COUNT] {
    [
        Light::new(
            Vec3::Y,
            1.0,
            Color::rgb(0xFF, 0xFF, 0xFF),
            1.0,
            Color::rgb(0x40, 0x40, 0x40),
        ),
        Light::off(),
        Light::off(),
        Light::off(),
    ]
}
