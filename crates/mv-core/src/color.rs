//! RGBA color with 8-bit channel storage.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use serde::{Deserialize, Serialize};

/// RGBA color stored as four 8-bit channels.
///
/// This is the storage format used in vertex colors and transparency
/// fragment records, so it is `Pod` and exactly 4 bytes.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::new(0xFF, 0xFF, 0xFF, 0xFF);
    pub const BLACK: Color = Color::new(0, 0, 0, 0xFF);
    pub const TRANSPARENT: Color = Color::new(0, 0, 0, 0);

    /// Creates a color from the given channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Creates an opaque color from the given RGB channels.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    /// Returns the color as a normalized float vector.
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        )
    }

    /// Creates a color from a normalized float vector.
    ///
    /// Channels are clamped to [0, 1] and rounded to the nearest 8-bit value.
    pub fn from_vec4(v: Vec4) -> Self {
        let quantize = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self {
            r: quantize(v.x),
            g: quantize(v.y),
            b: quantize(v.z),
            a: quantize(v.w),
        }
    }

    /// Packs the color into a little-endian u32 (r in the lowest byte).
    pub const fn to_u32(self) -> u32 {
        self.r as u32 | (self.g as u32) << 8 | (self.b as u32) << 16 | (self.a as u32) << 24
    }

    /// Unpacks a color from a little-endian u32.
    pub const fn from_u32(value: u32) -> Self {
        Self {
            r: value as u8,
            g: (value >> 8) as u8,
            b: (value >> 16) as u8,
            a: (value >> 24) as u8,
        }
    }

    /// Returns the same color with the given alpha channel.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self {
            r: self.r,
            g: self.g,
            b: self.b,
            a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_round_trip_is_exact_for_byte_values() {
        for value in [0u8, 1, 63, 127, 128, 200, 254, 255] {
            let color = Color::new(value, value, value, value);
            assert_eq!(Color::from_vec4(color.to_vec4()), color);
        }
    }

    #[test]
    fn u32_packing_round_trips() {
        let color = Color::new(0x12, 0x34, 0x56, 0x78);
        assert_eq!(color.to_u32(), 0x7856_3412);
        assert_eq!(Color::from_u32(color.to_u32()), color);
    }

    #[test]
    fn from_vec4_clamps() {
        let color = Color::from_vec4(Vec4::new(-1.0, 2.0, 0.5, 1.0));
        assert_eq!(color, Color::new(0, 255, 128, 255));
    }
}
