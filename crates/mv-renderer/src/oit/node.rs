//! Fragment list node format.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use mv_core::Color;

/// `next` value marking the end of a pixel's fragment list.
pub const FRAGMENT_LIST_NULL: u32 = u32::MAX;

/// Upper bound of resolvable fragments per pixel; the node pool is sized as
/// a fraction of `width * height * MAX_FRAGMENTS_PER_PIXEL`.
pub const MAX_FRAGMENTS_PER_PIXEL: u32 = 16;

/// One transparent fragment in the node pool.
///
/// Exactly 16 bytes, shared bit-for-bit with the WGSL shaders. `flags`
/// carries the low byte of the surface flag word: the 3+3-bit blend factor
/// codes and the transparency mark.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Node {
    /// Depth the fragment was drawn at; lower is nearer.
    pub depth: f32,
    /// Packed RGBA8 fragment color.
    pub color: u32,
    /// Blend mode byte.
    pub flags: u32,
    /// Pool index of the next node, or [`FRAGMENT_LIST_NULL`].
    pub next: u32,
}

impl Node {
    pub fn color_vec4(&self) -> Vec4 {
        Color::from_u32(self.color).to_vec4()
    }

    pub fn is_list_end(&self) -> bool {
        self.next == FRAGMENT_LIST_NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_is_sixteen_bytes() {
        assert_eq!(size_of::<Node>(), 16);
        assert_eq!(align_of::<Node>(), 4);
    }
}
