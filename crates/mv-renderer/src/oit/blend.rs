//! Blend factor algebra for fragment resolution.
//!
//! Mirrors the factor table in the composite shader; the two must stay
//! bit-for-bit identical. Factor codes 2 and 3 resolve against the blend
//! source color regardless of which operand they scale.

use glam::Vec4;

/// Evaluates one 3-bit blend factor code.
pub fn blend_factor(code: u32, src: Vec4, dst: Vec4) -> Vec4 {
    match code & 7 {
        1 => Vec4::ONE,
        2 => src,
        3 => Vec4::ONE - src,
        4 => Vec4::splat(src.w),
        5 => Vec4::splat(1.0 - src.w),
        6 => Vec4::splat(dst.w),
        7 => Vec4::splat(1.0 - dst.w),
        _ => Vec4::ZERO,
    }
}

/// Blends one fragment color over an accumulated color.
///
/// The flag byte carries the source factor code in bits 0..2 and the
/// destination factor code in bits 3..5. All four channels participate,
/// alpha included.
pub fn blend(flags: u32, src: Vec4, dst: Vec4) -> Vec4 {
    let src_factor = blend_factor(flags & 7, src, dst);
    let dst_factor = blend_factor((flags >> 3) & 7, src, dst);
    src * src_factor + dst * dst_factor
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Factor values for src = white, dst = black, per code 0..7:
    /// Zero, One, Other, OtherInverted, SrcAlpha, SrcAlphaInverted,
    /// DstAlpha, DstAlphaInverted.
    const WHITE_OVER_BLACK_FACTORS: [f32; 8] = [0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];

    #[test]
    fn white_over_black_matches_reference_table() {
        let src = Vec4::ONE;
        let dst = Vec4::new(0.0, 0.0, 0.0, 1.0);

        for src_code in 0..8u32 {
            for dst_code in 0..8u32 {
                let flags = src_code | dst_code << 3;
                let result = blend(flags, src, dst);

                // White scales to the factor itself; black contributes only
                // its alpha channel.
                let s = WHITE_OVER_BLACK_FACTORS[src_code as usize];
                let d = WHITE_OVER_BLACK_FACTORS[dst_code as usize];
                let expected = Vec4::new(s, s, s, s + d);
                assert_eq!(
                    result, expected,
                    "codes src={src_code} dst={dst_code} diverge from reference"
                );
            }
        }
    }

    #[test]
    fn standard_alpha_blend() {
        // SrcAlpha / SrcAlphaInverted at half opacity.
        let flags = 4 | 5 << 3;
        let src = Vec4::new(1.0, 0.0, 0.0, 0.5);
        let dst = Vec4::new(0.0, 0.0, 1.0, 1.0);

        let result = blend(flags, src, dst);
        assert_eq!(result, Vec4::new(0.5, 0.0, 0.5, 0.75));
    }
}
