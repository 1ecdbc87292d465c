//! Per-draw matrix set.

use glam::Mat4;

/// The matrices one draw call is rendered with.
///
/// The normal matrix is derived from the world matrix on construction, so a
/// `RenderMatrices` value is always internally consistent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderMatrices {
    /// Model-to-world transform.
    pub world: Mat4,
    /// Inverse-transpose of the world transform, for normals.
    pub world_normal: Mat4,
    /// Model-view-projection transform.
    pub mvp: Mat4,
}

impl RenderMatrices {
    /// Creates a matrix set from the world and MVP matrices.
    pub fn new(world: Mat4, mvp: Mat4) -> Self {
        Self {
            world,
            world_normal: world.inverse().transpose(),
            mvp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{Vec3, Vec4};

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let world = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let matrices = RenderMatrices::new(world, Mat4::IDENTITY);

        // A normal on a surface slanted across the scaled axis must be
        // transformed by the inverse-transpose to stay perpendicular.
        let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        let transformed = (matrices.world_normal * Vec4::from((normal, 0.0)))
            .truncate()
            .normalize();
        let tangent = (world * Vec4::from((Vec3::new(-1.0, 1.0, 0.0), 0.0))).truncate();
        assert_relative_eq!(transformed.dot(tangent), 0.0, epsilon = 1e-6);
    }
}
