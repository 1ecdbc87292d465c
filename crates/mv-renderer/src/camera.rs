//! Viewer camera.

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Perspective/orthographic camera with an optional orbit mode.
///
/// In orbit mode `position` is the focus point and the eye sits `distance`
/// behind it along the view direction; otherwise `position` is the eye.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position, or focus position while orbiting.
    pub position: Vec3,
    /// Euler rotation (pitch, yaw, roll) in radians.
    pub rotation: Vec3,
    pub orbiting: bool,
    /// Orbit distance from the focus point.
    pub distance: f32,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub orthographic: bool,
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            orbiting: true,
            distance: 50.0,
            fov: 50f32.to_radians(),
            aspect,
            near_plane: 1.0,
            far_plane: 3000.0,
            orthographic: false,
        }
    }

    fn orientation(&self) -> Quat {
        Quat::from_euler(
            glam::EulerRot::ZYX,
            self.rotation.z,
            self.rotation.y,
            self.rotation.x,
        )
    }

    /// Direction the camera looks along.
    pub fn forward(&self) -> Vec3 {
        self.orientation() * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.orientation() * Vec3::Y
    }

    /// Eye position in world space, regardless of orbit mode.
    pub fn real_position(&self) -> Vec3 {
        if self.orbiting {
            self.position - self.forward() * self.distance
        } else {
            self.position
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.real_position();
        Mat4::look_to_rh(eye, self.forward(), self.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        if self.orthographic {
            // Keep the orbit distance as the vertical extent so switching
            // projections preserves the framing.
            let half_height = self.distance * 0.5;
            let half_width = half_height * self.aspect;
            Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                self.near_plane,
                self.far_plane,
            )
        } else {
            Mat4::perspective_rh(self.fov, self.aspect, self.near_plane, self.far_plane)
        }
    }

    /// Model-view-projection matrix for the given world transform.
    pub fn mvp_matrix(&self, world: Mat4) -> Mat4 {
        self.projection_matrix() * self.view_matrix() * world
    }

    /// Model-view matrix for the given world transform.
    pub fn mv_matrix(&self, world: Mat4) -> Mat4 {
        self.view_matrix() * world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn orbit_eye_sits_behind_focus() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 2.0, 0.0);
        camera.distance = 10.0;

        // Default rotation looks down -Z, so the eye is at +Z.
        let eye = camera.real_position();
        assert_relative_eq!(eye.z, 10.0, epsilon = 1e-5);
        assert_relative_eq!(eye.y, 2.0, epsilon = 1e-5);
    }

    #[test]
    fn free_camera_uses_position_as_eye() {
        let mut camera = Camera::new(1.0);
        camera.orbiting = false;
        camera.position = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(camera.real_position(), camera.position);
    }
}
