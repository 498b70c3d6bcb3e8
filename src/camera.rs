use glam::{Mat4, Quat, Vec3};

use crate::renderer::gltf::bounds::Bounds;

pub mod controller;

/// Where the camera is put when the scene has no extent to frame.
const FALLBACK_EYE_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 2.0);

/// A look-at camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
}

impl Camera {
    pub fn new(eye: Vec3, center: Vec3, up: Vec3) -> Camera {
        Camera { eye, center, up }
    }

    /// Frames the bounds from outside, looking at their center with +Y up.
    pub fn framing(bounds: &Bounds) -> Camera {
        let center = bounds.center();
        let up = Vec3::Y;
        let diagonal = bounds.diagonal();
        let side = diagonal.cross(up);
        let eye = if bounds.is_degenerate() {
            center + FALLBACK_EYE_OFFSET
        } else if diagonal.z > 0.0 {
            center + diagonal
        } else if side.length_squared() > 0.0 {
            // A flat scene in the XY plane, seen from the side it faces.
            center + 2.0 * side
        } else {
            // Only spans Y, so there is no face to look at.
            center + FALLBACK_EYE_OFFSET * bounds.extent_or(1.0)
        };
        Camera::new(eye, center, up)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.center, self.up)
    }

    /// The normalized view direction.
    pub fn front(&self) -> Vec3 {
        (self.center - self.eye).normalize_or_zero()
    }

    /// The normalized camera-local horizontal axis, pointing left.
    pub fn left(&self) -> Vec3 {
        self.up.cross(self.center - self.eye).normalize_or_zero()
    }

    /// Moves eye and center together along the camera's own axes.
    pub fn move_local(&mut self, truck_left: f32, pedestal_up: f32, dolly_in: f32) {
        let offset = truck_left * self.left() + pedestal_up * self.up + dolly_in * self.front();
        self.eye += offset;
        self.center += offset;
    }

    /// Rotates about the view direction, then the horizontal axis, then the
    /// (already rolled and tilted) up axis. Angles are in radians.
    pub fn rotate_local(&mut self, roll_right: f32, tilt_down: f32, pan_left: f32) {
        let front = self.center - self.eye;
        let roll = axis_rotation(front, roll_right);
        self.up = roll * self.up;

        let tilt = axis_rotation(self.left(), tilt_down);
        let front = tilt * front;
        self.up = tilt * self.up;

        let pan = axis_rotation(self.up, pan_left);
        self.center = self.eye + pan * front;
    }

    /// Rotates the view direction and up vector about a world-space axis.
    pub fn rotate_world(&mut self, radians: f32, axis: Vec3) {
        let rotation = axis_rotation(axis, radians);
        self.center = self.eye + rotation * (self.center - self.eye);
        self.up = rotation * self.up;
    }

    /// The camera as a `--lookat` argument.
    pub fn lookat_args(&self) -> String {
        [self.eye, self.center, self.up]
            .iter()
            .flat_map(|v| v.to_array())
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A rotation about `axis`, which needn't be normalized. Identity for a zero
/// axis or angle.
pub(crate) fn axis_rotation(axis: Vec3, radians: f32) -> Quat {
    match axis.try_normalize() {
        Some(axis) if radians != 0.0 => Quat::from_axis_angle(axis, radians),
        _ => Quat::IDENTITY,
    }
}

/// The viewer's projection: 70 degrees of vertical field of view, with the
/// near plane scaled by the scene's extent.
pub fn projection_matrix(aspect_ratio: f32, bounds: &Bounds) -> Mat4 {
    let near = 0.001 * bounds.extent_or(1.0);
    Mat4::perspective_rh_gl(70f32.to_radians(), aspect_ratio, near, 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn close(a: Vec3, b: Vec3) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn framing_looks_at_the_center_from_outside() {
        let bounds = Bounds {
            min: Vec3::new(-1.0, -1.0, -1.0),
            max: Vec3::ONE,
        };
        let camera = Camera::framing(&bounds);
        assert_eq!(camera.center, Vec3::ZERO);
        assert_eq!(camera.eye, Vec3::splat(2.0));
        assert_eq!(camera.up, Vec3::Y);

        let flat = Bounds {
            min: Vec3::ZERO,
            max: Vec3::new(2.0, 2.0, 0.0),
        };
        let camera = Camera::framing(&flat);
        assert_eq!(camera.center, Vec3::new(1.0, 1.0, 0.0));
        assert!(camera.eye.z.abs() > 0.0);
        assert_eq!(camera.eye.x, camera.center.x);

        let vertical = Bounds {
            min: Vec3::ZERO,
            max: Vec3::new(0.0, 3.0, 0.0),
        };
        let camera = Camera::framing(&vertical);
        assert_eq!(camera.center, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(camera.eye, Vec3::new(0.0, 1.5, 6.0));
        assert!(camera.view_matrix().is_finite());

        let camera = Camera::framing(&Bounds::DEGENERATE);
        assert!(camera.eye.is_finite());
        assert_ne!(camera.eye, camera.center);
        assert!(camera.view_matrix().is_finite());
        assert!(projection_matrix(16.0 / 9.0, &Bounds::DEGENERATE).is_finite());
    }

    #[test]
    fn local_moves_follow_the_camera_axes() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        assert!(close(camera.left(), Vec3::new(-1.0, 0.0, 0.0)));
        camera.move_local(1.0, 2.0, 3.0);
        assert!(close(camera.eye, Vec3::new(-1.0, 2.0, 2.0)));
        assert!(close(camera.center, Vec3::new(-1.0, 2.0, -3.0)));
    }

    #[test]
    fn rotations_keep_the_eye() {
        let mut camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        camera.rotate_world(FRAC_PI_2, Vec3::Y);
        assert!(close(camera.eye, Vec3::new(0.0, 0.0, 5.0)));
        assert!(close(camera.center, Vec3::new(-5.0, 0.0, 5.0)));

        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        camera.rotate_local(FRAC_PI_2, 0.0, 0.0);
        assert!(close(camera.up, Vec3::X));
        camera.rotate_local(0.0, 0.0, 0.0);
        assert!(close(camera.center, Vec3::new(0.0, 0.0, -1.0)));
    }

    #[test]
    fn lookat_args_lists_nine_numbers() {
        let camera = Camera::new(Vec3::new(1.0, 2.5, -3.0), Vec3::ZERO, Vec3::Y);
        assert_eq!(camera.lookat_args(), "1,2.5,-3,0,0,0,0,1,0");
    }
}
