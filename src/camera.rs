use glam::{Mat4, Vec3};

use crate::config::CameraPose;

const MIN_PITCH: f32 = -1.55;
const MAX_PITCH: f32 = 1.55;

/// Orbit around a fixed look-at point. Starts from a [`CameraPose`] and
/// tracks mouse orbit/zoom on top of it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitCamera {
    pub center: Vec3,
    pub up: Vec3,
    /// Radians around `up`, measured from the reference forward axis.
    pub yaw: f32,
    /// Radians above the plane orthogonal to `up`.
    pub pitch: f32,
    pub distance: f32,
    basis: [Vec3; 2],
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::from_pose(&CameraPose::default())
    }
}

impl OrbitCamera {
    pub fn from_pose(pose: &CameraPose) -> Self {
        let center = Vec3::from(pose.center);
        let up = Vec3::from(pose.up).try_normalize().unwrap_or(Vec3::Y);
        // Reference frame in the plane orthogonal to `up`.
        let fwd = up.any_orthonormal_vector();
        let side = up.cross(fwd);

        let offset = Vec3::from(pose.eye) - center;
        let distance = offset.length().max(1e-6);
        let along_up = offset.dot(up);
        let planar = offset - along_up * up;
        let pitch = (along_up / distance).clamp(-1.0, 1.0).asin();
        let yaw = planar.dot(side).atan2(planar.dot(fwd));

        Self {
            center,
            up,
            yaw,
            pitch: pitch.clamp(MIN_PITCH, MAX_PITCH),
            distance,
            basis: [fwd, side],
        }
    }

    pub fn eye(&self) -> Vec3 {
        let [fwd, side] = self.basis;
        let planar = fwd * self.yaw.cos() + side * self.yaw.sin();
        let dir = planar * self.pitch.cos() + self.up * self.pitch.sin();
        self.center + dir * self.distance
    }

    pub fn orbit_by_pixels(&mut self, delta_px: [f32; 2]) {
        const RAD_PER_PX: f32 = 0.008;
        self.yaw -= delta_px[0] * RAD_PER_PX;
        self.pitch = (self.pitch + delta_px[1] * RAD_PER_PX).clamp(MIN_PITCH, MAX_PITCH);
    }

    /// `factor > 1` moves closer.
    pub fn zoom(&mut self, factor: f32) {
        self.distance = (self.distance / factor.max(1e-3)).clamp(1e-3, 1e7);
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.center, self.up)
    }

    pub fn view_proj(&self, viewport_aspect: f32, fov_y_deg: f32) -> Mat4 {
        let near = (self.distance * 1e-3).max(1e-4);
        let far = self.distance * 1e3;
        let proj = Mat4::perspective_rh(
            fov_y_deg.to_radians(),
            viewport_aspect.max(1e-3),
            near,
            far,
        );
        proj * self.view()
    }
}
