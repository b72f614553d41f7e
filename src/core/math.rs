//! Math aliases and the listener reference-frame transform.

use nalgebra as na;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;

/// Canonical forward axis of the listener frame.
#[inline]
pub fn canonical_forward() -> Vec3 {
    Vec3::z()
}

/// Canonical up axis of the listener frame.
#[inline]
pub fn canonical_up() -> Vec3 {
    Vec3::y()
}

/// Position and orientation of the local listener in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            forward: canonical_forward(),
            up: canonical_up(),
        }
    }
}

impl Pose {
    /// Rotation taking the canonical axes onto this pose's forward/up.
    ///
    /// Degenerate axes (zero length, or forward parallel to up) fall back to
    /// identity so a bad frame from the host never produces NaNs on the wire.
    pub fn orientation(&self) -> Quat {
        let cross = self.forward.cross(&self.up);
        if self.forward.norm_squared() < f32::EPSILON || cross.norm_squared() < f32::EPSILON {
            return Quat::identity();
        }
        Quat::face_towards(&self.forward, &self.up)
    }

    /// Express a world-space point in this listener's reference frame.
    pub fn to_listener_frame(&self, world: &Vec3) -> Vec3 {
        self.orientation().inverse_transform_vector(&(world - self.position))
    }
}
