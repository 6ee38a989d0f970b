use glam::{Mat4, Quat, Vec3};
use nalgebra as na;
use rapier3d::prelude::Isometry;

/// Position + orientation shared by visual and physics entities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// Component-wise copy out of a rapier pose. No renormalisation happens,
    /// so the result is bit-identical to what the solver produced.
    pub fn from_rapier(translation: &na::Vector3<f32>, rotation: &na::UnitQuaternion<f32>) -> Self {
        let t = translation;
        let q = rotation.quaternion();
        Self {
            position: Vec3::new(t.x, t.y, t.z),
            rotation: Quat::from_xyzw(q.i, q.j, q.k, q.w),
        }
    }

    pub fn to_isometry(&self) -> Isometry<f32> {
        let q = na::Quaternion::new(self.rotation.w, self.rotation.x, self.rotation.y, self.rotation.z);
        Isometry::from_parts(
            na::Translation3::new(self.position.x, self.position.y, self.position.z),
            na::Unit::new_unchecked(q),
        )
    }
}

pub fn to_na(v: Vec3) -> na::Vector3<f32> {
    na::Vector3::new(v.x, v.y, v.z)
}

pub fn to_na_point(p: Vec3) -> na::Point3<f32> {
    na::Point3::new(p.x, p.y, p.z)
}

pub fn from_na(v: &na::Vector3<f32>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}
