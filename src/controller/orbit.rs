use glam::Vec3;

use crate::model::Camera;

const MIN_PITCH: f32 = -1.5;
const MAX_PITCH: f32 = 1.5;
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 500.0;

/// Orbit-style camera control with damped motion.
///
/// Pointer input adds angular/zoom velocity; every `update` integrates that
/// velocity, scales it by `1 - damping`, and places the camera on a sphere
/// around `target`.
#[derive(Debug, Clone)]
pub struct OrbitController {
    pub target: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
}

impl OrbitController {
    /// Starts from wherever the camera currently is.
    pub fn from_camera(camera: &Camera, damping: f32) -> Self {
        let offset = camera.eye - camera.target;
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            target: camera.target,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            distance,
            damping: damping.clamp(0.0, 1.0),
            rotate_speed: 0.005,
            zoom_speed: 0.001,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
        }
    }

    /// Pointer drag in pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw_velocity -= dx * self.rotate_speed;
        self.pitch_velocity += dy * self.rotate_speed;
    }

    /// Wheel delta; positive zooms out.
    pub fn zoom(&mut self, delta: f32) {
        self.zoom_velocity += delta * self.zoom_speed;
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn offset(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(sy * cp, sp, cy * cp) * self.distance
    }

    pub fn is_settled(&self) -> bool {
        const EPS: f32 = 1e-6;
        self.yaw_velocity.abs() < EPS && self.pitch_velocity.abs() < EPS && self.zoom_velocity.abs() < EPS
    }

    pub fn update(&mut self, camera: &mut Camera) {
        self.yaw += self.yaw_velocity;
        self.pitch = (self.pitch + self.pitch_velocity).clamp(MIN_PITCH, MAX_PITCH);
        self.distance = (self.distance * (1.0 + self.zoom_velocity)).clamp(MIN_DISTANCE, MAX_DISTANCE);

        let keep = 1.0 - self.damping;
        self.yaw_velocity *= keep;
        self.pitch_velocity *= keep;
        self.zoom_velocity *= keep;

        self.place(camera);
    }

    pub fn place(&self, camera: &mut Camera) {
        camera.eye = self.target + self.offset();
        camera.look_at(self.target);
    }
}
