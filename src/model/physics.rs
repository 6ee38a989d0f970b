//! Rigid-body world backed by `rapier3d`.
//!
//! The world owns every rapier set and pipeline and exposes the handful of
//! operations the frame loop needs: add a body, advance one fixed step, push a
//! body with a force or an impulse, and read poses back out.
//!
//! Conventions
//! - Units are meters, kilograms, seconds.
//! - Mass 0 means an immovable (fixed) body.
//! - Planes are half-spaces whose outward normal is the body's local +Y.
//! - Forces are cleared after every step, so a force added between steps acts
//!   on exactly one step.

use std::collections::HashMap;

use glam::Vec3;
use rapier3d::prelude::*;
use tracing::debug;

use super::transform::{from_na, to_na, to_na_point, Transform};
use crate::config::PhysicsConfig;
use crate::error::{Result, TumbleError};

/// Handle to a body in the world, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShapeDesc {
    Box { half_extents: Vec3 },
    /// Infinite half-space, outward normal = local +Y.
    Plane,
    Sphere { radius: f32 },
}

#[derive(Debug, Clone)]
pub struct BodyDesc {
    /// Kilograms; 0 makes the body fixed.
    pub mass: f32,
    pub shape: ShapeDesc,
    pub transform: Transform,
    /// Surface material name used for contact material lookups.
    pub material: Option<String>,
}

impl BodyDesc {
    pub fn new(mass: f32, shape: ShapeDesc, transform: Transform) -> Self {
        Self {
            mass,
            shape,
            transform,
            material: None,
        }
    }

    pub fn with_material(mut self, name: impl Into<String>) -> Self {
        self.material = Some(name.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err(TumbleError::InvalidShape(format!("mass must be >= 0, got {}", self.mass)));
        }
        match self.shape {
            ShapeDesc::Box { half_extents } => {
                if !half_extents.is_finite() || half_extents.min_element() <= 0.0 {
                    return Err(TumbleError::InvalidShape(format!(
                        "box half extents must be positive, got {half_extents}"
                    )));
                }
            }
            ShapeDesc::Sphere { radius } => {
                if !radius.is_finite() || radius <= 0.0 {
                    return Err(TumbleError::InvalidShape(format!(
                        "sphere radius must be positive, got {radius}"
                    )));
                }
            }
            ShapeDesc::Plane => {
                if self.mass != 0.0 {
                    return Err(TumbleError::InvalidShape("planes must be static (mass 0)".to_string()));
                }
            }
        }
        if !self.transform.position.is_finite() || !self.transform.rotation.is_finite() {
            return Err(TumbleError::InvalidShape("transform must be finite".to_string()));
        }
        Ok(())
    }
}

/// Friction/restitution overrides keyed by an unordered pair of material ids.
///
/// Material ids live in collider `user_data`; 0 means "no material".
#[derive(Default)]
struct ContactMaterials {
    pairs: HashMap<(u128, u128), (f32, f32)>,
}

fn pair_key(a: u128, b: u128) -> (u128, u128) {
    if a <= b { (a, b) } else { (b, a) }
}

impl PhysicsHooks for ContactMaterials {
    fn modify_solver_contacts(&self, context: &mut ContactModificationContext) {
        let a = context.colliders[context.collider1].user_data;
        let b = context.colliders[context.collider2].user_data;
        if let Some(&(friction, restitution)) = self.pairs.get(&pair_key(a, b)) {
            for contact in context.solver_contacts.iter_mut() {
                contact.friction = friction;
                contact.restitution = restitution;
            }
        }
    }
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    contact_materials: ContactMaterials,
    /// Indexed by `BodyId`.
    handles: Vec<RigidBodyHandle>,
    /// Material names; id = index + 1.
    materials: Vec<String>,
    /// Bodies that received a force since the last step.
    forced: Vec<RigidBodyHandle>,
    default_friction: f32,
    default_restitution: f32,
}

impl PhysicsWorld {
    pub fn new(config: &PhysicsConfig) -> Self {
        let mut integration_parameters = IntegrationParameters::default();
        integration_parameters.dt = config.fixed_dt;
        integration_parameters.num_solver_iterations = config.solver_iterations.max(1);

        Self {
            gravity: to_na(Vec3::from_array(config.gravity)),
            integration_parameters,
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            contact_materials: ContactMaterials::default(),
            handles: Vec::new(),
            materials: Vec::new(),
            forced: Vec::new(),
            default_friction: config.default_friction,
            default_restitution: config.default_restitution,
        }
    }

    /// Returns the material id for `name`, registering it on first use.
    pub fn register_material(&mut self, name: &str) -> u128 {
        if let Some(idx) = self.materials.iter().position(|m| m == name) {
            return idx as u128 + 1;
        }
        self.materials.push(name.to_string());
        self.materials.len() as u128
    }

    /// Associates a friction/restitution pair with contacts between two surface materials.
    pub fn add_contact_material(&mut self, a: &str, b: &str, friction: f32, restitution: f32) {
        let a_id = self.register_material(a);
        let b_id = self.register_material(b);
        self.contact_materials
            .pairs
            .insert(pair_key(a_id, b_id), (friction, restitution));
        debug!(a, b, friction, restitution, "contact material registered");
    }

    pub fn add_body(&mut self, desc: BodyDesc) -> Result<BodyId> {
        desc.validate()?;

        let builder = if desc.mass == 0.0 {
            RigidBodyBuilder::fixed()
        } else {
            RigidBodyBuilder::dynamic()
        };
        let rb_handle = self.bodies.insert(builder.pose(desc.transform.to_isometry()).build());

        let mut collider = match desc.shape {
            ShapeDesc::Box { half_extents } => {
                ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
            ShapeDesc::Sphere { radius } => ColliderBuilder::ball(radius),
            ShapeDesc::Plane => ColliderBuilder::halfspace(Vector::y_axis()),
        }
        .friction(self.default_friction)
        .restitution(self.default_restitution);

        if desc.mass > 0.0 {
            collider = collider.mass(desc.mass);
        }
        if let Some(name) = desc.material.as_deref() {
            let material = self.register_material(name);
            collider = collider
                .user_data(material)
                .active_hooks(ActiveHooks::MODIFY_SOLVER_CONTACTS);
        }
        self.colliders
            .insert_with_parent(collider.build(), rb_handle, &mut self.bodies);

        let id = BodyId(self.handles.len() as u32);
        self.handles.push(rb_handle);
        debug!(?id, mass = desc.mass, shape = ?desc.shape, "body added");
        Ok(id)
    }

    /// Advances every body by exactly `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            &self.contact_materials,
            &(),
        );

        for handle in self.forced.drain(..) {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.reset_forces(false);
                body.reset_torques(false);
            }
        }
    }

    /// Adds a world-space force at a world-space point for the next step.
    pub fn apply_force(&mut self, id: BodyId, force: Vec3, point: Vec3) {
        let Some(handle) = self.handle(id) else { return };
        if let Some(body) = self.bodies.get_mut(handle) {
            body.add_force_at_point(to_na(force), to_na_point(point), true);
            self.forced.push(handle);
        }
    }

    /// Applies a world-space impulse at a world-space point immediately.
    pub fn apply_impulse(&mut self, id: BodyId, impulse: Vec3, point: Vec3) {
        let Some(handle) = self.handle(id) else { return };
        if let Some(body) = self.bodies.get_mut(handle) {
            body.apply_impulse_at_point(to_na(impulse), to_na_point(point), true);
        }
    }

    pub fn transform(&self, id: BodyId) -> Option<Transform> {
        let body = self.bodies.get(self.handle(id)?)?;
        Some(Transform::from_rapier(body.translation(), body.rotation()))
    }

    pub fn linear_velocity(&self, id: BodyId) -> Option<Vec3> {
        let body = self.bodies.get(self.handle(id)?)?;
        Some(from_na(body.linvel()))
    }

    pub fn angular_velocity(&self, id: BodyId) -> Option<Vec3> {
        let body = self.bodies.get(self.handle(id)?)?;
        Some(from_na(body.angvel()))
    }

    pub fn is_static(&self, id: BodyId) -> Option<bool> {
        let body = self.bodies.get(self.handle(id)?)?;
        Some(body.is_fixed())
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.handle(id).is_some()
    }

    pub fn gravity(&self) -> Vec3 {
        from_na(&self.gravity)
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_na(gravity);
    }

    pub fn body_count(&self) -> usize {
        self.handles.len()
    }

    fn handle(&self, id: BodyId) -> Option<RigidBodyHandle> {
        self.handles.get(id.0 as usize).copied()
    }
}
