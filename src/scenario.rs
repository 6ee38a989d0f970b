//! Builds the session for each tutorial snapshot.
//!
//! Every scenario is a plain function of the config: the same config always
//! yields the same bodies, visuals, pairings, and camera.

use std::f32::consts::FRAC_PI_2;

use glam::{EulerRot, Quat, Vec3};
use tracing::{debug, info};

use crate::config::{Config, InputMode, ScenarioKind};
use crate::controller::{InputRouter, InputState, KeyBindings, OrbitController, SimulationContext, Spinner};
use crate::error::Result;
use crate::model::{
    BodyDesc, BodyId, Camera, Geometry, Material, PairingTable, PhysicsWorld, Scene, ShapeDesc, Transform, VisualId,
};
use crate::ui::Tweakables;

/// Surface size assumed until the host reports a real one.
pub const DEFAULT_SIZE: (u32, u32) = (1280, 720);

const GROUND_COLOR: [f32; 3] = [0.35, 0.37, 0.4];
const CUBE_COLOR: [f32; 3] = [0.9, 0.5, 0.15];
const PLAYER_COLOR: [f32; 3] = [0.2, 0.5, 0.95];
const GROUND_HALF_SIZE: f32 = 25.0;

pub const GROUND_MATERIAL: &str = "ground";
pub const BOX_MATERIAL: &str = "box";
pub const PLAYER_MATERIAL: &str = "player";

/// Both worlds plus the pairing table, filled in together
struct Worlds {
    scene: Scene,
    physics: PhysicsWorld,
    pairing: PairingTable,
}

impl Worlds {
    fn new(config: &Config) -> Self {
        Self {
            scene: Scene::new(),
            physics: PhysicsWorld::new(&config.physics),
            pairing: PairingTable::new(),
        }
    }

    /// Adds a body and a visual at the same pose and pairs them
    fn add_paired(&mut self, desc: BodyDesc, geometry: Geometry, material: Material) -> Result<(BodyId, VisualId)> {
        let transform = desc.transform;
        let body = self.physics.add_body(desc)?;
        let visual = self.scene.add_visual(geometry, material, transform);
        self.pairing.pair(body, visual, &self.physics, &self.scene)?;
        Ok((body, visual))
    }

    fn add_ground(&mut self) -> Result<(BodyId, VisualId)> {
        self.add_paired(
            BodyDesc::new(0.0, ShapeDesc::Plane, Transform::IDENTITY).with_material(GROUND_MATERIAL),
            Geometry::Plane { half_size: GROUND_HALF_SIZE },
            Material::solid(GROUND_COLOR),
        )
    }

    fn add_player(&mut self, position: Vec3) -> Result<BodyId> {
        let radius = 0.5;
        let (body, _) = self.add_paired(
            BodyDesc::new(1.0, ShapeDesc::Sphere { radius }, Transform::from_position(position))
                .with_material(PLAYER_MATERIAL),
            Geometry::Sphere { radius },
            Material::solid(PLAYER_COLOR),
        )?;
        Ok(body)
    }
}

/// Per-scenario choices that config fields may override
struct Defaults {
    orbit: bool,
    follow: bool,
    mode: InputMode,
}

impl ScenarioKind {
    fn defaults(self) -> Defaults {
        match self {
            ScenarioKind::Spin => Defaults { orbit: false, follow: false, mode: InputMode::Impulse },
            ScenarioKind::Orbit | ScenarioKind::Drop => Defaults { orbit: true, follow: false, mode: InputMode::Impulse },
            ScenarioKind::Control => Defaults { orbit: true, follow: false, mode: InputMode::Force },
            ScenarioKind::Pile => Defaults { orbit: true, follow: true, mode: InputMode::Impulse },
        }
    }
}

pub fn build(config: &Config) -> Result<SimulationContext> {
    config.physics.validate()?;
    let kind = config.scenario;
    let mut worlds = Worlds::new(config);
    let mut spinners = Vec::new();
    let mut user = None;

    match kind {
        ScenarioKind::Spin | ScenarioKind::Orbit => spinners.push(spin_scene(&mut worlds.scene)),
        ScenarioKind::Drop => drop_scene(&mut worlds)?,
        ScenarioKind::Control => {
            drop_scene(&mut worlds)?;
            user = Some(worlds.add_player(Vec3::new(2.5, 1.0, 0.0))?);
        }
        ScenarioKind::Pile => {
            pile_scene(&mut worlds, config)?;
            user = Some(worlds.add_player(Vec3::new(0.0, 1.0, 5.0))?);
        }
    }

    if kind != ScenarioKind::Spin && kind != ScenarioKind::Orbit {
        for cm in config.contact_materials_or_default() {
            worlds.physics.add_contact_material(&cm.a, &cm.b, cm.friction, cm.restitution);
        }
    }

    let mut camera = Camera::new(DEFAULT_SIZE.0, DEFAULT_SIZE.1);
    camera.fov_y = config.camera.fov_deg.to_radians();
    camera.z_near = config.camera.z_near;
    camera.z_far = config.camera.z_far;
    if matches!(kind, ScenarioKind::Spin | ScenarioKind::Orbit) {
        camera.eye = Vec3::new(0.0, 0.0, 2.0);
    } else {
        camera.eye = Vec3::from_array(config.camera.position);
    }
    camera.look_at(Vec3::ZERO);

    let defaults = kind.defaults();
    let orbit = config
        .camera
        .orbit
        .unwrap_or(defaults.orbit)
        .then(|| OrbitController::from_camera(&camera, config.camera.orbit_damping));
    let follow = user.is_some() && config.camera.follow.unwrap_or(defaults.follow);

    info!(
        scenario = ?kind,
        bodies = worlds.physics.body_count(),
        visuals = worlds.scene.len(),
        pairs = worlds.pairing.len(),
        orbit = orbit.is_some(),
        follow,
        "scenario built"
    );

    Ok(SimulationContext {
        scene: worlds.scene,
        physics: worlds.physics,
        pairing: worlds.pairing,
        input: InputState::new(),
        bindings: KeyBindings::from_config(&config.input),
        router: InputRouter::from_config(&config.input, defaults.mode),
        camera,
        orbit,
        user,
        follow,
        follow_offset: Vec3::from_array(config.camera.follow_offset),
        spinners,
        tweaks: Tweakables::from_config(config),
        fixed_dt: config.physics.fixed_dt,
    })
}

/// Green wireframe cube at the origin, red wireframe plane behind it facing the camera
fn spin_scene(scene: &mut Scene) -> Spinner {
    let cube = scene.add_visual(
        Geometry::Box { half_extents: Vec3::splat(0.5) },
        Material::wireframe([0.0, 1.0, 0.0]),
        Transform::IDENTITY,
    );
    scene.add_visual(
        Geometry::Plane { half_size: 0.5 },
        Material::wireframe([1.0, 0.0, 0.0]),
        Transform::from_position(Vec3::new(0.0, 0.0, -2.0)).with_rotation(Quat::from_rotation_x(FRAC_PI_2)),
    );
    Spinner::new(cube, Vec3::new(0.01, 0.01, 0.0))
}

fn drop_scene(worlds: &mut Worlds) -> Result<()> {
    worlds.add_ground()?;
    let half = Vec3::splat(0.5);
    let pose = Transform::from_position(Vec3::new(0.0, 5.0, 0.0))
        .with_rotation(Quat::from_euler(EulerRot::XYZ, 0.3, 0.0, 0.2));
    worlds.add_paired(
        BodyDesc::new(1.0, ShapeDesc::Box { half_extents: half }, pose).with_material(BOX_MATERIAL),
        Geometry::Box { half_extents: half },
        Material::solid(CUBE_COLOR),
    )?;
    Ok(())
}

/// Grid position of the `index`th box: column and row across the footprint, layers stacked upward
pub fn pile_position(index: usize, columns: usize, spacing: f32, drop_height: f32) -> Vec3 {
    let columns = columns.max(1);
    let per_layer = columns * columns;
    let layer = index / per_layer;
    let row = (index / columns) % columns;
    let col = index % columns;
    let centre = (columns - 1) as f32 / 2.0;
    Vec3::new(
        (col as f32 - centre) * spacing,
        drop_height + layer as f32 * spacing,
        (row as f32 - centre) * spacing,
    )
}

fn pile_scene(worlds: &mut Worlds, config: &Config) -> Result<()> {
    worlds.add_ground()?;
    let pile = &config.pile;
    let half = Vec3::splat(pile.box_half_extent);
    for i in 0..pile.count {
        let position = pile_position(i, pile.columns, pile.spacing, pile.drop_height);
        // Darker per layer
        let shade = (1.0 - 0.12 * (i / pile.columns.max(1).pow(2)) as f32).max(0.2);
        let color = [CUBE_COLOR[0] * shade, CUBE_COLOR[1] * shade, CUBE_COLOR[2] * shade];
        worlds.add_paired(
            BodyDesc::new(pile.box_mass, ShapeDesc::Box { half_extents: half }, Transform::from_position(position))
                .with_material(BOX_MATERIAL),
            Geometry::Box { half_extents: half },
            Material::solid(color),
        )?;
    }
    debug!(count = pile.count, columns = pile.columns, "pile placed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PileConfig;
    use crate::error::TumbleError;

    fn config(kind: ScenarioKind) -> Config {
        Config {
            scenario: kind,
            ..Config::default()
        }
    }

    #[test]
    fn spin_has_no_physics_pairs() {
        let ctx = build(&config(ScenarioKind::Spin)).unwrap();
        assert!(ctx.pairing.is_empty());
        assert_eq!(ctx.physics.body_count(), 0);
        assert_eq!(ctx.scene.len(), 2);
        assert_eq!(ctx.spinners.len(), 1);
        assert!(ctx.orbit.is_none());
        assert_eq!(ctx.camera.eye, Vec3::new(0.0, 0.0, 2.0));

        let plane = ctx.scene.iter().find(|v| matches!(v.geometry, Geometry::Plane { .. })).unwrap();
        let normal = plane.transform.rotation * Vec3::Y;
        assert!((normal - Vec3::Z).length() < 1e-6, "plane normal = {normal}");
        assert!(plane.material.wireframe);
    }

    #[test]
    fn orbit_adds_controls_only() {
        let ctx = build(&config(ScenarioKind::Orbit)).unwrap();
        assert!(ctx.orbit.is_some());
        assert!(ctx.pairing.is_empty());
    }

    #[test]
    fn control_defaults_to_force_input() {
        let ctx = build(&config(ScenarioKind::Control)).unwrap();
        assert_eq!(ctx.router.mode, InputMode::Force);
        assert!(ctx.user.is_some());
        assert!(!ctx.follow);
        assert_eq!(ctx.pairing.len(), 3);
    }

    #[test]
    fn pile_pairs_every_box() {
        let cfg = config(ScenarioKind::Pile);
        let ctx = build(&cfg).unwrap();
        // ground + boxes + player
        assert_eq!(ctx.pairing.len(), cfg.pile.count + 2);
        assert_eq!(ctx.router.mode, InputMode::Impulse);
        assert!(ctx.follow);
        for (body, visual) in ctx.pairing.iter() {
            assert_eq!(ctx.physics.transform(body).unwrap(), ctx.scene.get(visual).unwrap().transform);
        }
    }

    #[test]
    fn pile_layout_is_a_centred_grid() {
        assert_eq!(pile_position(0, 3, 1.0, 3.0), Vec3::new(-1.0, 3.0, -1.0));
        assert_eq!(pile_position(4, 3, 1.0, 3.0), Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(pile_position(9, 3, 1.0, 3.0), Vec3::new(-1.0, 4.0, -1.0));
    }

    #[test]
    fn config_overrides_scenario_choices() {
        let mut cfg = config(ScenarioKind::Pile);
        cfg.camera.orbit = Some(false);
        cfg.camera.follow = Some(false);
        cfg.input.mode = Some(InputMode::Force);
        let ctx = build(&cfg).unwrap();
        assert!(ctx.orbit.is_none());
        assert!(!ctx.follow);
        assert_eq!(ctx.router.mode, InputMode::Force);
    }

    #[test]
    fn bad_pile_box_is_rejected() {
        let cfg = Config {
            scenario: ScenarioKind::Pile,
            pile: PileConfig {
                box_half_extent: 0.0,
                ..PileConfig::default()
            },
            ..Config::default()
        };
        assert!(matches!(build(&cfg), Err(TumbleError::InvalidShape(_))));
    }

    #[test]
    fn bad_fixed_step_is_rejected_before_any_body_exists() {
        for dt in [0.0, -1.0 / 60.0, f32::NAN] {
            let mut cfg = config(ScenarioKind::Drop);
            cfg.physics.fixed_dt = dt;
            assert!(matches!(build(&cfg), Err(TumbleError::InvalidConfig(_))), "fixed_dt = {dt}");
        }
        let mut cfg = config(ScenarioKind::Drop);
        cfg.physics.gravity = [0.0, f32::INFINITY, 0.0];
        assert!(matches!(build(&cfg), Err(TumbleError::InvalidConfig(_))));
    }

    #[test]
    fn tall_piles_keep_colours_in_range() {
        let cfg = Config {
            scenario: ScenarioKind::Pile,
            pile: PileConfig {
                count: 40,
                columns: 1,
                ..PileConfig::default()
            },
            ..Config::default()
        };
        let ctx = build(&cfg).unwrap();
        for visual in ctx.scene.iter() {
            assert!(visual.material.color.iter().all(|c| (0.0..=1.0).contains(c)), "{:?}", visual.material.color);
        }
    }
}
