use glam::{EulerRot, Quat, Vec3};
use tracing::{debug, trace};

use crate::controller::{CancelToken, FrameStats, InputRouter, InputState, KeyBindings, OrbitController, Ticker};
use crate::model::{BodyId, Camera, PairingTable, PhysicsWorld, Scene, SceneRenderer, VisualEntity, VisualId};
use crate::ui::Tweakables;

/// Rotates an unpaired visual by a fixed Euler increment every frame
#[derive(Debug, Clone)]
pub struct Spinner {
    pub visual: VisualId,
    /// Radians per frame about X, Y, Z
    pub rate: Vec3,
    angles: Vec3,
}

impl Spinner {
    pub fn new(visual: VisualId, rate: Vec3) -> Self {
        Self {
            visual,
            rate,
            angles: Vec3::ZERO,
        }
    }

    pub fn angles(&self) -> Vec3 {
        self.angles
    }

    fn advance(&mut self, scene: &mut Scene) {
        self.angles += self.rate;
        if let Some(entity) = scene.get_mut(self.visual) {
            entity.transform.rotation = Quat::from_euler(EulerRot::XYZ, self.angles.x, self.angles.y, self.angles.z);
        }
    }
}

/// Everything one session owns: both worlds, the table between them, input and camera
pub struct SimulationContext {
    pub scene: Scene,
    pub physics: PhysicsWorld,
    pub pairing: PairingTable,
    pub input: InputState,
    pub bindings: KeyBindings,
    pub router: InputRouter,
    pub camera: Camera,
    pub orbit: Option<OrbitController>,
    /// Body driven by held keys
    pub user: Option<BodyId>,
    /// Whether the camera tracks `user`
    pub follow: bool,
    /// Eye offset from the followed body when there are no orbit controls
    pub follow_offset: Vec3,
    pub spinners: Vec<Spinner>,
    pub tweaks: Tweakables,
    /// Seconds per physics step
    pub fixed_dt: f32,
}

impl SimulationContext {
    /// Removes a visual along with any pairing that references it
    pub fn remove_visual(&mut self, id: VisualId) -> Option<VisualEntity> {
        self.pairing.unpair_visual(id);
        self.spinners.retain(|s| s.visual != id);
        self.scene.remove_visual(id)
    }

    pub fn user_position(&self) -> Option<Vec3> {
        self.physics.transform(self.user?).map(|t| t.position)
    }

    /// Pushes the live GUI values into the objects they control
    fn apply_tweaks(&mut self) {
        let g = self.physics.gravity();
        if g.y != self.tweaks.gravity_y {
            self.physics.set_gravity(Vec3::new(g.x, self.tweaks.gravity_y, g.z));
        }
        self.camera.fov_y = self.tweaks.fov_deg.to_radians();
        if let Some(orbit) = self.orbit.as_mut() {
            orbit.damping = self.tweaks.orbit_damping.clamp(0.0, 1.0);
        }
    }

    fn follow_camera(&mut self) {
        if !self.follow {
            return;
        }
        let Some(target) = self.user_position() else {
            return;
        };
        match self.orbit.as_mut() {
            Some(orbit) => {
                orbit.set_target(target);
                orbit.place(&mut self.camera);
            }
            None => {
                self.camera.eye = target + self.follow_offset;
                self.camera.look_at(target);
            }
        }
    }
}

/// Per-refresh driver: physics step, input, sync, camera, render
pub struct FrameLoop<R: SceneRenderer> {
    ctx: SimulationContext,
    renderer: R,
    stats: FrameStats,
}

impl<R: SceneRenderer> FrameLoop<R> {
    pub fn new(ctx: SimulationContext, renderer: R) -> Self {
        Self {
            ctx,
            renderer,
            stats: FrameStats::new(),
        }
    }

    pub fn context(&self) -> &SimulationContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SimulationContext {
        &mut self.ctx
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// One refresh. The caller reschedules; this never blocks.
    pub fn frame(&mut self, now_ms: f64) {
        self.stats.begin(now_ms);

        let ctx = &mut self.ctx;
        ctx.apply_tweaks();

        // Damped orbit motion
        if let Some(orbit) = ctx.orbit.as_mut() {
            orbit.update(&mut ctx.camera);
        }

        ctx.physics.step(ctx.fixed_dt);

        // Held keys push the user body; forces act on the next step
        if let Some(user) = ctx.user {
            ctx.router
                .apply(&ctx.input, &ctx.bindings, &mut ctx.physics, user, &ctx.tweaks);
        }

        for spinner in ctx.spinners.iter_mut() {
            spinner.advance(&mut ctx.scene);
        }

        ctx.pairing.sync(&ctx.physics, &mut ctx.scene);
        ctx.follow_camera();

        self.renderer.render(&ctx.scene, &ctx.camera);
        self.stats.end();
        trace!(frame = self.stats.frames, now_ms, "frame");
    }

    /// Updates aspect ratio and surface size, then draws once outside the cadence
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.ctx.camera.set_aspect(width, height);
        self.renderer.resize(width, height);
        self.renderer.render(&self.ctx.scene, &self.ctx.camera);
        debug!(width, height, "resized");
    }

    /// Runs frames until `cancel` is set. Returns the number of frames run.
    pub fn run(&mut self, ticker: &mut impl Ticker, cancel: &CancelToken) -> u64 {
        let mut frames = 0;
        while !cancel.is_cancelled() {
            let now = ticker.next_tick();
            self.frame(now);
            frames += 1;
        }
        debug!(frames, "run loop cancelled");
        frames
    }

    pub fn run_frames(&mut self, ticker: &mut impl Ticker, count: u64) -> u64 {
        for _ in 0..count {
            let now = ticker.next_tick();
            self.frame(now);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ScenarioKind};
    use crate::controller::FixedTicker;
    use crate::scenario;
    use crate::view::HeadlessRenderer;

    fn frame_loop(kind: ScenarioKind) -> FrameLoop<HeadlessRenderer> {
        let config = Config {
            scenario: kind,
            ..Config::default()
        };
        FrameLoop::new(scenario::build(&config).unwrap(), HeadlessRenderer::new(800, 600))
    }

    #[test]
    fn every_frame_renders_once() {
        let mut fl = frame_loop(ScenarioKind::Drop);
        fl.run_frames(&mut FixedTicker::hz(60.0), 10);
        assert_eq!(fl.renderer().renders(), 10);
        assert_eq!(fl.stats().frames, 10);
    }

    #[test]
    fn spinner_matches_euler_increments() {
        let mut fl = frame_loop(ScenarioKind::Spin);
        fl.run_frames(&mut FixedTicker::hz(60.0), 3);
        let spinner = fl.context().spinners[0].clone();
        assert!((spinner.angles() - Vec3::new(0.03, 0.03, 0.0)).length() < 1e-6);

        let cube = fl.context().scene.get(spinner.visual).unwrap();
        let expected = Quat::from_euler(EulerRot::XYZ, spinner.angles().x, spinner.angles().y, 0.0);
        assert_eq!(cube.transform.rotation, expected);
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut fl = frame_loop(ScenarioKind::Spin);
        let aspect = fl.context().camera.aspect;
        fl.resize(0, 600);
        assert_eq!(fl.context().camera.aspect, aspect);
        assert_eq!(fl.renderer().renders(), 0);
    }

    #[test]
    fn removing_a_paired_visual_drops_the_pair() {
        let mut fl = frame_loop(ScenarioKind::Drop);
        let (_, visual) = fl.context().pairing.iter().last().unwrap();
        let before = fl.context().pairing.len();
        assert!(fl.context_mut().remove_visual(visual).is_some());
        assert_eq!(fl.context().pairing.len(), before - 1);
        fl.run_frames(&mut FixedTicker::hz(60.0), 2);
    }

    #[test]
    fn gravity_slider_reaches_the_world() {
        let mut fl = frame_loop(ScenarioKind::Drop);
        fl.context_mut().tweaks.gravity_y = -1.0;
        fl.frame(16.0);
        assert_eq!(fl.context().physics.gravity().y, -1.0);
    }
}
