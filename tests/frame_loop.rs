use glam::Vec3;

use tumble::config::{Config, InputMode, ScenarioKind};
use tumble::controller::{CancelToken, FixedTicker, FrameLoop, InputEvent, Ticker};
use tumble::model::Transform;
use tumble::scenario;
use tumble::view::HeadlessRenderer;

fn frame_loop(config: &Config) -> FrameLoop<HeadlessRenderer> {
    FrameLoop::new(scenario::build(config).unwrap(), HeadlessRenderer::new(800, 600))
}

fn scenario(kind: ScenarioKind) -> Config {
    Config {
        scenario: kind,
        ..Config::default()
    }
}

fn poses(fl: &FrameLoop<HeadlessRenderer>) -> Vec<Transform> {
    let ctx = fl.context();
    ctx.pairing.iter().map(|(body, _)| ctx.physics.transform(body).unwrap()).collect()
}

fn press(fl: &mut FrameLoop<HeadlessRenderer>, code: &str) {
    fl.context_mut().input.process_event(&InputEvent::KeyDown(code.to_string()));
}

#[test]
fn visuals_mirror_bodies_exactly_after_every_frame() {
    let mut fl = frame_loop(&scenario(ScenarioKind::Pile));
    let mut ticker = FixedTicker::hz(60.0);
    press(&mut fl, "KeyW");

    for _ in 0..90 {
        fl.run_frames(&mut ticker, 1);
        let ctx = fl.context();
        for (body, visual) in ctx.pairing.iter() {
            let physics = ctx.physics.transform(body).unwrap();
            let shown = ctx.scene.get(visual).unwrap().transform;
            assert_eq!(physics.position.to_array().map(f32::to_bits), shown.position.to_array().map(f32::to_bits));
            assert_eq!(physics.rotation.to_array().map(f32::to_bits), shown.rotation.to_array().map(f32::to_bits));
        }
    }
}

#[test]
fn identical_sessions_produce_identical_trajectories() {
    let config = scenario(ScenarioKind::Pile);
    let mut a = frame_loop(&config);
    let mut b = frame_loop(&config);
    let (mut ta, mut tb) = (FixedTicker::hz(60.0), FixedTicker::hz(60.0));

    for i in 0..120 {
        if i == 10 {
            press(&mut a, "KeyA");
            press(&mut b, "KeyA");
        }
        if i == 40 {
            a.context_mut().input.process_event(&InputEvent::FocusLost);
            b.context_mut().input.process_event(&InputEvent::FocusLost);
        }
        a.run_frames(&mut ta, 1);
        b.run_frames(&mut tb, 1);
        assert_eq!(poses(&a), poses(&b), "diverged at frame {i}");
    }
}

#[test]
fn refresh_rate_does_not_change_the_simulation() {
    let config = scenario(ScenarioKind::Pile);
    let mut slow = frame_loop(&config);
    let mut fast = frame_loop(&config);
    press(&mut slow, "KeyD");
    press(&mut fast, "KeyD");

    slow.run_frames(&mut FixedTicker::hz(30.0), 90);
    fast.run_frames(&mut FixedTicker::hz(144.0), 90);

    assert_eq!(poses(&slow), poses(&fast));
    assert_ne!(slow.stats().frame_ms, fast.stats().frame_ms);
}

#[test]
fn every_visual_reaches_the_renderer() {
    let mut fl = frame_loop(&scenario(ScenarioKind::Pile));
    fl.run_frames(&mut FixedTicker::hz(60.0), 2);
    assert_eq!(fl.renderer().last_visuals(), fl.context().scene.len());

    let (_, visual) = fl.context().pairing.iter().last().unwrap();
    fl.context_mut().remove_visual(visual);
    fl.run_frames(&mut FixedTicker::hz(60.0), 1);
    assert_eq!(fl.renderer().last_visuals(), fl.context().scene.len());
}

#[test]
fn static_ground_never_moves() {
    let mut fl = frame_loop(&scenario(ScenarioKind::Pile));
    let ctx = fl.context();
    let ground: Vec<_> = ctx
        .pairing
        .iter()
        .filter(|(body, _)| ctx.physics.is_static(*body) == Some(true))
        .map(|(body, visual)| (body, visual, ctx.physics.transform(body).unwrap()))
        .collect();
    assert_eq!(ground.len(), 1);

    fl.run_frames(&mut FixedTicker::hz(60.0), 240);
    let ctx = fl.context();
    for (body, visual, start) in ground {
        assert_eq!(ctx.physics.transform(body).unwrap(), start);
        assert_eq!(ctx.scene.get(visual).unwrap().transform, start);
    }
}

/// x velocity of the user body after holding KeyD for `frames` frames with no gravity
fn held_impulse_gain(frames: u64) -> f32 {
    let mut config = scenario(ScenarioKind::Control);
    config.physics.gravity = [0.0; 3];
    config.input.mode = Some(InputMode::Impulse);

    let mut fl = frame_loop(&config);
    press(&mut fl, "KeyD");
    fl.run_frames(&mut FixedTicker::hz(60.0), frames);

    let ctx = fl.context();
    ctx.physics.linear_velocity(ctx.user.unwrap()).unwrap().x
}

#[test]
fn held_key_impulses_accumulate_per_frame() {
    let impulse = Config::default().input.impulse_magnitude;
    let five = held_impulse_gain(5);
    let ten = held_impulse_gain(10);
    assert!((five - 5.0 * impulse).abs() < 1e-4, "five = {five}");
    assert!((ten - 10.0 * impulse).abs() < 1e-4, "ten = {ten}");
    assert!((ten / five - 2.0).abs() < 1e-3);
}

#[test]
fn resize_sets_exact_aspect_and_renders_once() {
    let mut fl = frame_loop(&scenario(ScenarioKind::Spin));
    fl.run_frames(&mut FixedTicker::hz(60.0), 3);
    let before = fl.renderer().renders();

    fl.resize(1000, 700);

    assert_eq!(fl.context().camera.aspect, 1000.0_f32 / 700.0_f32);
    assert_eq!(fl.renderer().renders(), before + 1);
    assert_eq!(fl.renderer().resizes(), 1);
    assert_eq!(fl.renderer().size(), (1000, 700));
    assert_eq!(fl.renderer().last_aspect(), 1000.0_f32 / 700.0_f32);
}

#[test]
fn follow_camera_targets_the_user_every_frame() {
    let mut fl = frame_loop(&scenario(ScenarioKind::Pile));
    let mut ticker = FixedTicker::hz(60.0);
    press(&mut fl, "KeyS");
    press(&mut fl, "Space");

    for _ in 0..60 {
        fl.run_frames(&mut ticker, 1);
        let ctx = fl.context();
        let user = ctx.physics.transform(ctx.user.unwrap()).unwrap().position;
        assert_eq!(ctx.camera.target, user);
    }
}

#[test]
fn fixed_follow_offset_without_orbit() {
    let mut config = scenario(ScenarioKind::Pile);
    config.camera.orbit = Some(false);
    config.camera.follow_offset = [0.0, 2.0, 6.0];
    let mut fl = frame_loop(&config);

    fl.run_frames(&mut FixedTicker::hz(60.0), 30);
    let ctx = fl.context();
    let user = ctx.physics.transform(ctx.user.unwrap()).unwrap().position;
    assert_eq!(ctx.camera.eye, user + Vec3::new(0.0, 2.0, 6.0));
}

/// Ticker that cancels its loop after a fixed number of ticks
struct CancelAfter {
    inner: FixedTicker,
    remaining: u32,
    token: CancelToken,
}

impl Ticker for CancelAfter {
    fn next_tick(&mut self) -> f64 {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.token.cancel();
        }
        self.inner.next_tick()
    }
}

#[test]
fn run_stops_when_cancelled() {
    let mut fl = frame_loop(&scenario(ScenarioKind::Drop));
    let token = CancelToken::new();
    let mut ticker = CancelAfter {
        inner: FixedTicker::hz(60.0),
        remaining: 5,
        token: token.clone(),
    };

    let frames = fl.run(&mut ticker, &token);

    assert_eq!(frames, 5);
    assert_eq!(fl.renderer().renders(), 5);
    assert_eq!(fl.run(&mut FixedTicker::hz(60.0), &token), 0);
}

#[test]
fn focus_loss_stops_pushes() {
    let mut config = scenario(ScenarioKind::Control);
    config.physics.gravity = [0.0; 3];
    config.input.mode = Some(InputMode::Impulse);
    let mut fl = frame_loop(&config);
    let mut ticker = FixedTicker::hz(60.0);

    press(&mut fl, "KeyD");
    fl.run_frames(&mut ticker, 3);
    fl.context_mut().input.process_event(&InputEvent::FocusLost);
    let user = fl.context().user.unwrap();
    let v = fl.context().physics.linear_velocity(user).unwrap();

    fl.run_frames(&mut ticker, 3);
    let after = fl.context().physics.linear_velocity(user).unwrap();
    assert!((after - v).length() < 1e-5, "{v} -> {after}");
}
