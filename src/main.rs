use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use tumble::config::{Config, ScenarioKind};
use tumble::controller::{FixedTicker, FrameLoop, InputEvent, RealtimeTicker};
use tumble::view::{GpuContext, HeadlessRenderer, MeshRenderer};
use tumble::{logging, scenario, ui, Result, TumbleError};

/// Physics sandbox: rapier bodies mirrored onto a wgpu scene
#[derive(Parser, Debug)]
#[command(name = "tumble", version, about)]
struct Cli {
    /// TOML config file (falls back to $TUMBLE_CONFIG, then built-in defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scenario to run: spin, orbit, drop, control, pile
    #[arg(long)]
    scenario: Option<ScenarioKind>,

    /// Run without a window, using a renderer that draws nothing
    #[arg(long)]
    headless: bool,

    /// Frames to run in headless mode
    #[arg(long, default_value_t = 600)]
    frames: u64,

    /// Pace headless frames at 60 Hz wall-clock instead of a simulated clock
    #[arg(long)]
    realtime: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("TUMBLE_CONFIG").map(PathBuf::from));
    let mut config = match path {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    if let Some(kind) = cli.scenario {
        config.scenario = kind;
    }
    Ok(config)
}

fn run_headless(config: &Config, frames: u64, realtime: bool) -> Result<()> {
    let (width, height) = scenario::DEFAULT_SIZE;
    let mut frame_loop = FrameLoop::new(scenario::build(config)?, HeadlessRenderer::new(width, height));

    let started = Instant::now();
    if realtime {
        frame_loop.run_frames(&mut RealtimeTicker::hz(60.0), frames);
    } else {
        frame_loop.run_frames(&mut FixedTicker::hz(60.0), frames);
    }
    info!(frames, elapsed_ms = started.elapsed().as_millis() as u64, "headless run finished");

    let ctx = frame_loop.context();
    for (body, visual) in ctx.pairing.iter() {
        if let Some(pose) = ctx.physics.transform(body) {
            info!(body = body.0, visual = visual.0, position = ?pose.position, rotation = ?pose.rotation, "final pose");
        }
    }
    Ok(())
}

struct WindowState {
    window: Arc<Window>,
    frame_loop: FrameLoop<MeshRenderer>,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    clock: Instant,
    dragging: bool,
    cursor: Option<(f64, f64)>,
}

impl WindowState {
    fn new(event_loop: &ActiveEventLoop, config: &Config) -> Result<Self> {
        let window_attributes = Window::default_attributes()
            .with_title("tumble")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .map_err(|e| TumbleError::Window(e.to_string()))?,
        );
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| TumbleError::Gpu(format!("window surface: {e}")))?;
        let gpu = pollster::block_on(GpuContext::new_native(instance, surface, size.width, size.height))?;

        let mut frame_loop = FrameLoop::new(scenario::build(config)?, MeshRenderer::new(gpu));
        frame_loop.resize(size.width, size.height);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
            None,
        );

        info!(scenario = ?config.scenario, width = size.width, height = size.height, "window ready");
        Ok(Self {
            window,
            frame_loop,
            egui_ctx,
            egui_state,
            clock: Instant::now(),
            dragging: false,
            cursor: None,
        })
    }

    fn redraw(&mut self) -> Result<()> {
        let raw_input = self.egui_state.take_egui_input(&self.window);
        let stats = self.frame_loop.stats().clone();
        let mut overlay =
            ui::build_overlay(&self.egui_ctx, raw_input, &mut self.frame_loop.context_mut().tweaks, &stats);
        let platform_output = std::mem::take(&mut overlay.platform_output);
        self.egui_state.handle_platform_output(&self.window, platform_output);
        self.frame_loop.renderer_mut().set_overlay(overlay);

        let now_ms = self.clock.elapsed().as_secs_f64() * 1000.0;
        self.frame_loop.frame(now_ms);

        match self.frame_loop.renderer_mut().take_failure() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn input(&mut self, event: &WindowEvent) {
        let ctx = self.frame_loop.context_mut();
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    // winit key names match the web `KeyboardEvent.code` names for bound keys
                    let code = format!("{code:?}");
                    let input = match event.state {
                        ElementState::Pressed => InputEvent::KeyDown(code),
                        ElementState::Released => InputEvent::KeyUp(code),
                    };
                    ctx.input.process_event(&input);
                }
            }
            WindowEvent::MouseInput { state, button: MouseButton::Left, .. } => {
                self.dragging = *state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some((lx, ly)), Some(orbit)) = (self.dragging, self.cursor, ctx.orbit.as_mut()) {
                    orbit.rotate((position.x - lx) as f32, (position.y - ly) as f32);
                }
                self.cursor = Some((position.x, position.y));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => -y * 100.0,
                    MouseScrollDelta::PixelDelta(p) => -p.y as f32,
                };
                if let Some(orbit) = ctx.orbit.as_mut() {
                    orbit.zoom(dy);
                }
            }
            _ => {}
        }
    }
}

struct App {
    config: Config,
    state: Option<WindowState>,
    error: Option<TumbleError>,
}

impl App {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: TumbleError) {
        error!(error = %err, "shutting down");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        match WindowState::new(event_loop, &self.config) {
            Ok(state) => self.state = Some(state),
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else {
            return;
        };

        // Releases and focus loss always reach the input state, even over egui
        let consumed = state.egui_state.on_window_event(&state.window, &event).consumed;

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                event_loop.exit();
            }
            WindowEvent::Resized(size) => state.frame_loop.resize(size.width, size.height),
            WindowEvent::Focused(false) => {
                state.frame_loop.context_mut().input.process_event(&InputEvent::FocusLost);
                state.dragging = false;
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = state.redraw() {
                    self.fail(event_loop, err);
                }
            }
            ref other => {
                let release = matches!(
                    other,
                    WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Released
                ) || matches!(other, WindowEvent::MouseInput { state: ElementState::Released, .. });
                if !consumed || release {
                    state.input(other);
                }
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    logging::init(&config.logging);

    if cli.headless {
        return run_headless(&config, cli.frames, cli.realtime);
    }
    if cli.realtime {
        warn!("--realtime only applies to headless runs");
    }

    let event_loop = EventLoop::new().map_err(|e| TumbleError::Window(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App { config, state: None, error: None };
    event_loop.run_app(&mut app).map_err(|e| TumbleError::Window(e.to_string()))?;

    match app.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        // The subscriber may not be installed yet if the config failed to load
        eprintln!("tumble: {err}");
        error!(error = %err, "exiting");
        std::process::exit(1);
    }
}
