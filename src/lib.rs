// Re-export all public modules so they can be used from main.rs
pub mod config;
pub mod error;
pub mod logging;
pub mod scenario;
pub mod ui;
pub mod utils;

// MVC Architecture
pub mod model;
pub mod view;
pub mod controller;

pub use config::Config;
pub use error::{Result, TumbleError};

#[cfg(target_arch = "wasm32")]
use std::cell::RefCell;
#[cfg(target_arch = "wasm32")]
use std::rc::Rc;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::closure::Closure;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{prelude::wasm_bindgen, JsCast, JsValue};
#[cfg(target_arch = "wasm32")]
use web_sys::{Document, Event, EventTarget, HtmlCanvasElement, KeyboardEvent, MouseEvent, WheelEvent, Window};

#[cfg(target_arch = "wasm32")]
use controller::{CancelToken, FrameLoop, InputEvent};
#[cfg(target_arch = "wasm32")]
use view::{GpuContext, MeshRenderer};

#[cfg(target_arch = "wasm32")]
type WebLoop = Rc<RefCell<FrameLoop<MeshRenderer>>>;

#[cfg(target_arch = "wasm32")]
thread_local! {
    static CANCEL: RefCell<Option<CancelToken>> = const { RefCell::new(None) };
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn start() -> std::result::Result<(), JsValue> {
    let mut config = Config::default();
    logging::init(&config.logging);

    let window = web_sys::window().ok_or_else(|| js_error("no global `window`"))?;
    if let Some(kind) = scenario_from_query(&window) {
        config.scenario = kind;
    }

    let (document, canvas) = init_canvas(&window)?;
    setup_app(config, &window, &document, &canvas).await
}

/// Stops the animation loop after the current frame
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub fn stop() {
    CANCEL.with(|c| {
        if let Some(token) = c.borrow().as_ref() {
            token.cancel();
        }
    });
}

/// `?scenario=<name>` picks the snapshot to run
#[cfg(target_arch = "wasm32")]
fn scenario_from_query(window: &Window) -> Option<config::ScenarioKind> {
    let search = window.location().search().ok()?;
    search
        .trim_start_matches('?')
        .split('&')
        .find_map(|pair| pair.strip_prefix("scenario="))
        .and_then(|name| name.parse().ok())
}

/// Main application setup for WASM
#[cfg(target_arch = "wasm32")]
async fn setup_app(
    config: Config,
    window: &Window,
    document: &Document,
    canvas: &HtmlCanvasElement,
) -> std::result::Result<(), JsValue> {
    let (width, height) = (canvas.width(), canvas.height());
    let gpu = GpuContext::new(canvas, width, height)
        .await
        .map_err(|e| js_error(format!("GPU init failed: {e}")))?;

    let ctx = scenario::build(&config).map_err(|e| js_error(format!("scenario setup failed: {e}")))?;
    let frame_loop: WebLoop = Rc::new(RefCell::new(FrameLoop::new(ctx, MeshRenderer::new(gpu))));
    frame_loop.borrow_mut().resize(width, height);

    let egui_ctx = egui::Context::default();
    let egui_events: Rc<RefCell<Vec<egui::Event>>> = Rc::new(RefCell::new(Vec::new()));

    setup_input_listeners(document, window, canvas, &frame_loop, &egui_ctx, &egui_events)?;

    let cancel = CancelToken::new();
    CANCEL.with(|c| *c.borrow_mut() = Some(cancel.clone()));

    let performance = window.performance().ok_or_else(|| js_error("no performance timer"))?;
    let canvas = canvas.clone();
    let on_frame = {
        let cancel = cancel.clone();
        move || {
            let now = performance.now();
            let dpr = web_sys::window().map(|w| w.device_pixel_ratio()).unwrap_or(1.0) as f32;
            let mut fl = frame_loop.borrow_mut();

            let raw_input = egui::RawInput {
                time: Some(now / 1000.0),
                screen_rect: Some(egui::Rect::from_min_size(
                    egui::Pos2::ZERO,
                    egui::vec2(canvas.width() as f32 / dpr, canvas.height() as f32 / dpr),
                )),
                events: egui_events.borrow_mut().drain(..).collect(),
                ..Default::default()
            };
            egui_ctx.set_pixels_per_point(dpr);
            let stats = fl.stats().clone();
            let overlay = ui::build_overlay(&egui_ctx, raw_input, &mut fl.context_mut().tweaks, &stats);
            fl.renderer_mut().set_overlay(overlay);

            fl.frame(now);

            if let Some(err) = fl.renderer_mut().take_failure() {
                tracing::error!(error = %err, "render failed, stopping");
                cancel.cancel();
            }
        }
    };
    AnimationLoop::new(window.clone(), cancel, on_frame).start()?;

    tracing::info!(scenario = ?config.scenario, width, height, "started");
    Ok(())
}

/// Browser events feed the input state, the orbit controls, and egui
#[cfg(target_arch = "wasm32")]
fn setup_input_listeners(
    document: &Document,
    window: &Window,
    canvas: &HtmlCanvasElement,
    frame_loop: &WebLoop,
    egui_ctx: &egui::Context,
    egui_events: &Rc<RefCell<Vec<egui::Event>>>,
) -> std::result::Result<(), JsValue> {
    // Pointer position while the primary button drags the orbit
    let drag: Rc<RefCell<Option<(f32, f32)>>> = Rc::new(RefCell::new(None));

    // Keyboard down
    {
        let frame_loop = frame_loop.clone();
        let egui_ctx = egui_ctx.clone();
        let keydown = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            if egui_ctx.wants_keyboard_input() {
                return;
            }
            let code = e.code();
            let mut fl = frame_loop.borrow_mut();
            let ctx = fl.context_mut();
            // Bound keys would otherwise scroll the page
            if ctx.bindings.is_bound(&code) {
                e.prevent_default();
            }
            ctx.input.process_event(&InputEvent::KeyDown(code));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
        keydown.forget();
    }

    // Keyboard up
    {
        let frame_loop = frame_loop.clone();
        let keyup = Closure::wrap(Box::new(move |e: KeyboardEvent| {
            frame_loop
                .borrow_mut()
                .context_mut()
                .input
                .process_event(&InputEvent::KeyUp(e.code()));
        }) as Box<dyn FnMut(KeyboardEvent)>);
        document.add_event_listener_with_callback("keyup", keyup.as_ref().unchecked_ref())?;
        keyup.forget();
    }

    // Focus loss and hidden tab: releases never arrive, so drop everything held
    let focus_targets: [(&EventTarget, &str); 2] = [(window.as_ref(), "blur"), (document.as_ref(), "visibilitychange")];
    for (target, name) in focus_targets {
        let frame_loop = frame_loop.clone();
        let lost = Closure::wrap(Box::new(move |_e: Event| {
            frame_loop.borrow_mut().context_mut().input.process_event(&InputEvent::FocusLost);
        }) as Box<dyn FnMut(Event)>);
        target.add_event_listener_with_callback(name, lost.as_ref().unchecked_ref())?;
        lost.forget();
    }

    // Mouse down starts an orbit drag unless egui is under the pointer
    {
        let drag = drag.clone();
        let egui_ctx = egui_ctx.clone();
        let egui_events = egui_events.clone();
        let mousedown = Closure::wrap(Box::new(move |e: MouseEvent| {
            let pos = egui::pos2(e.client_x() as f32, e.client_y() as f32);
            egui_events.borrow_mut().push(egui::Event::PointerButton {
                pos,
                button: egui::PointerButton::Primary,
                pressed: true,
                modifiers: egui::Modifiers::default(),
            });
            if e.button() == 0 && !egui_ctx.is_pointer_over_area() {
                *drag.borrow_mut() = Some((pos.x, pos.y));
            }
        }) as Box<dyn FnMut(MouseEvent)>);
        canvas.add_event_listener_with_callback("mousedown", mousedown.as_ref().unchecked_ref())?;
        mousedown.forget();
    }

    // Mouse move
    {
        let drag = drag.clone();
        let frame_loop = frame_loop.clone();
        let egui_events = egui_events.clone();
        let mousemove = Closure::wrap(Box::new(move |e: MouseEvent| {
            let (x, y) = (e.client_x() as f32, e.client_y() as f32);
            egui_events.borrow_mut().push(egui::Event::PointerMoved(egui::pos2(x, y)));

            let mut drag = drag.borrow_mut();
            if let Some((lx, ly)) = *drag {
                if let Some(orbit) = frame_loop.borrow_mut().context_mut().orbit.as_mut() {
                    orbit.rotate(x - lx, y - ly);
                }
                *drag = Some((x, y));
            }
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mousemove", mousemove.as_ref().unchecked_ref())?;
        mousemove.forget();
    }

    // Mouse up ends the drag
    {
        let drag = drag.clone();
        let egui_events = egui_events.clone();
        let mouseup = Closure::wrap(Box::new(move |e: MouseEvent| {
            egui_events.borrow_mut().push(egui::Event::PointerButton {
                pos: egui::pos2(e.client_x() as f32, e.client_y() as f32),
                button: egui::PointerButton::Primary,
                pressed: false,
                modifiers: egui::Modifiers::default(),
            });
            *drag.borrow_mut() = None;
        }) as Box<dyn FnMut(MouseEvent)>);
        document.add_event_listener_with_callback("mouseup", mouseup.as_ref().unchecked_ref())?;
        mouseup.forget();
    }

    // Mouse wheel zooms the orbit
    {
        let frame_loop = frame_loop.clone();
        let egui_ctx = egui_ctx.clone();
        let wheel = Closure::wrap(Box::new(move |e: WheelEvent| {
            if egui_ctx.is_pointer_over_area() {
                return;
            }
            if let Some(orbit) = frame_loop.borrow_mut().context_mut().orbit.as_mut() {
                orbit.zoom(e.delta_y() as f32);
                e.prevent_default();
            }
        }) as Box<dyn FnMut(WheelEvent)>);
        canvas.add_event_listener_with_callback("wheel", wheel.as_ref().unchecked_ref())?;
        wheel.forget();
    }

    // Window resize: match the canvas to the viewport, then one redraw
    {
        let frame_loop = frame_loop.clone();
        let canvas = canvas.clone();
        let window_for_size = window.clone();
        let resize = Closure::wrap(Box::new(move |_e: Event| {
            let (w, h) = window_size(&window_for_size);
            canvas.set_width(w);
            canvas.set_height(h);
            frame_loop.borrow_mut().resize(w, h);
        }) as Box<dyn FnMut(Event)>);
        window.add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
        resize.forget();
    }

    Ok(())
}

#[cfg(target_arch = "wasm32")]
fn window_size(window: &Window) -> (u32, u32) {
    let w = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(800.0);
    let h = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(600.0);
    (w.max(1.0) as u32, h.max(1.0) as u32)
}

#[cfg(target_arch = "wasm32")]
fn init_canvas(window: &Window) -> std::result::Result<(Document, HtmlCanvasElement), JsValue> {
    let document = window.document().ok_or_else(|| js_error("no document on window"))?;
    let body = document.body().ok_or_else(|| js_error("no body on document"))?;
    let canvas_el = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| js_error("failed to create canvas"))?;
    let (width, height) = window_size(window);
    canvas_el.set_width(width);
    canvas_el.set_height(height);
    body.append_child(&canvas_el)?;
    Ok((document, canvas_el))
}

#[cfg(target_arch = "wasm32")]
fn js_error<E: Into<String>>(msg: E) -> JsValue {
    js_sys::Error::new(&msg.into()).into()
}

/// requestAnimationFrame loop that reschedules itself until cancelled
#[cfg(target_arch = "wasm32")]
struct AnimationLoop {
    inner: Rc<RefCell<Box<dyn FnMut()>>>,
    window: Window,
    cancel: CancelToken,
}

#[cfg(target_arch = "wasm32")]
impl AnimationLoop {
    fn new(window: Window, cancel: CancelToken, f: impl FnMut() + 'static) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Box::new(f))),
            window,
            cancel,
        }
    }

    fn start(self) -> std::result::Result<(), JsValue> {
        let inner = self.inner.clone();
        let window = self.window.clone();
        let cancel = self.cancel.clone();

        let callback = Rc::new(RefCell::new(None::<Closure<dyn FnMut()>>));
        let callback_clone = callback.clone();

        *callback.borrow_mut() = Some(Closure::wrap(Box::new(move || {
            if cancel.is_cancelled() {
                tracing::info!("animation loop stopped");
                return;
            }
            // Reschedule first so a panicking frame skips one refresh instead of ending the loop
            if let Some(cb) = callback_clone.borrow().as_ref() {
                if let Err(e) = window.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    tracing::error!(error = ?e, "requestAnimationFrame failed");
                }
            }

            inner.borrow_mut().as_mut()();
        }) as Box<dyn FnMut()>));

        if let Some(cb) = callback.borrow().as_ref() {
            self.window.request_animation_frame(cb.as_ref().unchecked_ref())?;
        }
        Ok(())
    }
}
