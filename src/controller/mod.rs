// CONTROLLER: input, camera control, timing, and the frame loop
pub mod input;
pub mod orbit;
pub mod stats;
pub mod ticker;
pub mod frame_loop;

pub use input::{InputEvent, InputRouter, InputState, KeyBindings};
pub use orbit::OrbitController;
pub use stats::FrameStats;
pub use ticker::{CancelToken, FixedTicker, Ticker};
#[cfg(not(target_arch = "wasm32"))]
pub use ticker::RealtimeTicker;
pub use frame_loop::{FrameLoop, SimulationContext, Spinner};
