// VIEW: Rendering and graphics
pub mod gpu_init;
pub mod headless;
pub mod render;

pub use gpu_init::GpuContext;
pub use headless::HeadlessRenderer;
pub use render::MeshRenderer;
