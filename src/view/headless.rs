use tracing::trace;

use crate::model::{Camera, Scene, SceneRenderer};

/// Renderer with no GPU behind it. Counts what it is asked to do, for tests and the headless CLI.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    renders: u64,
    resizes: u64,
    last_visuals: usize,
    last_aspect: f32,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn resizes(&self) -> u64 {
        self.resizes
    }

    /// Visual count of the most recent render
    pub fn last_visuals(&self) -> usize {
        self.last_visuals
    }

    /// Camera aspect seen by the most recent render
    pub fn last_aspect(&self) -> f32 {
        self.last_aspect
    }
}

impl SceneRenderer for HeadlessRenderer {
    fn render(&mut self, scene: &Scene, camera: &Camera) {
        self.renders += 1;
        self.last_visuals = scene.len();
        self.last_aspect = camera.aspect;
        trace!(render = self.renders, visuals = self.last_visuals, "headless render");
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resizes += 1;
    }
}
