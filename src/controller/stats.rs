/// Frame timing counters shown in the stats overlay.
///
/// Timestamps are host milliseconds (`performance.now()` on the web, a monotonic
/// clock natively); the counters never read a clock themselves.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    last_begin: Option<f64>,
    window_start: Option<f64>,
    window_frames: u32,
    in_frame: bool,
    /// Interval between the last two frame starts
    pub frame_ms: f64,
    /// Frames per second over the last full one-second window
    pub fps: f64,
    pub frames: u64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, now_ms: f64) {
        if let Some(prev) = self.last_begin {
            self.frame_ms = now_ms - prev;
        }
        self.last_begin = Some(now_ms);
        self.in_frame = true;

        let window_start = *self.window_start.get_or_insert(now_ms);
        let elapsed = now_ms - window_start;
        if elapsed >= 1000.0 {
            self.fps = self.window_frames as f64 * 1000.0 / elapsed;
            self.window_start = Some(now_ms);
            self.window_frames = 0;
        }
    }

    pub fn end(&mut self) {
        if !self.in_frame {
            return;
        }
        self.in_frame = false;
        self.frames += 1;
        self.window_frames += 1;
    }
}
