use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Source of refresh ticks for an explicit run loop.
pub trait Ticker {
    /// Blocks (or not) until the next refresh and returns its timestamp in ms.
    fn next_tick(&mut self) -> f64;
}

/// Simulated clock: every tick is exactly `interval_ms` after the previous one.
#[derive(Debug, Clone)]
pub struct FixedTicker {
    pub interval_ms: f64,
    now_ms: f64,
}

impl FixedTicker {
    pub fn new(interval_ms: f64) -> Self {
        Self { interval_ms, now_ms: 0.0 }
    }

    pub fn hz(rate: f64) -> Self {
        Self::new(1000.0 / rate)
    }
}

impl Ticker for FixedTicker {
    fn next_tick(&mut self) -> f64 {
        self.now_ms += self.interval_ms;
        self.now_ms
    }
}

/// Wall-clock ticker that sleeps until the next interval boundary.
#[cfg(not(target_arch = "wasm32"))]
pub struct RealtimeTicker {
    interval: std::time::Duration,
    origin: std::time::Instant,
    next: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl RealtimeTicker {
    pub fn hz(rate: f64) -> Self {
        let now = std::time::Instant::now();
        let interval = std::time::Duration::from_secs_f64(1.0 / rate);
        Self {
            interval,
            origin: now,
            next: now + interval,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Ticker for RealtimeTicker {
    fn next_tick(&mut self) -> f64 {
        let now = std::time::Instant::now();
        if self.next > now {
            std::thread::sleep(self.next - now);
        }
        // Drop missed ticks instead of bursting to catch up
        self.next = (self.next + self.interval).max(std::time::Instant::now());
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Shared stop flag for a run loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_ticker_advances_by_interval() {
        let mut ticker = FixedTicker::new(16.0);
        assert_eq!(ticker.next_tick(), 16.0);
        assert_eq!(ticker.next_tick(), 32.0);
    }

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
