//! Clock backed by the embassy time driver

use cadence_hal::Clock;
use embassy_time::Instant;

/// Monotonic time relative to the moment the clock was created
#[derive(Debug, Clone, Copy)]
pub struct EmbassyClock {
    start: Instant,
}

impl EmbassyClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for EmbassyClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for EmbassyClock {
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros()
    }
}
