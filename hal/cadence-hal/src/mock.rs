//! Mock implementations for host-side testing
//!
//! All mocks use interior mutability so a test can keep a shared
//! reference, hand another one to the code under test, and still drive
//! the simulated hardware between polls. The traits are implemented for
//! `&Mock*` for that reason.

use core::cell::Cell;

use crate::adc::AnalogInput;
use crate::clock::{Clock, Millis};
use crate::gpio::InputPin;

/// Mock clock
///
/// Time only moves when the test moves it.
#[derive(Debug, Default)]
pub struct MockClock {
    now_us: Cell<u64>,
}

impl MockClock {
    /// Create a clock starting at zero
    pub const fn new() -> Self {
        Self {
            now_us: Cell::new(0),
        }
    }

    /// Jump to an absolute time in milliseconds
    pub fn set_ms(&self, ms: Millis) {
        self.now_us.set(ms * 1000);
    }

    /// Move forward by `ms` milliseconds
    pub fn advance_ms(&self, ms: Millis) {
        self.advance_us(ms * 1000);
    }

    /// Move forward by `us` microseconds
    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }
}

impl Clock for MockClock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}

/// Mock digital input
#[derive(Debug, Default)]
pub struct MockPin {
    high: Cell<bool>,
    reads: Cell<u32>,
}

impl MockPin {
    /// Create a pin reading `high`
    pub const fn new(high: bool) -> Self {
        Self {
            high: Cell::new(high),
            reads: Cell::new(0),
        }
    }

    /// Drive the simulated line level
    pub fn set_high(&self, high: bool) {
        self.high.set(high);
    }

    /// Number of times the pin has been sampled
    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl InputPin for &MockPin {
    fn is_high(&mut self) -> bool {
        self.reads.set(self.reads.get() + 1);
        self.high.get()
    }
}

/// Mock analog channel
///
/// Holds a left-justified 16-bit reading, like real [`AnalogInput`]s.
#[derive(Debug, Default)]
pub struct MockAnalog {
    raw: Cell<u16>,
}

impl MockAnalog {
    /// Create a channel with a left-justified reading
    pub const fn new(raw: u16) -> Self {
        Self { raw: Cell::new(raw) }
    }

    /// Set the left-justified 16-bit reading
    pub fn set_raw(&self, raw: u16) {
        self.raw.set(raw);
    }

    /// Set a reading expressed in native counts at `resolution` bits
    pub fn set_counts(&self, counts: u16, resolution: u8) {
        self.raw.set(counts << (16 - resolution as u32));
    }
}

impl AnalogInput for &MockAnalog {
    fn read_u16(&mut self) -> u16 {
        self.raw.get()
    }
}
