//! Monotonic time source

/// Milliseconds since an arbitrary, fixed epoch (usually boot)
pub type Millis = u64;

/// Monotonic clock
///
/// Must never go backwards. Wrap-around is not handled: a 64-bit
/// microsecond counter outlives the hardware.
pub trait Clock {
    /// Current time in microseconds
    fn now_us(&self) -> u64;

    /// Current time in whole milliseconds
    fn now_ms(&self) -> Millis {
        self.now_us() / 1000
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }

    fn now_ms(&self) -> Millis {
        (**self).now_ms()
    }
}
