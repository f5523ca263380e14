//! Rotary encoder with quadrature outputs
//!
//! Decoding is split in two halves that run in different contexts:
//!
//! - [`QuadratureDecoder`] runs on every edge of either line (an interrupt
//!   handler, an edge-waiting task, or [`PolledQuadrature`] from a fast
//!   unit) and accumulates raw transitions into a [`QuadraturePosition`].
//! - [`Encoder`] runs from the scheduler at a slower rate, turns the
//!   accumulated transitions into detents and reports them.
//!
//! The position counter is the only state touched from both sides.
//!
//! One detent is four raw transitions. Transitions left over from a partial
//! detent stay pending until they add up to a whole one.

use core::sync::atomic::Ordering;

use cadence_hal::{InputPin, Millis};
use portable_atomic::AtomicI32;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::button::or_default;
use crate::unit::{Unit, Work};

pub const DEFAULT_POLL_RATE_MS: Millis = 30;

/// Raw transitions per mechanical detent
const TRANSITIONS_PER_DETENT: i32 = 4;

/// Position delta indexed by `new B << 3 | new A << 2 | old B << 1 | old A`
const TRANSITIONS: [i8; 16] = [0, 1, -1, 2, -1, 0, -2, 1, 1, -2, 0, -1, 2, -1, 1, 0];

/// Accumulated raw quadrature transitions
///
/// Safe to update from an interrupt while the poll side reads it.
#[derive(Debug, Default)]
pub struct QuadraturePosition(AtomicI32);

impl QuadraturePosition {
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Add `delta`, returning the previous value
    pub fn fetch_add(&self, delta: i32) -> i32 {
        self.0.fetch_add(delta, Ordering::Relaxed)
    }
}

/// Edge-side half of the encoder
#[derive(Debug)]
pub struct QuadratureDecoder<'p> {
    position: &'p QuadraturePosition,
    /// Previous line levels, A in bit 0 and B in bit 1
    state: u8,
}

impl<'p> QuadratureDecoder<'p> {
    /// Start decoding from the current line levels
    pub fn new(position: &'p QuadraturePosition, a: bool, b: bool) -> Self {
        Self {
            position,
            state: a as u8 | (b as u8) << 1,
        }
    }

    /// Handle an edge on either line, returning the applied delta
    pub fn on_edge(&mut self, a: bool, b: bool) -> i8 {
        let index = self.state | (a as u8) << 2 | (b as u8) << 3;
        self.state = index >> 2;

        let delta = TRANSITIONS[index as usize];
        if delta != 0 {
            self.position.fetch_add(delta as i32);
        }
        delta
    }

    pub fn position(&self) -> &'p QuadraturePosition {
        self.position
    }
}

/// Decoder fed by sampling two pins instead of edge interrupts
///
/// Has to run often enough to see every transition, typically every
/// millisecond.
pub struct PolledQuadrature<'p, A, B> {
    a: A,
    b: B,
    decoder: QuadratureDecoder<'p>,
}

impl<'p, A: InputPin, B: InputPin> PolledQuadrature<'p, A, B> {
    pub fn new(position: &'p QuadraturePosition, mut a: A, mut b: B) -> Self {
        let decoder = QuadratureDecoder::new(position, a.is_high(), b.is_high());
        Self { a, b, decoder }
    }

    /// Sample both lines once
    pub fn poll(&mut self) {
        let a = self.a.is_high();
        let b = self.b.is_high();
        self.decoder.on_edge(a, b);
    }

    /// Periodic unit sampling the lines every `interval`
    pub fn as_schedulable_unit(&mut self, interval: Millis) -> Unit<'_> {
        Unit::periodic(self, interval)
    }
}

impl<A: InputPin, B: InputPin> Work for PolledQuadrature<'_, A, B> {
    fn run(&mut self, _now: Millis) {
        self.poll();
    }
}

/// Rotation direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Clockwise => Direction::CounterClockwise,
            Direction::CounterClockwise => Direction::Clockwise,
        }
    }
}

/// Configuration of an [`Encoder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EncoderConfig {
    /// Reporting interval (ms)
    pub poll_rate_ms: Millis,
    /// Swap the reported directions
    pub reversed: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            poll_rate_ms: DEFAULT_POLL_RATE_MS,
            reversed: false,
        }
    }
}

impl EncoderConfig {
    /// Replace zero fields with defaults
    pub fn resolved(self) -> Self {
        Self {
            poll_rate_ms: or_default(self.poll_rate_ms, DEFAULT_POLL_RATE_MS),
            reversed: self.reversed,
        }
    }
}

/// Poll-side half of the encoder, reporting whole detents
pub struct Encoder<'a> {
    position: &'a QuadraturePosition,
    last: i32,
    reversed: bool,
    poll_rate: Millis,
    on_rotate: Option<&'a mut dyn FnMut(Direction, u32)>,
}

impl<'a> Encoder<'a> {
    pub fn new(position: &'a QuadraturePosition, config: EncoderConfig) -> Self {
        let config = config.resolved();
        Self {
            position,
            last: position.get(),
            reversed: config.reversed,
            poll_rate: config.poll_rate_ms,
            on_rotate: None,
        }
    }

    /// Apply new settings; a zero poll rate falls back to the default
    pub fn configure(&mut self, config: EncoderConfig) {
        let config = config.resolved();
        self.reversed = config.reversed;
        self.poll_rate = config.poll_rate_ms;
    }

    /// Called with the direction and number of detents turned since the
    /// last report
    pub fn set_on_rotate(&mut self, cb: &'a mut dyn FnMut(Direction, u32)) {
        self.on_rotate = Some(cb);
    }

    /// Report whole detents accumulated since the last report
    pub fn poll(&mut self) {
        let position = self.position.get();
        let steps = position.wrapping_sub(self.last) / TRANSITIONS_PER_DETENT;
        if steps == 0 {
            return;
        }

        let direction = if steps > 0 {
            Direction::CounterClockwise
        } else {
            Direction::Clockwise
        };
        let direction = if self.reversed {
            direction.opposite()
        } else {
            direction
        };

        if let Some(cb) = self.on_rotate.as_mut() {
            cb(direction, steps.unsigned_abs());
        }
        self.last = position;
    }

    pub fn poll_rate(&self) -> Millis {
        self.poll_rate
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// Periodic unit polling this encoder at its configured rate
    pub fn as_schedulable_unit(&mut self) -> Unit<'_> {
        let interval = self.poll_rate;
        Unit::periodic(self, interval)
    }
}

impl Work for Encoder<'_> {
    fn run(&mut self, _now: Millis) {
        self.poll();
    }
}
