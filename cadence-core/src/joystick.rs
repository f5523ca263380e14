//! Two-axis analog joystick
//!
//! Each [`Joystick::sample`] reads both potentiometers and updates raw
//! readings, per-sample raw differences, exponentially smoothed positions
//! normalized to `0.0..=1.0` and a smoothed rate of change. The push switch
//! most sticks carry is an ordinary [`SoloButton`](crate::SoloButton).

use cadence_hal::{adc, AnalogInput, Millis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::button::or_default;
use crate::unit::{Unit, Work};

pub const DEFAULT_POLL_RATE_MS: Millis = 30;
pub const DEFAULT_RESOLUTION: u8 = 12;

/// Smoothing ratio of the difference values
const DIFF_RATIO: f32 = 0.9;

/// Scale of the difference values relative to the position values
const DIFF_GAIN: f32 = 10.0;

/// Configuration of a [`Joystick`]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JoystickConfig {
    /// Sampling interval (ms)
    pub poll_rate_ms: Millis,
    /// Significant ADC bits, at most 16
    pub resolution: u8,
    pub reverse_x: bool,
    pub reverse_y: bool,
    /// Weight of the previous position when smoothing; 0.0 disables
    /// smoothing
    pub average_ratio: f32,
}

impl Default for JoystickConfig {
    fn default() -> Self {
        Self {
            poll_rate_ms: DEFAULT_POLL_RATE_MS,
            resolution: DEFAULT_RESOLUTION,
            reverse_x: false,
            reverse_y: false,
            average_ratio: 0.0,
        }
    }
}

impl JoystickConfig {
    /// Replace zero poll rate and resolution with defaults
    pub fn resolved(self) -> Self {
        Self {
            poll_rate_ms: or_default(self.poll_rate_ms, DEFAULT_POLL_RATE_MS),
            resolution: or_default(self.resolution, DEFAULT_RESOLUTION),
            ..self
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Axis {
    raw: u16,
    raw_diff: i32,
    value: f32,
    diff: f32,
}

impl Axis {
    fn update(&mut self, raw: u16, ratio: f32, scale: f32) {
        self.raw_diff = raw as i32 - self.raw as i32;
        self.raw = raw;
        self.value = ratio * self.value + (1.0 - ratio) * raw as f32 * scale;
        self.diff = DIFF_RATIO * self.diff + (1.0 - DIFF_RATIO) * self.raw_diff as f32 * DIFF_GAIN * scale;
    }
}

/// Joystick on two analog channels
pub struct Joystick<X, Y> {
    x_input: X,
    y_input: Y,
    x: Axis,
    y: Axis,
    config: JoystickConfig,
    scale: f32,
}

impl<X: AnalogInput, Y: AnalogInput> Joystick<X, Y> {
    /// # Panics
    ///
    /// If the configured resolution exceeds 16 bits.
    pub fn new(x_input: X, y_input: Y, config: JoystickConfig) -> Self {
        let config = config.resolved();
        assert!(
            config.resolution <= 16,
            "ADC resolution above 16 bits is not representable"
        );
        Self {
            x_input,
            y_input,
            x: Axis::default(),
            y: Axis::default(),
            config,
            scale: 1.0 / adc::max_value(config.resolution) as f32,
        }
    }

    /// Apply new settings; smoothed values carry over
    ///
    /// # Panics
    ///
    /// If the configured resolution exceeds 16 bits.
    pub fn configure(&mut self, config: JoystickConfig) {
        let config = config.resolved();
        assert!(
            config.resolution <= 16,
            "ADC resolution above 16 bits is not representable"
        );
        self.config = config;
        self.scale = 1.0 / adc::max_value(config.resolution) as f32;
    }

    /// Read both axes and update the derived values
    pub fn sample(&mut self) {
        let x = Self::read(&mut self.x_input, self.config.reverse_x, self.config.resolution);
        let y = Self::read(&mut self.y_input, self.config.reverse_y, self.config.resolution);
        self.x.update(x, self.config.average_ratio, self.scale);
        self.y.update(y, self.config.average_ratio, self.scale);
    }

    fn read<A: AnalogInput>(input: &mut A, reverse: bool, resolution: u8) -> u16 {
        let raw = input.read_u16();
        let raw = if reverse { u16::MAX - raw } else { raw };
        adc::to_resolution(raw, resolution)
    }

    /// Last readings at the configured resolution
    pub fn raw_values(&self) -> (u16, u16) {
        (self.x.raw, self.y.raw)
    }

    /// Change of the raw readings over the last sample
    pub fn raw_diffs(&self) -> (i32, i32) {
        (self.x.raw_diff, self.y.raw_diff)
    }

    /// Smoothed positions in `0.0..=1.0`
    pub fn values(&self) -> (f32, f32) {
        (self.x.value, self.y.value)
    }

    /// Smoothed rate of change
    pub fn diff_values(&self) -> (f32, f32) {
        (self.x.diff, self.y.diff)
    }

    pub fn config(&self) -> &JoystickConfig {
        &self.config
    }

    /// Periodic unit sampling this joystick at its configured rate
    pub fn as_schedulable_unit(&mut self) -> Unit<'_> {
        let interval = self.config.poll_rate_ms;
        Unit::periodic(self, interval)
    }
}

impl<X: AnalogInput, Y: AnalogInput> Work for Joystick<X, Y> {
    fn run(&mut self, _now: Millis) {
        self.sample();
    }
}
