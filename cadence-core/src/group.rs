//! Several buttons sharing one analog input
//!
//! A resistor ladder puts each button at its own voltage. Every poll reads
//! the ADC once and hands each registered [`Button`] the result of a band
//! test `lower <= value < upper`. With nothing pressed the line sits at the
//! idle sentinel, the largest reading the configured resolution can
//! produce.
//!
//! The bands can be learned at runtime with [`ButtonGroup::start_calibration`]:
//! each button in turn is pressed and held until enough samples were taken,
//! then released. Calibration has no timeout; it waits at the current
//! button until that button is pressed and released.

use cadence_hal::{adc, AnalogInput, Millis};
use heapless::Vec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::button::{or_default, Button};
use crate::unit::{Unit, Work};

pub const DEFAULT_POLL_RATE_MS: Millis = 10;
pub const DEFAULT_RESOLUTION: u8 = 12;
pub const DEFAULT_EPSILON: u16 = 30;
pub const DEFAULT_SAMPLE_QUOTA: u32 = 200;

/// Configuration of a [`ButtonGroup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ButtonGroupConfig {
    /// Sampling interval (ms)
    pub poll_rate_ms: Millis,
    /// Significant ADC bits, at most 16
    pub resolution: u8,
    /// Half width of a band around the calibrated mean (raw units)
    pub epsilon: u16,
    /// Samples collected per button during calibration
    pub sample_quota: u32,
}

impl Default for ButtonGroupConfig {
    fn default() -> Self {
        Self {
            poll_rate_ms: DEFAULT_POLL_RATE_MS,
            resolution: DEFAULT_RESOLUTION,
            epsilon: DEFAULT_EPSILON,
            sample_quota: DEFAULT_SAMPLE_QUOTA,
        }
    }
}

impl ButtonGroupConfig {
    /// Replace zero fields with defaults
    pub fn resolved(self) -> Self {
        Self {
            poll_rate_ms: or_default(self.poll_rate_ms, DEFAULT_POLL_RATE_MS),
            resolution: or_default(self.resolution, DEFAULT_RESOLUTION),
            epsilon: or_default(self.epsilon, DEFAULT_EPSILON),
            sample_quota: or_default(self.sample_quota, DEFAULT_SAMPLE_QUOTA),
        }
    }
}

/// One button of a group and the band it answers to
pub struct AnalogButtonReadout<'a> {
    pub mean: u16,
    pub lower: u16,
    pub upper: u16,
    pub button: Button<'a>,
}

impl AnalogButtonReadout<'_> {
    fn set_band(&mut self, mean: u16, epsilon: u16) {
        self.mean = mean;
        self.lower = mean.saturating_sub(epsilon);
        self.upper = mean.saturating_add(epsilon);
    }

    /// Whether `value` falls in `[lower, upper)`
    pub fn matches(&self, value: u16) -> bool {
        self.lower <= value && value < self.upper
    }
}

#[derive(Debug, Clone, Copy)]
struct Calibration {
    target: usize,
    /// Wide enough for any `u32` quota of 16-bit samples
    sum: u64,
    count: u32,
    min: u16,
    max: u16,
    collecting: bool,
}

impl Calibration {
    fn new(target: usize) -> Self {
        Self {
            target,
            sum: 0,
            count: 0,
            min: u16::MAX,
            max: u16::MIN,
            collecting: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Polling,
    Calibrating(Calibration),
}

/// Up to `N` buttons demultiplexed from one analog channel
pub struct ButtonGroup<'a, A, const N: usize> {
    input: A,
    readouts: Vec<AnalogButtonReadout<'a>, N>,
    poll_rate: Millis,
    resolution: u8,
    epsilon: u16,
    sample_quota: u32,
    mode: Mode,
}

impl<'a, A: AnalogInput, const N: usize> ButtonGroup<'a, A, N> {
    /// Create an empty group
    ///
    /// # Panics
    ///
    /// If the configured resolution exceeds 16 bits.
    pub fn new(input: A, config: ButtonGroupConfig) -> Self {
        let config = config.resolved();
        assert!(
            config.resolution <= 16,
            "ADC resolution above 16 bits is not representable"
        );
        Self {
            input,
            readouts: Vec::new(),
            poll_rate: config.poll_rate_ms,
            resolution: config.resolution,
            epsilon: config.epsilon,
            sample_quota: config.sample_quota,
            mode: Mode::Polling,
        }
    }

    /// Apply new settings
    ///
    /// Bands already stored keep their width; a new epsilon applies to
    /// buttons added or calibrated afterwards.
    ///
    /// # Panics
    ///
    /// If the configured resolution exceeds 16 bits.
    pub fn configure(&mut self, config: ButtonGroupConfig) {
        let config = config.resolved();
        assert!(
            config.resolution <= 16,
            "ADC resolution above 16 bits is not representable"
        );
        self.poll_rate = config.poll_rate_ms;
        self.resolution = config.resolution;
        self.epsilon = config.epsilon;
        self.sample_quota = config.sample_quota;
    }

    /// Register a button answering to readings around `expected`
    ///
    /// Returns the button's index.
    ///
    /// # Panics
    ///
    /// If the group already holds `N` buttons.
    pub fn add_button(&mut self, button: Button<'a>, expected: u16) -> usize {
        let mut readout = AnalogButtonReadout {
            mean: 0,
            lower: 0,
            upper: 0,
            button,
        };
        readout.set_band(expected, self.epsilon);

        if self.readouts.push(readout).is_err() {
            panic!("button group is full ({} buttons)", N);
        }
        self.readouts.len() - 1
    }

    /// # Panics
    ///
    /// If no button was registered at `index`.
    pub fn button_mut(&mut self, index: usize) -> &mut Button<'a> {
        &mut self.readout_mut(index).button
    }

    /// # Panics
    ///
    /// If no button was registered at `index`.
    pub fn readout(&self, index: usize) -> &AnalogButtonReadout<'a> {
        match self.readouts.get(index) {
            Some(readout) => readout,
            None => panic!("no button at index {}", index),
        }
    }

    pub fn len(&self) -> usize {
        self.readouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readouts.is_empty()
    }

    /// Reading reported while no button is pressed
    pub fn idle_value(&self) -> u16 {
        adc::max_value(self.resolution)
    }

    /// Begin learning the band of every registered button, in index order
    ///
    /// Normal polling is suspended until the last button was calibrated.
    /// Does nothing for an empty group.
    pub fn start_calibration(&mut self) {
        if self.readouts.is_empty() {
            return;
        }
        info!("calibration: press and hold button 0");
        self.mode = Mode::Calibrating(Calibration::new(0));
    }

    pub fn is_calibrating(&self) -> bool {
        matches!(self.mode, Mode::Calibrating(_))
    }

    /// Index of the button currently being calibrated
    pub fn calibration_target(&self) -> Option<usize> {
        match self.mode {
            Mode::Calibrating(cal) => Some(cal.target),
            Mode::Polling => None,
        }
    }

    /// Sample the shared input once
    pub fn poll(&mut self, now: Millis) {
        let value = adc::to_resolution(self.input.read_u16(), self.resolution);
        match self.mode {
            Mode::Polling => {
                for readout in self.readouts.iter_mut() {
                    let pressed = readout.matches(value);
                    readout.button.poll(pressed, now);
                }
            }
            Mode::Calibrating(mut cal) => {
                self.mode = self.calibrate(&mut cal, value);
            }
        }
    }

    /// Periodic unit polling this group at its configured rate
    pub fn as_schedulable_unit(&mut self) -> Unit<'_> {
        let interval = self.poll_rate;
        Unit::periodic(self, interval)
    }

    fn calibrate(&mut self, cal: &mut Calibration, value: u16) -> Mode {
        let idle = self.idle_value();

        if cal.collecting {
            if value != idle {
                cal.sum += value as u64;
                cal.count += 1;
                cal.min = cal.min.min(value);
                cal.max = cal.max.max(value);
                if cal.count >= self.sample_quota {
                    cal.collecting = false;
                    info!("calibration: release button {}", cal.target);
                }
            }
            return Mode::Calibrating(*cal);
        }

        if value != idle {
            return Mode::Calibrating(*cal);
        }

        let mean = (cal.sum / cal.count as u64) as u16;
        let epsilon = self.epsilon;
        let readout = self.readout_mut(cal.target);
        readout.set_band(mean, epsilon);
        info!(
            "calibration: button {} mean {} band [{}, {}) spread {}..{}",
            cal.target,
            readout.mean,
            readout.lower,
            readout.upper,
            cal.min,
            cal.max
        );

        let next = cal.target + 1;
        if next < self.readouts.len() {
            info!("calibration: press and hold button {}", next);
            Mode::Calibrating(Calibration::new(next))
        } else {
            info!("calibration done");
            Mode::Polling
        }
    }

    fn readout_mut(&mut self, index: usize) -> &mut AnalogButtonReadout<'a> {
        match self.readouts.get_mut(index) {
            Some(readout) => readout,
            None => panic!("no button at index {}", index),
        }
    }
}

impl<A: AnalogInput, const N: usize> Work for ButtonGroup<'_, A, N> {
    fn run(&mut self, now: Millis) {
        self.poll(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_hal::mock::MockAnalog;
    use core::cell::Cell;

    const IDLE: u16 = 4095;

    fn group(adc: &MockAnalog) -> ButtonGroup<'_, &MockAnalog, 3> {
        ButtonGroup::new(adc, ButtonGroupConfig::default())
    }

    #[test]
    fn test_band_is_half_open() {
        let adc = MockAnalog::new(0);
        let mut group = group(&adc);
        let index = group.add_button(Button::default(), 1000);

        let readout = group.readout(index);
        assert_eq!((readout.lower, readout.upper), (970, 1030));
        assert!(readout.matches(970));
        assert!(readout.matches(1029));
        assert!(!readout.matches(1030));
        assert!(!readout.matches(969));
    }

    #[test]
    fn test_band_saturates() {
        let adc = MockAnalog::new(0);
        let mut group = group(&adc);
        group.add_button(Button::default(), 10);
        assert_eq!(group.readout(0).lower, 0);
        assert_eq!(group.readout(0).upper, 40);
    }

    #[test]
    fn test_polling_routes_to_matching_button() {
        let adc = MockAnalog::new(u16::MAX);
        let first = Cell::new(0u32);
        let second = Cell::new(0u32);
        let mut on_first = || first.set(first.get() + 1);
        let mut on_second = || second.set(second.get() + 1);

        let mut a = Button::default();
        a.set_on_push(&mut on_first);
        let mut b = Button::default();
        b.set_on_push(&mut on_second);

        let mut group = group(&adc);
        group.add_button(a, 1000);
        group.add_button(b, 2000);

        group.poll(0);
        assert_eq!((first.get(), second.get()), (0, 0));

        adc.set_counts(2010, 12);
        group.poll(10);
        group.poll(20);
        assert_eq!((first.get(), second.get()), (0, 1));
        assert!(group.readout(1).button.is_pressed());
        assert!(!group.readout(0).button.is_pressed());

        adc.set_counts(IDLE, 12);
        group.poll(30);
        assert!(!group.readout(1).button.is_pressed());
    }

    #[test]
    fn test_calibration_learns_mean() {
        let adc = MockAnalog::new(0);
        let mut group = group(&adc);
        group.add_button(Button::default(), 500);
        group.start_calibration();
        assert_eq!(group.calibration_target(), Some(0));

        // releasing from a previous press
        adc.set_counts(IDLE, 12);
        for _ in 0..5 {
            group.poll(0);
        }

        // 200 samples averaging 2000
        for i in 0..200u16 {
            let value = if i % 2 == 0 { 1990 } else { 2010 };
            adc.set_counts(value, 12);
            group.poll(0);
        }
        assert!(group.is_calibrating());

        // extra samples while still held are ignored
        adc.set_counts(3000, 12);
        group.poll(0);
        assert!(group.is_calibrating());

        adc.set_counts(IDLE, 12);
        group.poll(0);
        assert!(!group.is_calibrating());

        let readout = group.readout(0);
        assert_eq!(readout.mean, 2000);
        assert_eq!((readout.lower, readout.upper), (1970, 2030));
    }

    #[test]
    fn test_calibration_large_quota_at_full_resolution() {
        let adc = MockAnalog::new(u16::MAX);
        let mut group: ButtonGroup<'_, _, 1> = ButtonGroup::new(
            &adc,
            ButtonGroupConfig {
                resolution: 16,
                sample_quota: 70_000,
                ..Default::default()
            },
        );
        group.add_button(Button::default(), 0);
        group.start_calibration();

        adc.set_counts(65_000, 16);
        for _ in 0..70_000 {
            group.poll(0);
        }
        adc.set_counts(u16::MAX, 16);
        group.poll(0);

        assert!(!group.is_calibrating());
        let readout = group.readout(0);
        assert_eq!(readout.mean, 65_000);
        assert_eq!((readout.lower, readout.upper), (64_970, 65_030));
    }

    #[test]
    fn test_calibration_walks_every_button() {
        let adc = MockAnalog::new(0);
        let mut group: ButtonGroup<'_, _, 2> = ButtonGroup::new(
            &adc,
            ButtonGroupConfig {
                sample_quota: 4,
                epsilon: 10,
                ..Default::default()
            },
        );
        group.add_button(Button::default(), 0);
        group.add_button(Button::default(), 0);
        group.start_calibration();

        for (target, value) in [(0usize, 800u16), (1, 1600)] {
            assert_eq!(group.calibration_target(), Some(target));
            adc.set_counts(value, 12);
            for _ in 0..4 {
                group.poll(0);
            }
            adc.set_counts(IDLE, 12);
            group.poll(0);
        }

        assert_eq!(group.calibration_target(), None);
        assert_eq!((group.readout(0).lower, group.readout(0).upper), (790, 810));
        assert_eq!((group.readout(1).lower, group.readout(1).upper), (1590, 1610));
    }

    #[test]
    fn test_configure_changes_later_bands() {
        let adc = MockAnalog::new(0);
        let mut group = group(&adc);
        group.add_button(Button::default(), 1000);
        group.configure(ButtonGroupConfig {
            epsilon: 50,
            ..Default::default()
        });
        group.add_button(Button::default(), 2000);

        assert_eq!(group.readout(0).upper, 1030);
        assert_eq!(group.readout(1).upper, 2050);
    }

    #[test]
    fn test_calibration_of_empty_group_is_noop() {
        let adc = MockAnalog::new(0);
        let mut group = group(&adc);
        group.start_calibration();
        assert!(!group.is_calibrating());
    }

    #[test]
    fn test_idle_value_follows_resolution() {
        let adc = MockAnalog::new(0);
        let group: ButtonGroup<'_, _, 1> = ButtonGroup::new(
            &adc,
            ButtonGroupConfig {
                resolution: 10,
                ..Default::default()
            },
        );
        assert_eq!(group.idle_value(), 1023);
    }

    #[test]
    fn test_scheduled_group_polls_at_its_rate() {
        use crate::scheduler::Scheduler;
        use cadence_hal::mock::MockClock;

        let clock = MockClock::new();
        let adc = MockAnalog::new(u16::MAX);
        let pushes = Cell::new(0u32);
        let mut on_push = || pushes.set(pushes.get() + 1);

        let mut button = Button::default();
        button.set_on_push(&mut on_push);
        let mut group = group(&adc);
        group.add_button(button, 1500);

        let mut scheduler: Scheduler<'_, _, 2> = Scheduler::new(&clock);
        let id = scheduler.submit(group.as_schedulable_unit()).ok();
        assert!(id.is_some());

        adc.set_counts(1500, 12);
        for ms in 1..=50 {
            clock.set_ms(ms);
            scheduler.tick_now();
        }

        assert_eq!(pushes.get(), 1);
        let calls = id.and_then(|id| scheduler.unit(id)).map(|unit| unit.stats().calls);
        assert_eq!(calls, Some(5));
    }

    #[test]
    #[should_panic(expected = "button group is full")]
    fn test_add_beyond_capacity_panics() {
        let adc = MockAnalog::new(0);
        let mut group: ButtonGroup<'_, _, 1> = ButtonGroup::new(&adc, ButtonGroupConfig::default());
        group.add_button(Button::default(), 100);
        group.add_button(Button::default(), 200);
    }

    #[test]
    #[should_panic(expected = "no button at index 2")]
    fn test_unknown_index_panics() {
        let adc = MockAnalog::new(0);
        let mut group = group(&adc);
        group.add_button(Button::default(), 100);
        group.button_mut(2);
    }

    #[test]
    #[should_panic]
    fn test_resolution_above_16_bits_panics() {
        let adc = MockAnalog::new(0);
        let _group: ButtonGroup<'_, _, 1> = ButtonGroup::new(
            &adc,
            ButtonGroupConfig {
                resolution: 17,
                ..Default::default()
            },
        );
    }
}
