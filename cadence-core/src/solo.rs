//! A [`Button`] wired to its own digital input

use cadence_hal::{InputPin, Millis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::button::{or_default, Button, ButtonConfig};
use crate::unit::{Unit, Work};

/// Default sampling interval for digital buttons
pub const DEFAULT_POLL_RATE_MS: Millis = 10;

/// Configuration of a [`SoloButton`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SoloButtonConfig {
    /// Timing of the button state machine
    pub button: ButtonConfig,
    /// Sampling interval (ms)
    pub poll_rate_ms: Millis,
    /// Pressed reads as low (pull-up wiring)
    pub active_low: bool,
}

impl Default for SoloButtonConfig {
    fn default() -> Self {
        Self {
            button: ButtonConfig::default(),
            poll_rate_ms: DEFAULT_POLL_RATE_MS,
            active_low: false,
        }
    }
}

impl SoloButtonConfig {
    /// Replace zero fields with defaults
    pub fn resolved(self) -> Self {
        Self {
            button: self.button.resolved(),
            poll_rate_ms: or_default(self.poll_rate_ms, DEFAULT_POLL_RATE_MS),
            active_low: self.active_low,
        }
    }
}

/// Single button on a dedicated pin
pub struct SoloButton<'a, P> {
    pin: P,
    button: Button<'a>,
    poll_rate: Millis,
    active_low: bool,
}

impl<'a, P: InputPin> SoloButton<'a, P> {
    pub fn new(pin: P, config: SoloButtonConfig) -> Self {
        let config = config.resolved();
        Self {
            pin,
            button: Button::new(config.button),
            poll_rate: config.poll_rate_ms,
            active_low: config.active_low,
        }
    }

    /// Apply new settings; zero fields fall back to defaults
    pub fn configure(&mut self, config: SoloButtonConfig) {
        let config = config.resolved();
        self.button.configure(config.button);
        self.poll_rate = config.poll_rate_ms;
        self.active_low = config.active_low;
    }

    /// Sample the pin once and feed the state machine
    pub fn poll(&mut self, now: Millis) {
        let pressed = if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        };
        self.button.poll(pressed, now);
    }

    /// The underlying state machine, for callback registration
    pub fn button_mut(&mut self) -> &mut Button<'a> {
        &mut self.button
    }

    pub fn button(&self) -> &Button<'a> {
        &self.button
    }

    pub fn poll_rate(&self) -> Millis {
        self.poll_rate
    }

    /// Periodic unit polling this button at its configured rate
    pub fn as_schedulable_unit(&mut self) -> Unit<'_> {
        let interval = self.poll_rate;
        Unit::periodic(self, interval)
    }

    /// Release the pin
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: InputPin> Work for SoloButton<'_, P> {
    fn run(&mut self, now: Millis) {
        self.poll(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use cadence_hal::mock::{MockClock, MockPin};
    use core::cell::Cell;

    #[test]
    fn test_active_high() {
        let pin = MockPin::new(false);
        let mut solo = SoloButton::new(&pin, SoloButtonConfig::default());

        solo.poll(0);
        assert!(!solo.button().is_pressed());

        pin.set_high(true);
        solo.poll(10);
        assert!(solo.button().is_pressed());
    }

    #[test]
    fn test_active_low() {
        let pin = MockPin::new(true);
        let mut solo = SoloButton::new(
            &pin,
            SoloButtonConfig {
                active_low: true,
                ..Default::default()
            },
        );

        solo.poll(0);
        assert!(!solo.button().is_pressed());

        pin.set_high(false);
        solo.poll(10);
        assert!(solo.button().is_pressed());
    }

    #[test]
    fn test_zero_fields_resolved() {
        let pin = MockPin::new(false);
        let config = SoloButtonConfig {
            button: ButtonConfig {
                hold_threshold_ms: 0,
                hold_repeat_ms: 0,
            },
            poll_rate_ms: 0,
            active_low: false,
        };
        let solo = SoloButton::new(&pin, config);
        assert_eq!(solo.poll_rate(), DEFAULT_POLL_RATE_MS);
        assert_eq!(solo.button().hold_threshold(), 500);
    }

    #[test]
    fn test_click_through_scheduler() {
        let clock = MockClock::new();
        let pin = MockPin::new(false);
        let clicks = Cell::new(0u32);
        let mut on_pressed = || clicks.set(clicks.get() + 1);

        let mut solo = SoloButton::new(&pin, SoloButtonConfig::default());
        solo.button_mut().set_on_pressed(&mut on_pressed);

        let mut scheduler: Scheduler<'_, _, 4> = Scheduler::new(&clock);
        assert!(scheduler.submit(solo.as_schedulable_unit()).is_ok());

        for ms in 1..=400 {
            if ms == 100 {
                pin.set_high(true);
            }
            if ms == 250 {
                pin.set_high(false);
            }
            clock.set_ms(ms);
            scheduler.tick_now();
        }

        assert_eq!(clicks.get(), 1);
        // sampled every 10ms
        assert_eq!(pin.reads(), 40);
    }
}
