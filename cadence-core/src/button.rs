//! Push-button event classification
//!
//! Turns a stream of "is pressed" samples into four events, separated
//! purely by elapsed time:
//!
//! - Push: the button went down (once)
//! - Release: the button came back up (once)
//! - Pressed: down and up again within the hold threshold (a click)
//! - Hold: still down after the hold threshold, repeated at the hold rate
//!
//! Samples must already be debounced. A bouncing contact produces one
//! push/release pair per bounce.

use cadence_hal::Millis;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default time after which a press counts as a hold
pub const DEFAULT_HOLD_THRESHOLD_MS: Millis = 500;

/// Default interval between repeated hold events
pub const DEFAULT_HOLD_REPEAT_MS: Millis = 100;

/// Button timing configuration
///
/// Fields left at zero fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ButtonConfig {
    /// Press duration at which hold events start (ms)
    pub hold_threshold_ms: Millis,
    /// Interval between hold events while held (ms)
    pub hold_repeat_ms: Millis,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            hold_threshold_ms: DEFAULT_HOLD_THRESHOLD_MS,
            hold_repeat_ms: DEFAULT_HOLD_REPEAT_MS,
        }
    }
}

impl ButtonConfig {
    /// Replace zero fields with defaults
    pub fn resolved(self) -> Self {
        Self {
            hold_threshold_ms: or_default(self.hold_threshold_ms, DEFAULT_HOLD_THRESHOLD_MS),
            hold_repeat_ms: or_default(self.hold_repeat_ms, DEFAULT_HOLD_REPEAT_MS),
        }
    }
}

pub(crate) fn or_default<T: Default + PartialEq>(value: T, default: T) -> T {
    if value == T::default() {
        default
    } else {
        value
    }
}

/// Push/release/click/hold state machine
pub struct Button<'a> {
    hold_threshold: Millis,
    hold_repeat: Millis,
    pushed_at: Option<Millis>,
    last_hold_call: Option<Millis>,
    holding: bool,
    on_push: Option<&'a mut dyn FnMut()>,
    on_release: Option<&'a mut dyn FnMut()>,
    on_pressed: Option<&'a mut dyn FnMut()>,
    on_hold: Option<&'a mut dyn FnMut(bool)>,
}

impl Default for Button<'_> {
    fn default() -> Self {
        Self::new(ButtonConfig::default())
    }
}

impl<'a> Button<'a> {
    /// Create an idle button without callbacks
    pub fn new(config: ButtonConfig) -> Self {
        let config = config.resolved();
        Self {
            hold_threshold: config.hold_threshold_ms,
            hold_repeat: config.hold_repeat_ms,
            pushed_at: None,
            last_hold_call: None,
            holding: false,
            on_push: None,
            on_release: None,
            on_pressed: None,
            on_hold: None,
        }
    }

    /// Apply new timing; zero fields fall back to defaults
    pub fn configure(&mut self, config: ButtonConfig) {
        let config = config.resolved();
        self.hold_threshold = config.hold_threshold_ms;
        self.hold_repeat = config.hold_repeat_ms;
    }

    /// Called once when the button goes down
    pub fn set_on_push(&mut self, cb: &'a mut dyn FnMut()) {
        self.on_push = Some(cb);
    }

    /// Called once when the button comes back up
    pub fn set_on_release(&mut self, cb: &'a mut dyn FnMut()) {
        self.on_release = Some(cb);
    }

    /// Called after release when the press was shorter than the hold threshold
    pub fn set_on_pressed(&mut self, cb: &'a mut dyn FnMut()) {
        self.on_pressed = Some(cb);
    }

    /// Called repeatedly while held; the argument is `true` for the first
    /// call of a hold
    pub fn set_on_hold(&mut self, cb: &'a mut dyn FnMut(bool)) {
        self.on_hold = Some(cb);
    }

    /// Feed one sample taken at `now`
    pub fn poll(&mut self, pressed: bool, now: Millis) {
        match (pressed, self.pushed_at) {
            (true, None) => {
                self.pushed_at = Some(now);
                fire(&mut self.on_push);
            }
            (true, Some(pushed_at)) => {
                if !self.holding && now.saturating_sub(pushed_at) >= self.hold_threshold {
                    if let Some(cb) = self.on_hold.as_mut() {
                        cb(true);
                    }
                    self.holding = true;
                    self.last_hold_call = Some(now);
                }

                if let Some(last) = self.last_hold_call {
                    if self.holding && now.saturating_sub(last) >= self.hold_repeat {
                        if let Some(cb) = self.on_hold.as_mut() {
                            cb(false);
                        }
                        self.last_hold_call = Some(now);
                    }
                }
            }
            (false, Some(pushed_at)) => {
                fire(&mut self.on_release);
                if now.saturating_sub(pushed_at) < self.hold_threshold {
                    fire(&mut self.on_pressed);
                }
                self.pushed_at = None;
                self.last_hold_call = None;
                self.holding = false;
            }
            (false, None) => {}
        }
    }

    /// Whether the button is currently down
    pub fn is_pressed(&self) -> bool {
        self.pushed_at.is_some()
    }

    /// Whether the current press has passed the hold threshold
    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Configured hold threshold (ms)
    pub fn hold_threshold(&self) -> Millis {
        self.hold_threshold
    }

    /// Configured hold repeat interval (ms)
    pub fn hold_repeat(&self) -> Millis {
        self.hold_repeat
    }
}

fn fire(cb: &mut Option<&mut dyn FnMut()>) {
    if let Some(cb) = cb {
        cb();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::{Cell, RefCell};

    #[derive(Default)]
    struct Counts {
        push: Cell<u32>,
        release: Cell<u32>,
        pressed: Cell<u32>,
        holds: RefCell<heapless::Vec<(Millis, bool), 16>>,
        now: Cell<Millis>,
    }

    fn bump(c: &Cell<u32>) {
        c.set(c.get() + 1);
    }

    /// Sample every 10ms: down during `[0, held_ms)`, up at `held_ms`
    fn press_for(button: &mut Button<'_>, counts: &Counts, held_ms: Millis) {
        let mut now = 0;
        while now < held_ms {
            counts.now.set(now);
            button.poll(true, now);
            now += 10;
        }
        counts.now.set(held_ms);
        button.poll(false, held_ms);
    }

    #[test]
    fn test_short_press_is_a_click() {
        let counts = Counts::default();
        let mut on_push = || bump(&counts.push);
        let mut on_release = || bump(&counts.release);
        let mut on_pressed = || bump(&counts.pressed);
        let mut on_hold = |first: bool| {
            let _ = counts.holds.borrow_mut().push((counts.now.get(), first));
        };

        let mut button = Button::new(ButtonConfig::default());
        button.set_on_push(&mut on_push);
        button.set_on_release(&mut on_release);
        button.set_on_pressed(&mut on_pressed);
        button.set_on_hold(&mut on_hold);

        press_for(&mut button, &counts, 300);

        assert_eq!(counts.push.get(), 1);
        assert_eq!(counts.release.get(), 1);
        assert_eq!(counts.pressed.get(), 1);
        assert!(counts.holds.borrow().is_empty());
        assert!(!button.is_pressed());
    }

    #[test]
    fn test_long_press_holds_and_repeats() {
        let counts = Counts::default();
        let mut on_push = || bump(&counts.push);
        let mut on_release = || bump(&counts.release);
        let mut on_pressed = || bump(&counts.pressed);
        let mut on_hold = |first: bool| {
            let _ = counts.holds.borrow_mut().push((counts.now.get(), first));
        };

        let mut button = Button::new(ButtonConfig {
            hold_threshold_ms: 500,
            hold_repeat_ms: 100,
        });
        button.set_on_push(&mut on_push);
        button.set_on_release(&mut on_release);
        button.set_on_pressed(&mut on_pressed);
        button.set_on_hold(&mut on_hold);

        press_for(&mut button, &counts, 650);

        assert_eq!(counts.push.get(), 1);
        assert_eq!(counts.release.get(), 1);
        assert_eq!(counts.pressed.get(), 0);
        assert_eq!(counts.holds.borrow().as_slice(), &[(500, true), (600, false)]);
    }

    #[test]
    fn test_holding_flag_follows_threshold() {
        let mut button = Button::default();

        button.poll(true, 1000);
        assert!(button.is_pressed());
        assert!(!button.is_holding());

        button.poll(true, 1499);
        assert!(!button.is_holding());

        button.poll(true, 1500);
        assert!(button.is_holding());

        button.poll(false, 1510);
        assert!(!button.is_pressed());
        assert!(!button.is_holding());
    }

    #[test]
    fn test_missing_callbacks_are_ignored() {
        let mut button = Button::default();
        for now in (0..800).step_by(10) {
            button.poll(true, now);
        }
        button.poll(false, 800);
        assert!(!button.is_pressed());
    }

    #[test]
    fn test_zero_config_falls_back_to_defaults() {
        let button = Button::new(ButtonConfig {
            hold_threshold_ms: 0,
            hold_repeat_ms: 250,
        });
        assert_eq!(button.hold_threshold(), DEFAULT_HOLD_THRESHOLD_MS);
        assert_eq!(button.hold_repeat(), 250);

        let mut button = Button::default();
        button.configure(ButtonConfig {
            hold_threshold_ms: 800,
            hold_repeat_ms: 0,
        });
        assert_eq!(button.hold_threshold(), 800);
        assert_eq!(button.hold_repeat(), DEFAULT_HOLD_REPEAT_MS);
    }

    #[test]
    fn test_second_press_starts_fresh() {
        let counts = Counts::default();
        let mut on_pressed = || bump(&counts.pressed);

        let mut button = Button::default();
        button.set_on_pressed(&mut on_pressed);

        press_for(&mut button, &counts, 700);
        assert_eq!(counts.pressed.get(), 0);

        press_for(&mut button, &counts, 100);
        assert_eq!(counts.pressed.get(), 1);
    }
}
