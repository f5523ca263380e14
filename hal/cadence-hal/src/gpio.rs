//! GPIO pin abstractions
//!
//! Provides the digital input trait sampled by buttons and encoders, plus
//! an adapter for any `embedded-hal` 1.0 input pin.

/// Digital input pin
///
/// Takes `&mut self` because some pin implementations (expanders, bus
/// backed inputs) need mutable access to sample.
pub trait InputPin {
    /// Check if the pin reads high (logic 1)
    fn is_high(&mut self) -> bool;

    /// Check if the pin reads low (logic 0)
    fn is_low(&mut self) -> bool {
        !self.is_high()
    }
}

impl<P: InputPin + ?Sized> InputPin for &mut P {
    fn is_high(&mut self) -> bool {
        (**self).is_high()
    }
}

/// Adapter from an `embedded-hal` input pin
///
/// A failed read is reported as low and latches a sticky fault flag.
/// The flag is never cleared by reads; callers poll [`EhInput::has_fault`]
/// and reset it explicitly.
pub struct EhInput<P> {
    pin: P,
    fault: bool,
}

impl<P: embedded_hal::digital::InputPin> EhInput<P> {
    /// Wrap an `embedded-hal` pin
    pub fn new(pin: P) -> Self {
        Self { pin, fault: false }
    }

    /// Whether any read has failed since the last [`EhInput::clear_fault`]
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    /// Reset the sticky fault flag
    pub fn clear_fault(&mut self) {
        self.fault = false;
    }

    /// Release the wrapped pin
    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P: embedded_hal::digital::InputPin> InputPin for EhInput<P> {
    fn is_high(&mut self) -> bool {
        match self.pin.is_high() {
            Ok(high) => high,
            Err(_) => {
                self.fault = true;
                false
            }
        }
    }
}
