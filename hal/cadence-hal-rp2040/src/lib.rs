//! RP2040 backend for the Cadence HAL
//!
//! - [`EmbassyClock`] - time since startup from the embassy time driver
//! - [`RpAnalogInput`] - one ADC channel on the shared blocking ADC
//!
//! Digital inputs need no wrapper of their own: `embassy_rp::gpio::Input`
//! implements `embedded_hal::digital::InputPin`, so
//! [`cadence_hal::EhInput`] adapts it directly.

#![no_std]
#![deny(unsafe_code)]

pub mod adc;
pub mod clock;

pub use adc::RpAnalogInput;
pub use clock::EmbassyClock;
