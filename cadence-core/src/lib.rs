//! Board-agnostic core of the Cadence firmware toolkit
//!
//! This crate contains everything that does not depend on a specific chip:
//!
//! - Cooperative, time-ordered scheduler with CPU load estimation
//! - Schedulable units of periodic or one-shot work
//! - Push/release/click/hold classification for buttons
//! - Resistor-ladder button groups on one analog line, with calibration
//! - Quadrature rotary-encoder decoding
//! - Two-axis analog joystick sampling
//!
//! Devices never read the clock themselves: the scheduler hands every unit
//! the tick time, and each device implements [`Work`] by polling its
//! inputs and driving its state machine.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must stay first so the logging macros are visible to every module
#[macro_use]
mod fmt;

pub mod button;
pub mod encoder;
pub mod group;
pub mod joystick;
pub mod scheduler;
pub mod solo;
pub mod unit;

pub use button::{Button, ButtonConfig};
pub use encoder::{Direction, Encoder, EncoderConfig, PolledQuadrature, QuadratureDecoder, QuadraturePosition};
pub use group::{AnalogButtonReadout, ButtonGroup, ButtonGroupConfig};
pub use joystick::{Joystick, JoystickConfig};
pub use scheduler::{Scheduler, SubmitError, UnitId};
pub use solo::{SoloButton, SoloButtonConfig};
pub use unit::{Unit, UnitStats, Work};

pub use cadence_hal::Millis;
