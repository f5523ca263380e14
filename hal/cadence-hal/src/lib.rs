//! Cadence Hardware Abstraction Layer
//!
//! The scheduling core only ever needs three things from the hardware:
//! a monotonic time source, digital line levels and raw analog readings.
//! This crate defines those seams so the core stays board-agnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (cadence-firmware, etc.)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cadence-core (scheduler, devices)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  cadence-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ cadence-hal-  │
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`clock::Clock`] - Monotonic millisecond/microsecond time
//! - [`gpio::InputPin`] - Digital input
//! - [`adc::AnalogInput`] - Left-justified analog readings

#![no_std]
#![deny(unsafe_code)]

pub mod adc;
pub mod clock;
pub mod gpio;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export key traits at crate root for convenience
pub use adc::AnalogInput;
pub use clock::{Clock, Millis};
pub use gpio::{EhInput, InputPin};
