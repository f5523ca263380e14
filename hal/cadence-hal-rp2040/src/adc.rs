//! ADC channels
//!
//! RP2040 has a single 12-bit ADC with 5 channels:
//! - ADC0: GPIO26
//! - ADC1: GPIO27
//! - ADC2: GPIO28
//! - ADC3: GPIO29
//! - ADC4: Internal temperature sensor
//!
//! Several [`RpAnalogInput`]s share the converter through a `RefCell`.
//! Conversions are blocking and only ever issued from the tick loop.

use core::cell::RefCell;

use cadence_hal::AnalogInput;
use embassy_rp::adc::{Adc, Blocking, Channel};

/// Shift from the native 12-bit sample to a left-justified 16-bit reading
const LEFT_JUSTIFY: u32 = 16 - 12;

/// One ADC channel
pub struct RpAnalogInput<'a, 'd> {
    adc: &'a RefCell<Adc<'d, Blocking>>,
    channel: Channel<'d>,
    fault: bool,
}

impl<'a, 'd> RpAnalogInput<'a, 'd> {
    pub fn new(adc: &'a RefCell<Adc<'d, Blocking>>, channel: Channel<'d>) -> Self {
        Self {
            adc,
            channel,
            fault: false,
        }
    }

    /// Whether a conversion has failed since the last [`Self::clear_fault`]
    ///
    /// A failed conversion reads as full scale, which input devices treat
    /// as idle.
    pub fn has_fault(&self) -> bool {
        self.fault
    }

    pub fn clear_fault(&mut self) {
        self.fault = false;
    }
}

impl AnalogInput for RpAnalogInput<'_, '_> {
    fn read_u16(&mut self) -> u16 {
        let Ok(mut adc) = self.adc.try_borrow_mut() else {
            self.fault = true;
            return u16::MAX;
        };

        match adc.blocking_read(&mut self.channel) {
            Ok(sample) => sample << LEFT_JUSTIFY,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("ADC conversion failed");
                self.fault = true;
                u16::MAX
            }
        }
    }
}
