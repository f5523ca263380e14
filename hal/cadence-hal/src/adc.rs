//! Analog input abstraction

/// Single analog input channel
///
/// Readings are left-justified to 16 bits regardless of the converter's
/// native resolution: a 12-bit converter's full scale reads `0xFFF0`.
/// Consumers shift right by `16 - resolution` to recover native counts.
pub trait AnalogInput {
    /// Sample the channel once
    fn read_u16(&mut self) -> u16;
}

impl<A: AnalogInput + ?Sized> AnalogInput for &mut A {
    fn read_u16(&mut self) -> u16 {
        (**self).read_u16()
    }
}

/// Shift a left-justified reading down to `resolution` bits
///
/// `resolution` must be in `1..=16`.
pub const fn to_resolution(raw: u16, resolution: u8) -> u16 {
    raw >> (16 - resolution as u32)
}

/// Largest reading representable at `resolution` bits
pub const fn max_value(resolution: u8) -> u16 {
    (((1u32) << resolution) - 1) as u16
}
