//! Analog output channel.

use cnc_common::hal::driver::HalError;
use cnc_common::hal::pins::{FloatPin, PinDir, PinRegistry, U32Pin};

/// Voltage-to-code map of one board family's converter.
///
/// `code = zero_code + round(volts * counts_per_volt)`. The slope is negative
/// on boards whose output stage inverts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DacTable {
    /// Code that produces 0 V.
    pub zero_code: u32,
    /// Code change per volt.
    pub counts_per_volt: f64,
    /// Lowest representable voltage.
    pub min_volts: f64,
    /// Highest representable voltage.
    pub max_volts: f64,
    /// Lowest code the device accepts.
    pub min_code: u32,
    /// Highest code the device accepts.
    pub max_code: u32,
}

impl DacTable {
    /// Device code for `volts`, clamped to the representable range.
    ///
    /// NaN is treated as 0 V.
    #[inline]
    pub fn code(&self, volts: f64) -> u32 {
        let volts = if volts.is_nan() { 0.0 } else { volts.clamp(self.min_volts, self.max_volts) };
        let code = f64::from(self.zero_code) + (volts * self.counts_per_volt).round();
        code.clamp(f64::from(self.min_code), f64::from(self.max_code)) as u32
    }
}

/// One analog output.
///
/// Pins under `<board>.dac.<NN>`: `value` (float in), `gain` and `offset`
/// (float io), `code` (u32 out, last code written).
#[derive(Debug)]
pub struct DacChannel {
    channel: usize,
    value: FloatPin,
    gain: FloatPin,
    offset: FloatPin,
    code: U32Pin,
}

impl DacChannel {
    /// Export the channel's pins under `prefix`.
    pub fn export(pins: &mut PinRegistry, prefix: &str, channel: usize) -> Result<Self, HalError> {
        Ok(Self {
            channel,
            value: pins.new_float(format!("{prefix}.value"), PinDir::In, 0.0)?,
            gain: pins.new_float(format!("{prefix}.gain"), PinDir::Io, 1.0)?,
            offset: pins.new_float(format!("{prefix}.offset"), PinDir::Io, 0.0)?,
            code: pins.new_u32(format!("{prefix}.code"), PinDir::Out, 0)?,
        })
    }

    /// Hardware channel number.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Compute this scan's device code. The caller writes it in one access.
    #[inline]
    pub fn update(&self, table: &DacTable) -> u32 {
        let volts = (self.value.get() - self.offset.get()) * self.gain.get();
        let code = table.code(volts);
        self.code.set(code);
        code
    }

    /// Code for 0 V, recorded as the last code written.
    pub fn safe(&self, table: &DacTable) -> u32 {
        self.code.set(table.zero_code);
        table.zero_code
    }
}
