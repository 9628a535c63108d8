//! Motenc style PCI board register layout.
//!
//! Every register is 32 bits wide and memory-mapped.
//!
//! | Offset | Register |
//! |--------|----------|
//! | `0x00` | Board ID (magic in the high half, revision in the low half) |
//! | `0x10 + 4n` | Count of encoder n |
//! | `0x30 + 4n` | Control/status of encoder n |
//! | `0x50` | ADC control (group select + start) |
//! | `0x54` | ADC status |
//! | `0x58 + 4k` | ADC result k of the converted group |
//! | `0x70 + 4n` | DAC n |
//! | `0x90` | Digital inputs |
//! | `0x94` | Digital outputs |
//! | `0x98` | Watchdog control |
//! | `0x9C` | Watchdog re-arm |
//! | `0xA0` | Watchdog status |

use bitflags::bitflags;
use static_assertions::const_assert;

use crate::channels::adc::{AdcFormat, AdcHw, OffsetSign};
use crate::channels::dac::DacTable;
use crate::channels::dio::PortLayout;
use crate::channels::encoder::EncoderHw;
use crate::channels::watchdog::{WatchdogConfig, WatchdogHw};
use cnc_common::consts::{MAX_ADC_CHANNELS, MAX_DAC_CHANNELS, MAX_ENCODERS};
use cnc_common::hal::regs::{RegisterIo, Width};
use cnc_common::rollover::sign_extend;
use std::ops::Range;

/// Encoder channels.
pub const ENCODERS: usize = 8;
/// Analog inputs.
pub const ADCS: usize = 8;
/// Analog inputs converted together.
pub const ADC_GROUP_SIZE: usize = 4;
/// Analog outputs.
pub const DACS: usize = 8;
/// Digital inputs.
pub const DIGITAL_INPUTS: usize = 32;
/// Digital outputs.
pub const DIGITAL_OUTPUTS: usize = 16;

/// Board ID register.
pub const BOARD_ID: u32 = 0x00;
/// First encoder count register.
pub const ENC_COUNT: u32 = 0x10;
/// First encoder control register.
pub const ENC_CONTROL: u32 = 0x30;
/// ADC control register.
pub const ADC_CONTROL: u32 = 0x50;
/// ADC status register.
pub const ADC_STATUS: u32 = 0x54;
/// First ADC result register.
pub const ADC_DATA: u32 = 0x58;
/// First DAC register.
pub const DAC_BASE: u32 = 0x70;
/// Digital input register.
pub const DIN: u32 = 0x90;
/// Digital output register.
pub const DOUT: u32 = 0x94;
/// Watchdog control register.
pub const WD_CONTROL: u32 = 0x98;
/// Watchdog re-arm register.
pub const WD_RESET: u32 = 0x9C;
/// Watchdog status register.
pub const WD_STATUS: u32 = 0xA0;
/// Bytes of register space used.
pub const SPAN: u32 = 0x100;

/// High half of the ID register on a present board.
pub const MOTENC_ID_MAGIC: u32 = 0x4D45;

/// Re-arm trigger value.
pub const WD_RESET_VALUE: u32 = 0x5A;

/// Allowed watchdog timeouts, indexed by timebase code.
pub const WD_TIMEBASES_MS: [u32; 4] = [2, 4, 8, 16];

/// Mask of the timebase code in the watchdog control register.
pub const WD_TIMEBASE_MASK: u32 = 0x03;

/// 14-bit, +/-10 V, offset added.
pub const ADC_FORMAT: AdcFormat = AdcFormat {
    code_bits: 14,
    full_scale_volts: 10.0,
    offset: OffsetSign::Add,
};

/// 16-bit DAC, 0x8000 at 0 V, output stage inverts.
pub const DAC_TABLE: DacTable = DacTable {
    zero_code: 0x8000,
    counts_per_volt: -3276.7,
    min_volts: -10.0,
    max_volts: 10.0,
    min_code: 0x0001,
    max_code: 0xFFFF,
};

bitflags! {
    /// Encoder control (write) and status (read) bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EncControl: u32 {
        /// Capture on the next index pulse.
        const INDEX_ARM = 0x01;
        /// Index captured (read).
        const INDEX_SEEN = 0x02;
        /// Acknowledge a captured index (write).
        const INDEX_ACK = 0x04;
        /// Zero the counter (write).
        const COUNT_CLEAR = 0x08;
    }
}

bitflags! {
    /// ADC control bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdcControl: u32 {
        /// Select the second group of four.
        const GROUP_1 = 0x01;
        /// Start conversion.
        const START = 0x100;
    }
}

bitflags! {
    /// ADC status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdcStatus: u32 {
        /// Conversion of the selected group finished.
        const DONE = 0x01;
    }
}

bitflags! {
    /// Watchdog control bits above the timebase field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WdControl: u32 {
        /// Watchdog armed.
        const ENABLE = 0x04;
        /// Output writes re-arm.
        const AUTO_RESET = 0x08;
    }
}

bitflags! {
    /// Watchdog status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WdStatus: u32 {
        /// The watchdog fired and outputs are cut.
        const BITTEN = 0x01;
    }
}

const_assert!(ENCODERS <= MAX_ENCODERS);
const_assert!(ADCS <= MAX_ADC_CHANNELS);
const_assert!(DACS <= MAX_DAC_CHANNELS);
const_assert!(ADCS % ADC_GROUP_SIZE == 0);
const_assert!(ENC_COUNT + 4 * ENCODERS as u32 <= ENC_CONTROL);
const_assert!(WD_TIMEBASES_MS.len() == (WD_TIMEBASE_MASK + 1) as usize);
const_assert!(WD_STATUS < SPAN);

/// Encoder count register.
#[inline]
pub const fn enc_count(ch: usize) -> u32 {
    ENC_COUNT + 4 * ch as u32
}

/// Encoder control register.
#[inline]
pub const fn enc_control(ch: usize) -> u32 {
    ENC_CONTROL + 4 * ch as u32
}

/// Result register of `ch` within its group.
#[inline]
pub const fn adc_data(ch: usize) -> u32 {
    ADC_DATA + 4 * (ch % ADC_GROUP_SIZE) as u32
}

/// DAC register.
#[inline]
pub const fn dac(ch: usize) -> u32 {
    DAC_BASE + 4 * ch as u32
}

/// Watchdog control register value.
#[inline]
pub fn wd_control(config: WatchdogConfig) -> u32 {
    let mut flags = WdControl::empty();
    flags.set(WdControl::ENABLE, config.enabled);
    flags.set(WdControl::AUTO_RESET, config.auto_reset);
    (u32::from(config.timebase) & WD_TIMEBASE_MASK) | flags.bits()
}

/// Digital input register.
pub const fn input_port() -> PortLayout {
    PortLayout::plain(DIN, Width::W32)
}

/// Digital output register.
pub const fn output_port() -> PortLayout {
    PortLayout::plain(DOUT, Width::W32)
}

/// Connector numbering: bit n is pin n.
pub fn port_pins<const N: usize>() -> [(u8, u32); N] {
    let mut pins = [(0, 0); N];
    for (bit, slot) in pins.iter_mut().enumerate() {
        *slot = (bit as u8, 1 << bit);
    }
    pins
}

/// Encoder counters: 32 bits, one register each.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotencEncoders;

impl EncoderHw for MotencEncoders {
    fn counter_bits(&self) -> u32 {
        32
    }

    fn read_count(&self, bus: &mut dyn RegisterIo, channel: usize) -> i32 {
        sign_extend(bus.read32(enc_count(channel)), 32)
    }

    fn arm_index(&self, bus: &mut dyn RegisterIo, channel: usize, armed: bool) {
        let flags = if armed { EncControl::INDEX_ARM } else { EncControl::empty() };
        bus.write32(enc_control(channel), flags.bits());
    }

    fn index_seen(&self, bus: &mut dyn RegisterIo, channel: usize) -> bool {
        EncControl::from_bits_truncate(bus.read32(enc_control(channel))).contains(EncControl::INDEX_SEEN)
    }

    fn ack_index(&self, bus: &mut dyn RegisterIo, channel: usize) {
        bus.write32(enc_control(channel), EncControl::INDEX_ACK.bits());
    }

    fn reset_count(&self, bus: &mut dyn RegisterIo, channel: usize) {
        bus.write32(enc_control(channel), EncControl::COUNT_CLEAR.bits());
    }
}

/// Converter: two groups of four, selected and started in one write.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotencAdc;

impl AdcHw for MotencAdc {
    fn format(&self) -> AdcFormat {
        ADC_FORMAT
    }

    fn groups(&self) -> usize {
        ADCS / ADC_GROUP_SIZE
    }

    fn group_channels(&self, group: usize) -> Range<usize> {
        group * ADC_GROUP_SIZE..(group + 1) * ADC_GROUP_SIZE
    }

    fn select(&self, _bus: &mut dyn RegisterIo, _group: usize) {}

    fn start(&self, bus: &mut dyn RegisterIo, group: usize) {
        let mut flags = AdcControl::START;
        flags.set(AdcControl::GROUP_1, group == 1);
        bus.write32(ADC_CONTROL, flags.bits());
    }

    fn done(&self, bus: &mut dyn RegisterIo) -> bool {
        AdcStatus::from_bits_truncate(bus.read32(ADC_STATUS)).contains(AdcStatus::DONE)
    }

    fn read_code(&self, bus: &mut dyn RegisterIo, channel: usize) -> u32 {
        bus.read32(adc_data(channel))
    }
}

/// Watchdog with four timebases and a magic re-arm value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotencWatchdog;

impl WatchdogHw for MotencWatchdog {
    fn timebases_ms(&self) -> &'static [u32] {
        &WD_TIMEBASES_MS
    }

    fn configure(&self, bus: &mut dyn RegisterIo, config: WatchdogConfig) {
        bus.write32(WD_CONTROL, wd_control(config));
    }

    fn rearm(&self, bus: &mut dyn RegisterIo) {
        bus.write32(WD_RESET, WD_RESET_VALUE);
    }

    fn has_bitten(&self, bus: &mut dyn RegisterIo) -> bool {
        WdStatus::from_bits_truncate(bus.read32(WD_STATUS)).contains(WdStatus::BITTEN)
    }
}
