//! Servo-To-Go style ISA board register layout.
//!
//! All registers are 8-bit except the ADC result (16-bit read) and the DAC
//! outputs (16-bit write). Offsets are from the base port.
//!
//! | Offset | Register |
//! |--------|----------|
//! | `0x00 + 4n` | Latched count of encoder n, bytes low/mid/high |
//! | `0x20` | Encoder latch (write bit per channel) |
//! | `0x21` | Encoder reset (write bit per channel) |
//! | `0x22` | Index arm (read/write bit per channel) |
//! | `0x23` | Index status (read bit per channel) |
//! | `0x24` | Index clear (write bit per channel, twice) |
//! | `0x25` | ADC multiplexer select |
//! | `0x26` | ADC start |
//! | `0x27` | ADC status |
//! | `0x28` | ADC result (16-bit) |
//! | `0x2A..=0x2D` | Digital ports A-D |
//! | `0x2E` | Digital port direction |
//! | `0x2F` | Board ID |
//! | `0x30 + 2n` | DAC n (16-bit) |

use bitflags::bitflags;
use static_assertions::const_assert;

use crate::channels::adc::{AdcFormat, AdcHw, OffsetSign};
use crate::channels::dac::DacTable;
use crate::channels::dio::PortLayout;
use crate::channels::encoder::EncoderHw;
use cnc_common::consts::{MAX_DAC_CHANNELS, MAX_DIO_PORTS, MAX_ENCODERS};
use cnc_common::hal::regs::{RegisterIo, Width};
use cnc_common::rollover::sign_extend;
use std::ops::Range;

/// Encoder channels.
pub const ENCODERS: usize = 8;
/// Analog inputs.
pub const ADCS: usize = 8;
/// Analog outputs.
pub const DACS: usize = 8;
/// Digital ports.
pub const DIO_PORTS: usize = 4;
/// Bits per digital port.
pub const DIO_BITS: usize = 8;

/// First latched-count register.
pub const ENC_COUNT: u32 = 0x00;
/// Encoder latch register.
pub const ENC_LATCH: u32 = 0x20;
/// Encoder reset register.
pub const ENC_RESET: u32 = 0x21;
/// Index arm register.
pub const INDEX_ARM: u32 = 0x22;
/// Index status register.
pub const INDEX_STATUS: u32 = 0x23;
/// Index clear register.
pub const INDEX_CLEAR: u32 = 0x24;
/// ADC multiplexer select.
pub const ADC_MUX: u32 = 0x25;
/// ADC start-conversion strobe.
pub const ADC_START: u32 = 0x26;
/// ADC status.
pub const ADC_STATUS: u32 = 0x27;
/// ADC result.
pub const ADC_DATA: u32 = 0x28;
/// Digital port A.
pub const DIO_BASE: u32 = 0x2A;
/// Digital direction register, bit n set makes port n an output.
pub const DIO_DIR: u32 = 0x2E;
/// Board ID register.
pub const BOARD_ID: u32 = 0x2F;
/// First DAC register.
pub const DAC_BASE: u32 = 0x30;
/// Bytes of port space used.
pub const SPAN: u32 = 0x40;

/// Value the ID register reads on a present board.
pub const STG_BOARD_ID: u8 = 0xB3;

/// Settling time after switching the ADC multiplexer.
pub const STG_ADC_SETTLE_NS: u64 = 5_000;

/// 13-bit, +/-10 V, offset subtracted.
pub const ADC_FORMAT: AdcFormat = AdcFormat {
    code_bits: 13,
    full_scale_volts: 10.0,
    offset: OffsetSign::Subtract,
};

/// 13-bit DAC, 0x1000 at 0 V, rising with voltage.
pub const DAC_TABLE: DacTable = DacTable {
    zero_code: 0x1000,
    counts_per_volt: 409.6,
    min_volts: -10.0,
    max_volts: 10.0,
    min_code: 0x0000,
    max_code: 0x1FFF,
};

bitflags! {
    /// ADC status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AdcStatus: u8 {
        /// End of conversion.
        const EOC = 0x80;
    }
}

const_assert!(ENCODERS <= MAX_ENCODERS);
const_assert!(DACS <= MAX_DAC_CHANNELS);
const_assert!(DIO_PORTS <= MAX_DIO_PORTS);
const_assert!(ENC_COUNT + 4 * ENCODERS as u32 <= ENC_LATCH);
const_assert!(DAC_BASE + 2 * DACS as u32 <= SPAN);

/// Bit for channel `ch` in the per-channel registers.
#[inline]
pub const fn channel_bit(ch: usize) -> u8 {
    1 << ch
}

/// Latched count byte `byte` (0 = low) of encoder `ch`.
#[inline]
pub const fn enc_count(ch: usize, byte: u32) -> u32 {
    ENC_COUNT + 4 * ch as u32 + byte
}

/// DAC register of channel `ch`.
#[inline]
pub const fn dac(ch: usize) -> u32 {
    DAC_BASE + 2 * ch as u32
}

/// Digital port `port` (0 = A).
#[inline]
pub const fn dio_port(port: usize) -> PortLayout {
    PortLayout::plain(DIO_BASE + port as u32, Width::W8)
}

/// Connector numbering of a digital port's bits: port A is 00-07, B is 08-15, and so on.
pub fn dio_pins(port: usize) -> [(u8, u32); DIO_BITS] {
    let mut pins = [(0, 0); DIO_BITS];
    for (bit, slot) in pins.iter_mut().enumerate() {
        *slot = ((port * DIO_BITS + bit) as u8, 1 << bit);
    }
    pins
}

/// Encoder counters: 24 bits, latched together, read a byte at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct StgEncoders;

impl StgEncoders {
    /// Latch every counter at once so all channels sample the same instant.
    pub fn latch_all(bus: &mut dyn RegisterIo) {
        bus.write8(ENC_LATCH, 0xFF);
    }
}

impl EncoderHw for StgEncoders {
    fn counter_bits(&self) -> u32 {
        24
    }

    fn read_count(&self, bus: &mut dyn RegisterIo, channel: usize) -> i32 {
        let lo = u32::from(bus.read8(enc_count(channel, 0)));
        let mid = u32::from(bus.read8(enc_count(channel, 1)));
        let hi = u32::from(bus.read8(enc_count(channel, 2)));
        sign_extend(lo | (mid << 8) | (hi << 16), 24)
    }

    fn arm_index(&self, bus: &mut dyn RegisterIo, channel: usize, armed: bool) {
        let current = bus.read8(INDEX_ARM);
        let bit = channel_bit(channel);
        bus.write8(INDEX_ARM, if armed { current | bit } else { current & !bit });
    }

    fn index_seen(&self, bus: &mut dyn RegisterIo, channel: usize) -> bool {
        bus.read8(INDEX_STATUS) & channel_bit(channel) != 0
    }

    fn ack_index(&self, bus: &mut dyn RegisterIo, channel: usize) {
        bus.write8_twice(INDEX_CLEAR, channel_bit(channel));
    }

    fn reset_count(&self, bus: &mut dyn RegisterIo, channel: usize) {
        bus.write8(ENC_RESET, channel_bit(channel));
        // The latch still holds the pre-reset count.
        bus.write8(ENC_LATCH, channel_bit(channel));
    }
}

/// Converter: one multiplexed channel per group.
#[derive(Debug, Clone, Copy, Default)]
pub struct StgAdc;

impl AdcHw for StgAdc {
    fn format(&self) -> AdcFormat {
        ADC_FORMAT
    }

    fn groups(&self) -> usize {
        ADCS
    }

    fn group_channels(&self, group: usize) -> Range<usize> {
        group..group + 1
    }

    fn settle_ns(&self) -> u64 {
        STG_ADC_SETTLE_NS
    }

    fn select(&self, bus: &mut dyn RegisterIo, group: usize) {
        bus.write8(ADC_MUX, group as u8);
    }

    fn start(&self, bus: &mut dyn RegisterIo, _group: usize) {
        bus.write8(ADC_START, 0);
    }

    fn done(&self, bus: &mut dyn RegisterIo) -> bool {
        AdcStatus::from_bits_truncate(bus.read8(ADC_STATUS)).contains(AdcStatus::EOC)
    }

    fn read_code(&self, bus: &mut dyn RegisterIo, _channel: usize) -> u32 {
        u32::from(bus.read16(ADC_DATA))
    }
}

/// Parse `dio_dirs` ("IOIO"): one letter per port, `I` input, `O` output.
///
/// Returns the direction register value.
pub fn parse_dio_dirs(dirs: &str) -> Option<u8> {
    if dirs.len() != DIO_PORTS {
        return None;
    }
    dirs.chars().enumerate().try_fold(0u8, |acc, (port, c)| match c.to_ascii_uppercase() {
        'I' => Some(acc),
        'O' => Some(acc | (1 << port)),
        _ => None,
    })
}
