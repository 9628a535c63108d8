//! PC parallel port register layout.

use bitflags::bitflags;
use cnc_common::hal::regs::Width;
use static_assertions::const_assert;

use crate::channels::PortLayout;

/// Data register.
pub const DATA: u32 = 0;
/// Status register (read-only).
pub const STATUS: u32 = 1;
/// Control register.
pub const CONTROL: u32 = 2;
/// Bytes of port space used.
pub const SPAN: u32 = 3;

bitflags! {
    /// Control register bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Control: u8 {
        /// Pin 1, inverted by the port hardware.
        const STROBE = 0x01;
        /// Pin 14, inverted.
        const AUTOFEED = 0x02;
        /// Pin 16.
        const INIT = 0x04;
        /// Pin 17, inverted.
        const SELECT_IN = 0x08;
        /// Interrupt enable; never set by this driver.
        const IRQ_ENABLE = 0x10;
        /// Tristate the data lines so they can be read.
        const DATA_INPUT = 0x20;
    }
}

bitflags! {
    /// Status register bits carrying input pins.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Status: u8 {
        /// Pin 15.
        const ERROR = 0x08;
        /// Pin 13.
        const SELECT = 0x10;
        /// Pin 12.
        const PAPER_OUT = 0x20;
        /// Pin 10.
        const ACK = 0x40;
        /// Pin 11, inverted by the port hardware.
        const BUSY = 0x80;
    }
}

/// Status bits inverted between connector and register.
pub const STATUS_HW_INVERT: u32 = Status::BUSY.bits() as u32;

/// Control bits inverted between register and connector.
pub const CONTROL_HW_INVERT: u32 =
    (Control::STROBE.bits() | Control::AUTOFEED.bits() | Control::SELECT_IN.bits()) as u32;

/// Data pins 2-9 on bits 0-7.
pub const DATA_PINS: [(u8, u32); 8] = [
    (2, 0x01),
    (3, 0x02),
    (4, 0x04),
    (5, 0x08),
    (6, 0x10),
    (7, 0x20),
    (8, 0x40),
    (9, 0x80),
];

/// Status input pins.
pub const STATUS_PINS: [(u8, u32); 5] = [
    (15, Status::ERROR.bits() as u32),
    (13, Status::SELECT.bits() as u32),
    (12, Status::PAPER_OUT.bits() as u32),
    (10, Status::ACK.bits() as u32),
    (11, Status::BUSY.bits() as u32),
];

/// Control output pins.
pub const CONTROL_PINS: [(u8, u32); 4] = [
    (1, Control::STROBE.bits() as u32),
    (14, Control::AUTOFEED.bits() as u32),
    (16, Control::INIT.bits() as u32),
    (17, Control::SELECT_IN.bits() as u32),
];

/// Shortest reset pulse the port can reliably produce.
pub const PARPORT_MIN_PULSE_NS: u32 = 1_000;

/// Default `reset-time`.
pub const DEFAULT_RESET_TIME_NS: u32 = 5_000;

/// Longest one `reset` call may busy-wait for a pulse deadline.
pub const PARPORT_MAX_SPIN_NS: u64 = 50_000;

const_assert!(CONTROL_HW_INVERT == 0x0B);
const_assert!(STATUS_HW_INVERT == 0x80);
const_assert!(DEFAULT_RESET_TIME_NS >= PARPORT_MIN_PULSE_NS);
const_assert!(DEFAULT_RESET_TIME_NS as u64 <= PARPORT_MAX_SPIN_NS);

/// Data port.
pub const fn data_port() -> PortLayout {
    PortLayout::plain(DATA, Width::W8)
}

/// Status port.
pub const fn status_port() -> PortLayout {
    PortLayout {
        offset: STATUS,
        width: Width::W8,
        hw_invert: STATUS_HW_INVERT,
        fixed_bits: 0,
    }
}

/// Control port; `data_input` keeps the data lines tristated.
pub const fn control_port(data_input: bool) -> PortLayout {
    PortLayout {
        offset: CONTROL,
        width: Width::W8,
        hw_invert: CONTROL_HW_INVERT,
        fixed_bits: if data_input { Control::DATA_INPUT.bits() as u32 } else { 0 },
    }
}

/// Clamp a requested reset time to what the port and the period allow.
pub fn clamp_reset_time(requested_ns: u32, period_ns: u64) -> u32 {
    let ceiling = u32::try_from(period_ns / 2).unwrap_or(u32::MAX).max(PARPORT_MIN_PULSE_NS);
    requested_ns.clamp(PARPORT_MIN_PULSE_NS, ceiling)
}

/// Busy-wait allowance of one `reset` call: an eighth of the period, capped
/// at [`PARPORT_MAX_SPIN_NS`]. Longer dwells finish on a later call.
pub fn spin_budget_ns(period_ns: u64) -> u64 {
    (period_ns / 8).min(PARPORT_MAX_SPIN_NS)
}
