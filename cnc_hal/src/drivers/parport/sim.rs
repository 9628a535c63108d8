//! Simulated parallel port.
//!
//! Models the connector, not just the registers: tests set and observe
//! electrical pin levels and the model applies the port's inverters.

use super::layout::{
    CONTROL, CONTROL_HW_INVERT, CONTROL_PINS, Control, DATA, DATA_PINS, STATUS, STATUS_HW_INVERT, STATUS_PINS,
};
use crate::hw::sim::{SimDevice, WriteRecord};
use cnc_common::hal::regs::Width;

/// Register-level parallel port with settable input lines.
#[derive(Debug, Default)]
pub struct ParportModel {
    data_latch: u8,
    data_lines: u8,
    status_lines: u8,
    control: u8,
    writes: Vec<WriteRecord>,
}

fn mask_of(table: &[(u8, u32)], pin: u8) -> Option<u8> {
    table.iter().find(|(nn, _)| *nn == pin).map(|(_, m)| *m as u8)
}

impl ParportModel {
    /// Port with all lines low.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive an input pin (status pins, or data pins while tristated).
    pub fn set_line(&mut self, pin: u8, high: bool) {
        let (lines, mask) = if let Some(m) = mask_of(&STATUS_PINS, pin) {
            (&mut self.status_lines, m)
        } else if let Some(m) = mask_of(&DATA_PINS, pin) {
            (&mut self.data_lines, m)
        } else {
            return;
        };
        if high {
            *lines |= mask;
        } else {
            *lines &= !mask;
        }
    }

    /// Electrical level of an output pin.
    pub fn line(&self, pin: u8) -> bool {
        if let Some(m) = mask_of(&DATA_PINS, pin) {
            return self.data_latch & m != 0;
        }
        if let Some(m) = mask_of(&CONTROL_PINS, pin) {
            return (self.control ^ CONTROL_HW_INVERT as u8) & m != 0;
        }
        false
    }

    /// Whether the data lines are tristated.
    pub fn data_input(&self) -> bool {
        Control::from_bits_truncate(self.control).contains(Control::DATA_INPUT)
    }

    /// Writes to one register, in order.
    pub fn writes_to(&self, offset: u32) -> Vec<WriteRecord> {
        self.writes.iter().copied().filter(|w| w.offset == offset).collect()
    }
}

impl SimDevice for ParportModel {
    fn read(&mut self, offset: u32, _width: Width, _now: u64) -> u32 {
        let v = match offset {
            DATA if self.data_input() => self.data_lines,
            DATA => self.data_latch,
            STATUS => self.status_lines ^ STATUS_HW_INVERT as u8,
            CONTROL => self.control,
            _ => 0xFF,
        };
        u32::from(v)
    }

    fn write(&mut self, offset: u32, _width: Width, value: u32, now: u64) {
        match offset {
            DATA => self.data_latch = value as u8,
            CONTROL => self.control = value as u8,
            _ => return,
        }
        self.writes.push(WriteRecord { offset, value, tick: now });
    }
}
