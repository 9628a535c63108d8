//! Simulated Servo-To-Go style board.

use super::layout::{
    ADC_DATA, ADC_MUX, ADC_START, ADC_STATUS, ADCS, AdcStatus, BOARD_ID, DAC_BASE, DACS, DIO_BASE, DIO_DIR,
    DIO_PORTS, ENC_COUNT, ENC_LATCH, ENC_RESET, ENCODERS, INDEX_ARM, INDEX_CLEAR, INDEX_STATUS, SPAN,
    STG_BOARD_ID,
};
use crate::hw::sim::SimDevice;
use cnc_common::hal::regs::Width;

#[derive(Debug, Clone, Copy)]
struct Conversion {
    channel: usize,
    polls_left: u32,
}

/// Register-level model of the board.
///
/// Encoders count whatever the test moves them by; conversions complete
/// after a configurable number of status polls.
#[derive(Debug)]
pub struct StgModel {
    present: bool,
    counts: [i64; ENCODERS],
    latched: [u32; ENCODERS],
    index_arm: u8,
    index_status: u8,
    index_clear_writes: usize,
    adc_volts: [f64; ADCS],
    mux: usize,
    converting: Option<Conversion>,
    done_channel: Option<usize>,
    result: u16,
    conversion_polls: u32,
    adc_starts: [u32; ADCS],
    adc_reads: [u32; ADCS],
    dac: [u16; DACS],
    dio_latch: [u8; DIO_PORTS],
    dio_inputs: [u8; DIO_PORTS],
    dio_dir: u8,
}

impl Default for StgModel {
    fn default() -> Self {
        Self::new()
    }
}

impl StgModel {
    /// A present board; conversions finish on the first status poll.
    pub fn new() -> Self {
        Self {
            present: true,
            counts: [0; ENCODERS],
            latched: [0; ENCODERS],
            index_arm: 0,
            index_status: 0,
            index_clear_writes: 0,
            adc_volts: [0.0; ADCS],
            mux: 0,
            converting: None,
            done_channel: None,
            result: 0,
            conversion_polls: 1,
            adc_starts: [0; ADCS],
            adc_reads: [0; ADCS],
            dac: [0; DACS],
            dio_latch: [0; DIO_PORTS],
            dio_inputs: [0; DIO_PORTS],
            dio_dir: 0,
        }
    }

    /// An empty slot: the ID register floats high.
    pub fn absent() -> Self {
        Self { present: false, ..Self::new() }
    }

    /// Status polls a conversion needs before it reports done.
    pub fn with_conversion_polls(mut self, polls: u32) -> Self {
        self.conversion_polls = polls;
        self
    }

    /// Move encoder `ch` by `delta` counts.
    pub fn move_encoder(&mut self, ch: usize, delta: i64) {
        self.counts[ch] += delta;
    }

    /// Pass encoder `ch` over its index mark.
    pub fn pulse_index(&mut self, ch: usize) {
        let bit = 1 << ch;
        if self.index_arm & bit != 0 {
            self.index_status |= bit;
        }
    }

    /// Hardware count of encoder `ch`.
    pub fn count(&self, ch: usize) -> i64 {
        self.counts[ch]
    }

    /// Index arm register.
    pub fn index_armed(&self) -> u8 {
        self.index_arm
    }

    /// Writes seen on the index clear register.
    pub fn index_clear_writes(&self) -> usize {
        self.index_clear_writes
    }

    /// Drive analog input `ch`.
    pub fn set_adc_volts(&mut self, ch: usize, volts: f64) {
        self.adc_volts[ch] = volts;
    }

    /// Conversions started on `ch`.
    pub fn adc_starts(&self, ch: usize) -> u32 {
        self.adc_starts[ch]
    }

    /// Results of `ch` read back.
    pub fn adc_reads(&self, ch: usize) -> u32 {
        self.adc_reads[ch]
    }

    /// Last code written to DAC `ch`.
    pub fn dac_code(&self, ch: usize) -> u16 {
        self.dac[ch]
    }

    /// Output voltage of DAC `ch`.
    pub fn dac_volts(&self, ch: usize) -> f64 {
        (f64::from(self.dac[ch]) - 4096.0) / 409.6
    }

    /// Levels driven on an output port.
    pub fn dio_output(&self, port: usize) -> u8 {
        self.dio_latch[port]
    }

    /// Drive the lines of an input port.
    pub fn set_dio_input(&mut self, port: usize, value: u8) {
        self.dio_inputs[port] = value;
    }

    /// Direction register.
    pub fn dio_dir(&self) -> u8 {
        self.dio_dir
    }

    fn adc_code(&self, ch: usize) -> u16 {
        let counts = (self.adc_volts[ch] * 409.6).round().clamp(-4096.0, 4095.0) as i32;
        (counts & 0x1FFF) as u16
    }

    fn poll_status(&mut self) -> u8 {
        if let Some(mut c) = self.converting {
            c.polls_left = c.polls_left.saturating_sub(1);
            if c.polls_left == 0 {
                self.result = self.adc_code(c.channel);
                self.done_channel = Some(c.channel);
                self.converting = None;
            } else {
                self.converting = Some(c);
            }
        }
        if self.done_channel.is_some() { AdcStatus::EOC.bits() } else { 0 }
    }
}

impl SimDevice for StgModel {
    fn read(&mut self, offset: u32, _width: Width, _now: u64) -> u32 {
        match offset {
            o if o < ENC_LATCH => {
                let ch = ((o - ENC_COUNT) / 4) as usize;
                let byte = (o - ENC_COUNT) % 4;
                if byte == 3 { 0 } else { (self.latched[ch] >> (8 * byte)) & 0xFF }
            }
            INDEX_ARM => u32::from(self.index_arm),
            INDEX_STATUS => u32::from(self.index_status),
            ADC_STATUS => u32::from(self.poll_status()),
            ADC_DATA => {
                if let Some(ch) = self.done_channel {
                    self.adc_reads[ch] += 1;
                }
                u32::from(self.result)
            }
            o if (DIO_BASE..DIO_BASE + DIO_PORTS as u32).contains(&o) => {
                let port = (o - DIO_BASE) as usize;
                let v = if self.dio_dir & (1 << port) != 0 { self.dio_latch[port] } else { self.dio_inputs[port] };
                u32::from(v)
            }
            DIO_DIR => u32::from(self.dio_dir),
            BOARD_ID => u32::from(if self.present { STG_BOARD_ID } else { 0xFF }),
            _ => 0xFF,
        }
    }

    fn write(&mut self, offset: u32, _width: Width, value: u32, _now: u64) {
        let byte = value as u8;
        match offset {
            ENC_LATCH => {
                for ch in (0..ENCODERS).filter(|ch| byte & (1 << ch) != 0) {
                    self.latched[ch] = (self.counts[ch] as u32) & 0xFF_FFFF;
                }
            }
            ENC_RESET => {
                for ch in (0..ENCODERS).filter(|ch| byte & (1 << ch) != 0) {
                    self.counts[ch] = 0;
                }
            }
            INDEX_ARM => self.index_arm = byte,
            INDEX_CLEAR => {
                self.index_status &= !byte;
                self.index_clear_writes += 1;
            }
            ADC_MUX => self.mux = usize::from(byte) % ADCS,
            ADC_START => {
                self.converting = Some(Conversion { channel: self.mux, polls_left: self.conversion_polls });
                self.done_channel = None;
                self.adc_starts[self.mux] += 1;
            }
            o if (DIO_BASE..DIO_BASE + DIO_PORTS as u32).contains(&o) => {
                let port = (o - DIO_BASE) as usize;
                self.dio_latch[port] = byte;
            }
            DIO_DIR => self.dio_dir = byte,
            o if (DAC_BASE..SPAN).contains(&o) && (o - DAC_BASE) % 2 == 0 => {
                self.dac[((o - DAC_BASE) / 2) as usize] = value as u16;
            }
            _ => {}
        }
    }
}
