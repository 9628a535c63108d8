//! Simulated Motenc style board, including the output-cutting watchdog.

use super::layout::{
    ADC_CONTROL, ADC_DATA, ADC_GROUP_SIZE, ADC_STATUS, ADCS, AdcControl, AdcStatus, BOARD_ID, DAC_BASE,
    DAC_TABLE, DACS, DIN, DOUT, ENC_CONTROL, ENC_COUNT, ENCODERS, EncControl, MOTENC_ID_MAGIC, WD_CONTROL,
    WD_RESET, WD_RESET_VALUE, WD_STATUS, WD_TIMEBASE_MASK, WD_TIMEBASES_MS, WdControl, WdStatus,
};
use crate::hw::sim::SimDevice;
use cnc_common::hal::regs::Width;

const BOARD_REVISION: u32 = 0x0003;

/// Register-level model of the board.
///
/// The watchdog runs on the bus timestamps: once enabled it bites when
/// more than the selected timebase passes without a re-arm, forcing the
/// DACs to 0 V and the outputs low until re-armed.
#[derive(Debug)]
pub struct MotencModel {
    present: bool,
    ticks_per_ms: u64,
    counts: [i32; ENCODERS],
    index_armed: [bool; ENCODERS],
    index_seen: [bool; ENCODERS],
    adc_volts: [f64; ADCS],
    converting: Option<(usize, u32)>,
    done: bool,
    results: [u32; ADC_GROUP_SIZE],
    conversion_polls: u32,
    group_starts: [u32; ADCS / ADC_GROUP_SIZE],
    dac: [u32; DACS],
    din: u32,
    dout: u32,
    wd_control: u32,
    last_rearm: u64,
    bitten: bool,
    rearms: u32,
}

impl MotencModel {
    /// A present board whose clock runs at `ticks_per_ms`.
    pub fn new(ticks_per_ms: u64) -> Self {
        Self {
            present: true,
            ticks_per_ms: ticks_per_ms.max(1),
            counts: [0; ENCODERS],
            index_armed: [false; ENCODERS],
            index_seen: [false; ENCODERS],
            adc_volts: [0.0; ADCS],
            converting: None,
            done: false,
            results: [0; ADC_GROUP_SIZE],
            conversion_polls: 1,
            group_starts: [0; ADCS / ADC_GROUP_SIZE],
            dac: [DAC_TABLE.zero_code; DACS],
            din: 0,
            dout: 0,
            wd_control: 0,
            last_rearm: 0,
            bitten: false,
            rearms: 0,
        }
    }

    /// An empty slot: the ID register reads all ones.
    pub fn absent(ticks_per_ms: u64) -> Self {
        Self { present: false, ..Self::new(ticks_per_ms) }
    }

    /// Pull the board from its slot: the ID register reads all ones from now on.
    pub fn remove(&mut self) {
        self.present = false;
    }

    /// Status polls a conversion needs before it reports done.
    pub fn with_conversion_polls(mut self, polls: u32) -> Self {
        self.conversion_polls = polls;
        self
    }

    /// Move encoder `ch` by `delta` counts.
    pub fn move_encoder(&mut self, ch: usize, delta: i32) {
        self.counts[ch] = self.counts[ch].wrapping_add(delta);
    }

    /// Pass encoder `ch` over its index mark.
    pub fn pulse_index(&mut self, ch: usize) {
        if self.index_armed[ch] {
            self.index_seen[ch] = true;
        }
    }

    /// Hardware count of encoder `ch`.
    pub fn count(&self, ch: usize) -> i32 {
        self.counts[ch]
    }

    /// Drive analog input `ch`.
    pub fn set_adc_volts(&mut self, ch: usize, volts: f64) {
        self.adc_volts[ch] = volts;
    }

    /// Conversions started on `group`.
    pub fn group_starts(&self, group: usize) -> u32 {
        self.group_starts[group]
    }

    /// Code on DAC `ch`.
    pub fn dac_code(&self, ch: usize) -> u32 {
        self.dac[ch]
    }

    /// Output levels.
    pub fn outputs(&self) -> u32 {
        self.dout
    }

    /// Drive the input lines.
    pub fn set_inputs(&mut self, value: u32) {
        self.din = value;
    }

    /// Whether the watchdog has fired.
    pub fn bitten(&self) -> bool {
        self.bitten
    }

    /// Explicit re-arm writes seen.
    pub fn rearms(&self) -> u32 {
        self.rearms
    }

    /// Current watchdog control register.
    pub fn watchdog_control(&self) -> u32 {
        self.wd_control
    }

    fn wd_flags(&self) -> WdControl {
        WdControl::from_bits_truncate(self.wd_control)
    }

    fn timeout_ticks(&self) -> u64 {
        let code = (self.wd_control & WD_TIMEBASE_MASK) as usize;
        u64::from(WD_TIMEBASES_MS[code]) * self.ticks_per_ms
    }

    fn poll(&mut self, now: u64) {
        if self.wd_flags().contains(WdControl::ENABLE)
            && !self.bitten
            && now.saturating_sub(self.last_rearm) > self.timeout_ticks()
        {
            self.bitten = true;
            self.dac = [DAC_TABLE.zero_code; DACS];
            self.dout = 0;
        }
    }

    fn rearm(&mut self, now: u64) {
        self.bitten = false;
        self.last_rearm = now;
    }

    fn output_write(&mut self, now: u64) -> bool {
        if self.bitten {
            return false;
        }
        if self.wd_flags().contains(WdControl::AUTO_RESET) {
            self.last_rearm = now;
        }
        true
    }

    fn adc_code(&self, ch: usize) -> u32 {
        let counts = (self.adc_volts[ch] * 819.2).round().clamp(-8192.0, 8191.0) as i32;
        (counts as u32) & 0x3FFF
    }

    fn poll_status(&mut self) -> u32 {
        if let Some((group, polls_left)) = self.converting {
            let polls_left = polls_left.saturating_sub(1);
            if polls_left == 0 {
                for k in 0..ADC_GROUP_SIZE {
                    self.results[k] = self.adc_code(group * ADC_GROUP_SIZE + k);
                }
                self.done = true;
                self.converting = None;
            } else {
                self.converting = Some((group, polls_left));
            }
        }
        if self.done { AdcStatus::DONE.bits() } else { 0 }
    }
}

impl SimDevice for MotencModel {
    fn read(&mut self, offset: u32, _width: Width, now: u64) -> u32 {
        self.poll(now);
        match offset {
            BOARD_ID if self.present => (MOTENC_ID_MAGIC << 16) | BOARD_REVISION,
            BOARD_ID => u32::MAX,
            o if (ENC_COUNT..ENC_CONTROL).contains(&o) => self.counts[((o - ENC_COUNT) / 4) as usize] as u32,
            o if (ENC_CONTROL..ADC_CONTROL).contains(&o) => {
                let ch = ((o - ENC_CONTROL) / 4) as usize;
                let mut flags = EncControl::empty();
                flags.set(EncControl::INDEX_ARM, self.index_armed[ch]);
                flags.set(EncControl::INDEX_SEEN, self.index_seen[ch]);
                flags.bits()
            }
            ADC_STATUS => self.poll_status(),
            o if (ADC_DATA..DAC_BASE).contains(&o) => {
                let k = ((o - ADC_DATA) / 4) as usize;
                self.results.get(k).copied().unwrap_or(0)
            }
            o if (DAC_BASE..DIN).contains(&o) => self.dac[((o - DAC_BASE) / 4) as usize],
            DIN => self.din,
            DOUT => self.dout,
            WD_CONTROL => self.wd_control,
            WD_STATUS => {
                let mut flags = WdStatus::empty();
                flags.set(WdStatus::BITTEN, self.bitten);
                flags.bits()
            }
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, _width: Width, value: u32, now: u64) {
        self.poll(now);
        match offset {
            o if (ENC_CONTROL..ADC_CONTROL).contains(&o) => {
                let ch = ((o - ENC_CONTROL) / 4) as usize;
                let flags = EncControl::from_bits_truncate(value);
                if flags.contains(EncControl::COUNT_CLEAR) {
                    self.counts[ch] = 0;
                }
                if flags.contains(EncControl::INDEX_ACK) {
                    self.index_seen[ch] = false;
                } else if !flags.contains(EncControl::COUNT_CLEAR) {
                    self.index_armed[ch] = flags.contains(EncControl::INDEX_ARM);
                }
            }
            ADC_CONTROL => {
                let flags = AdcControl::from_bits_truncate(value);
                if flags.contains(AdcControl::START) {
                    let group = usize::from(flags.contains(AdcControl::GROUP_1));
                    self.converting = Some((group, self.conversion_polls));
                    self.done = false;
                    self.group_starts[group] += 1;
                }
            }
            o if (DAC_BASE..DIN).contains(&o) => {
                if self.output_write(now) {
                    self.dac[((o - DAC_BASE) / 4) as usize] = value & 0xFFFF;
                }
            }
            DOUT => {
                if self.output_write(now) {
                    self.dout = value & 0xFFFF;
                }
            }
            WD_CONTROL => {
                let was_enabled = self.wd_flags().contains(WdControl::ENABLE);
                self.wd_control = value;
                if !was_enabled && self.wd_flags().contains(WdControl::ENABLE) {
                    self.last_rearm = now;
                }
            }
            WD_RESET if value == WD_RESET_VALUE => {
                self.rearms += 1;
                self.rearm(now);
            }
            _ => {}
        }
    }
}
