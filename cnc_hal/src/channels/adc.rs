//! Analog input pipeline.
//!
//! A conversion takes longer than a scan can afford to wait, so the pipeline
//! overlaps them with scans: each scan publishes the group started on the
//! previous scan and immediately starts the next one. A board with `G`
//! groups refreshes every channel once per `G` scans.
//!
//! ```text
//!   Idle ──start(0)──▶ Pending(0) ──done: read, start(1)──▶ Pending(1) ─ … ─▶ Pending(0)
//!                          │
//!                          └─ not done for max_waits scans ──▶ Idle
//! ```

use cnc_common::consts::MAX_ADC_CHANNELS;
use cnc_common::hal::clock::{Deadline, TickClock, spin_until};
use cnc_common::hal::consts::{MAX_ADC_WAITS, MAX_SPIN_POLLS};
use cnc_common::hal::driver::HalError;
use cnc_common::hal::pins::{FloatPin, PinDir, PinRegistry, S32Pin};
use cnc_common::hal::regs::RegisterIo;
use cnc_common::rollover::sign_extend;
use heapless::Vec;
use std::ops::Range;

/// How the calibration offset combines with the scaled reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSign {
    /// `value = volts * gain - offset`
    Subtract,
    /// `value = volts * gain + offset`
    Add,
}

/// Conversion-code format of a board's converter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcFormat {
    /// Width of the two's-complement code field.
    pub code_bits: u32,
    /// Volts at positive full scale.
    pub full_scale_volts: f64,
    /// Offset sign convention.
    pub offset: OffsetSign,
}

impl AdcFormat {
    /// Sign-extended code.
    #[inline]
    pub fn signed(&self, code: u32) -> i32 {
        let mask = if self.code_bits >= 32 { u32::MAX } else { (1 << self.code_bits) - 1 };
        sign_extend(code & mask, self.code_bits)
    }

    /// Code to volts.
    #[inline]
    pub fn volts(&self, code: u32) -> f64 {
        let half = (1u64 << (self.code_bits - 1)) as f64;
        f64::from(self.signed(code)) * self.full_scale_volts / half
    }
}

/// Register-level access to one board family's converter.
pub trait AdcHw {
    /// Code format.
    fn format(&self) -> AdcFormat;

    /// Number of channel groups converted together.
    fn groups(&self) -> usize;

    /// Channels converted by `group`.
    fn group_channels(&self, group: usize) -> Range<usize>;

    /// Settling time between selecting a group and starting it.
    fn settle_ns(&self) -> u64 {
        0
    }

    /// Route `group` to the converter.
    fn select(&self, bus: &mut dyn RegisterIo, group: usize);

    /// Start converting `group`.
    fn start(&self, bus: &mut dyn RegisterIo, group: usize);

    /// Whether the last started conversion has finished.
    fn done(&self, bus: &mut dyn RegisterIo) -> bool;

    /// Raw result code of `channel`.
    fn read_code(&self, bus: &mut dyn RegisterIo, channel: usize) -> u32;
}

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No conversion outstanding.
    Idle,
    /// `group` started; `waits` scans have found it not yet done.
    Pending {
        /// Group being converted.
        group: usize,
        /// Not-done polls so far.
        waits: u32,
    },
}

/// One analog input.
///
/// Pins under `<board>.adc.<NN>`: `value` (float out), `raw` (s32 out),
/// `gain` and `offset` (float io).
#[derive(Debug)]
pub struct AdcChannel {
    value: FloatPin,
    raw: S32Pin,
    gain: FloatPin,
    offset: FloatPin,
}

impl AdcChannel {
    /// Export the channel's pins under `prefix`.
    pub fn export(pins: &mut PinRegistry, prefix: &str) -> Result<Self, HalError> {
        Ok(Self {
            value: pins.new_float(format!("{prefix}.value"), PinDir::Out, 0.0)?,
            raw: pins.new_s32(format!("{prefix}.raw"), PinDir::Out, 0)?,
            gain: pins.new_float(format!("{prefix}.gain"), PinDir::Io, 1.0)?,
            offset: pins.new_float(format!("{prefix}.offset"), PinDir::Io, 0.0)?,
        })
    }

    fn publish(&self, code: u32, format: &AdcFormat) {
        let scaled = format.volts(code) * self.gain.get();
        let value = match format.offset {
            OffsetSign::Subtract => scaled - self.offset.get(),
            OffsetSign::Add => scaled + self.offset.get(),
        };
        self.raw.set(format.signed(code));
        self.value.set(value);
    }
}

/// Round-robin conversion of all of a board's analog inputs.
#[derive(Debug)]
pub struct AdcPipeline {
    state: PipelineState,
    channels: Vec<AdcChannel, MAX_ADC_CHANNELS>,
    max_waits: u32,
    timeouts: u64,
}

impl AdcPipeline {
    /// Export `count` channels as `<board>.adc.00` .. and build an idle pipeline.
    pub fn export(pins: &mut PinRegistry, board: &str, count: usize) -> Result<Self, HalError> {
        let mut channels = Vec::new();
        for ch in 0..count {
            let channel = AdcChannel::export(pins, &format!("{board}.adc.{ch:02}"))?;
            channels
                .push(channel)
                .map_err(|_| HalError::ConfigError(format!("{board}: more than {MAX_ADC_CHANNELS} ADC channels")))?;
        }
        Ok(Self {
            state: PipelineState::Idle,
            channels,
            max_waits: MAX_ADC_WAITS,
            timeouts: 0,
        })
    }

    /// Give up on a conversion after this many not-done scans.
    pub fn with_max_waits(mut self, max_waits: u32) -> Self {
        self.max_waits = max_waits.max(1);
        self
    }

    /// Current phase.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Conversions abandoned so far.
    pub fn timeouts(&self) -> u64 {
        self.timeouts
    }

    /// Start group 0 if nothing is outstanding, so the first scan has a
    /// result to collect.
    pub fn prime<H: AdcHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo, clock: &dyn TickClock) {
        if self.state == PipelineState::Idle {
            self.start_group(hw, bus, clock, 0);
        }
    }

    /// Advance by exactly one step.
    pub fn scan<H: AdcHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo, clock: &dyn TickClock) {
        match self.state {
            PipelineState::Idle => self.start_group(hw, bus, clock, 0),
            PipelineState::Pending { group, waits } => {
                if hw.done(bus) {
                    let format = hw.format();
                    for ch in hw.group_channels(group) {
                        let code = hw.read_code(bus, ch);
                        if let Some(channel) = self.channels.get(ch) {
                            channel.publish(code, &format);
                        }
                    }
                    let next = (group + 1) % hw.groups().max(1);
                    self.start_group(hw, bus, clock, next);
                } else {
                    let waits = waits + 1;
                    if waits >= self.max_waits {
                        self.timeouts += 1;
                        self.state = PipelineState::Idle;
                    } else {
                        self.state = PipelineState::Pending { group, waits };
                    }
                }
            }
        }
    }

    fn start_group<H: AdcHw + ?Sized>(
        &mut self,
        hw: &H,
        bus: &mut dyn RegisterIo,
        clock: &dyn TickClock,
        group: usize,
    ) {
        hw.select(bus, group);
        let settle = hw.settle_ns();
        if settle > 0 {
            let deadline = Deadline::after(clock.ticks(), clock.ns_to_ticks(settle));
            // A clock that stops advancing only shortens the settle.
            let _ = spin_until(clock, deadline, MAX_SPIN_POLLS);
        }
        hw.start(bus, group);
        self.state = PipelineState::Pending { group, waits: 0 };
    }
}
