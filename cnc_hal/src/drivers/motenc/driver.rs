//! Motenc style board driver facade.

use super::layout::{self, DAC_TABLE, MotencAdc, MotencEncoders, MotencWatchdog};
use crate::channels::{AdcPipeline, DacChannel, DigitalPort, EncoderChannel, WatchdogSupervisor};
use crate::drivers::push_channel;
use cnc_common::consts::{MAX_DAC_CHANNELS, MAX_ENCODERS};
use cnc_common::hal::clock::TickClock;
use cnc_common::hal::config::BoardConfig;
use cnc_common::hal::driver::{BoardDriver, DriverDiagnostics, HalError, HwAccess};
use cnc_common::hal::pins::{ExportedFunction, PinRegistry};
use cnc_common::hal::regs::RegisterIo;
use heapless::Vec as FixedVec;
use serde::Deserialize;
use tracing::{debug, info, warn};

const FN_CAPTURE_POSITION: usize = 0;
const FN_READ_ADCS: usize = 1;
const FN_DI_READ: usize = 2;
const FN_WRITE_DACS: usize = 3;
const FN_DO_WRITE: usize = 4;
const FN_WATCHDOG_RESET: usize = 5;

/// `[boards.options]` for a motenc board.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MotencOptions {
    /// Encoder and DAC channels in use.
    pub channels: usize,
    /// Requested watchdog timeout; snapped to an allowed timebase.
    pub watchdog_timeout_ms: u32,
    /// Arm the watchdog on the first scan.
    pub watchdog_enable: bool,
    /// Let output writes re-arm the watchdog.
    pub watchdog_auto_reset: bool,
}

impl Default for MotencOptions {
    fn default() -> Self {
        Self {
            channels: layout::ENCODERS,
            watchdog_timeout_ms: 16,
            watchdog_enable: false,
            watchdog_auto_reset: false,
        }
    }
}

struct Board {
    name: String,
    bus: Box<dyn RegisterIo>,
    clock: Box<dyn TickClock>,
    encoders: FixedVec<EncoderChannel, MAX_ENCODERS>,
    adc: AdcPipeline,
    dacs: FixedVec<DacChannel, MAX_DAC_CHANNELS>,
    inputs: DigitalPort,
    outputs: DigitalPort,
    watchdog: WatchdogSupervisor,
    diag: DriverDiagnostics,
}

impl Board {
    fn write_dacs(&mut self) {
        for dac in &self.dacs {
            let code = dac.update(&DAC_TABLE);
            self.bus.write32(layout::dac(dac.channel()), code);
        }
    }

    fn safe(&mut self) {
        for dac in &self.dacs {
            let code = dac.safe(&DAC_TABLE);
            self.bus.write32(layout::dac(dac.channel()), code);
        }
        self.outputs.safe(&mut *self.bus, &*self.clock);
    }
}

/// Motenc style PCI motion board driver.
#[derive(Default)]
pub struct MotencDriver {
    board: Option<Board>,
}

impl MotencDriver {
    /// Unattached driver.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardDriver for MotencDriver {
    fn family(&self) -> &'static str {
        "motenc"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn attach(
        &mut self,
        config: &BoardConfig,
        mut hw: HwAccess,
        pins: &mut PinRegistry,
    ) -> Result<Vec<ExportedFunction>, HalError> {
        let opts: MotencOptions = config.options()?;
        let name = config.name.as_str();

        if opts.channels == 0 || opts.channels > layout::ENCODERS {
            return Err(HalError::ConfigError(format!(
                "{name}: channels must be 1..={}, got {}",
                layout::ENCODERS,
                opts.channels
            )));
        }

        let id = hw.bus.read32(layout::BOARD_ID);
        if id >> 16 != layout::MOTENC_ID_MAGIC {
            return Err(HalError::BoardNotFound(format!(
                "{name}: no motenc board at {:#x} (id {id:#010x})",
                config.address
            )));
        }

        let mut encoders = FixedVec::new();
        for ch in 0..opts.channels {
            let enc = EncoderChannel::export(pins, &format!("{name}.enc.{ch:02}"), ch)?;
            push_channel(&mut encoders, enc, name, "encoder")?;
        }
        let adc = AdcPipeline::export(pins, name, layout::ADCS)?;
        let mut dacs = FixedVec::new();
        for ch in 0..opts.channels {
            let dac = DacChannel::export(pins, &format!("{name}.dac.{ch:02}"), ch)?;
            push_channel(&mut dacs, dac, name, "DAC")?;
        }
        let in_bits: [(u8, u32); layout::DIGITAL_INPUTS] = layout::port_pins();
        let inputs = DigitalPort::export_inputs(pins, name, layout::input_port(), &in_bits)?;
        let out_bits: [(u8, u32); layout::DIGITAL_OUTPUTS] = layout::port_pins();
        let outputs = DigitalPort::export_outputs(pins, name, layout::output_port(), &out_bits, false)?;
        let watchdog = WatchdogSupervisor::export(
            pins,
            name,
            opts.watchdog_timeout_ms,
            opts.watchdog_enable,
            opts.watchdog_auto_reset,
        )?;

        let mut board = Board {
            name: name.to_string(),
            bus: hw.bus,
            clock: hw.clock,
            encoders,
            adc,
            dacs,
            inputs,
            outputs,
            watchdog,
            diag: DriverDiagnostics::default(),
        };
        board.safe();
        board.adc.prime(&MotencAdc, &mut *board.bus, &*board.clock);

        info!(
            "Attached {} at {:#x} (rev {}): {} encoders, {} ADCs, watchdog {}",
            name,
            config.address,
            id & 0xFFFF,
            opts.channels,
            layout::ADCS,
            if opts.watchdog_enable { "enabled" } else { "disabled" }
        );
        self.board = Some(board);

        Ok(vec![
            ExportedFunction::new(name, "capture-position", FN_CAPTURE_POSITION),
            ExportedFunction::new(name, "read-adcs", FN_READ_ADCS),
            ExportedFunction::new(name, "di-read", FN_DI_READ).without_fp(),
            ExportedFunction::new(name, "write-dacs", FN_WRITE_DACS),
            ExportedFunction::new(name, "do-write", FN_DO_WRITE).without_fp(),
            ExportedFunction::new(name, "watchdog-reset", FN_WATCHDOG_RESET).without_fp(),
        ])
    }

    fn call(&mut self, function: usize, _period_ns: u64) {
        let Some(b) = self.board.as_mut() else {
            return;
        };
        b.diag.scans += 1;
        match function {
            FN_CAPTURE_POSITION => {
                for enc in &mut b.encoders {
                    enc.capture(&MotencEncoders, &mut *b.bus);
                }
            }
            FN_READ_ADCS => {
                b.adc.scan(&MotencAdc, &mut *b.bus, &*b.clock);
                b.diag.adc_timeouts = b.adc.timeouts();
            }
            FN_DI_READ => b.inputs.read(&mut *b.bus),
            FN_WRITE_DACS => b.write_dacs(),
            FN_DO_WRITE => {
                b.outputs.write(&mut *b.bus, &*b.clock, 0);
            }
            FN_WATCHDOG_RESET => {
                if b.watchdog.scan(&MotencWatchdog, &mut *b.bus) {
                    // The bite cleared the output register behind our shadow.
                    b.outputs.invalidate();
                }
                b.diag.watchdog_bites = b.watchdog.bites();
            }
            _ => {}
        }
    }

    fn detach(&mut self) -> Result<(), HalError> {
        if let Some(mut board) = self.board.take() {
            board.safe();
            board.watchdog.disarm(&MotencWatchdog, &mut *board.bus);
            for enc in &mut board.encoders {
                enc.release(&MotencEncoders, &mut *board.bus);
            }
            if board.watchdog.bites() > 0 {
                warn!("{}: watchdog fired {} time(s) while attached", board.name, board.watchdog.bites());
            }
            let id = board.bus.read32(layout::BOARD_ID);
            if id >> 16 != layout::MOTENC_ID_MAGIC {
                return Err(HalError::CommunicationError(format!(
                    "{}: board stopped answering during detach (id {id:#010x}), safe state not confirmed",
                    board.name
                )));
            }
            debug!("{}: DACs at 0 V, outputs at rest, watchdog disarmed", board.name);
        }
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        self.board.as_ref().map(|b| b.diag.clone())
    }
}
