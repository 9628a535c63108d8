//! Servo-To-Go style board driver facade.

use super::layout::{self, DAC_TABLE, StgAdc, StgEncoders};
use crate::channels::{AdcPipeline, DacChannel, DigitalPort, EncoderChannel};
use crate::drivers::push_channel;
use cnc_common::consts::{MAX_DAC_CHANNELS, MAX_DIO_PORTS, MAX_ENCODERS};
use cnc_common::hal::clock::TickClock;
use cnc_common::hal::config::BoardConfig;
use cnc_common::hal::driver::{BoardDriver, DriverDiagnostics, HalError, HwAccess};
use cnc_common::hal::pins::{ExportedFunction, PinRegistry};
use cnc_common::hal::regs::RegisterIo;
use heapless::Vec as FixedVec;
use serde::Deserialize;
use tracing::{debug, info};

const FN_CAPTURE_POSITION: usize = 0;
const FN_READ_ADCS: usize = 1;
const FN_DI_READ: usize = 2;
const FN_WRITE_DACS: usize = 3;
const FN_DO_WRITE: usize = 4;

/// `[boards.options]` for an stg board.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StgOptions {
    /// Encoder and DAC channels in use.
    pub channels: usize,
    /// Port directions A-D, `I` or `O` each.
    pub dio_dirs: String,
}

impl Default for StgOptions {
    fn default() -> Self {
        Self {
            channels: layout::ENCODERS,
            dio_dirs: "IIOO".to_string(),
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
    ports: FixedVec<DigitalPort, MAX_DIO_PORTS>,
    diag: DriverDiagnostics,
}

impl Board {
    fn write_dacs(&mut self) {
        for dac in &self.dacs {
            let code = dac.update(&DAC_TABLE);
            self.bus.write16(layout::dac(dac.channel()), code as u16);
        }
    }

    fn safe(&mut self) {
        for dac in &self.dacs {
            let code = dac.safe(&DAC_TABLE);
            self.bus.write16(layout::dac(dac.channel()), code as u16);
        }
        for port in &mut self.ports {
            port.safe(&mut *self.bus, &*self.clock);
        }
    }
}

/// Servo-To-Go style ISA motion board driver.
#[derive(Default)]
pub struct StgDriver {
    board: Option<Board>,
}

impl StgDriver {
    /// Unattached driver.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardDriver for StgDriver {
    fn family(&self) -> &'static str {
        "stg"
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
        let opts: StgOptions = config.options()?;
        let name = config.name.as_str();

        if opts.channels == 0 || opts.channels > layout::ENCODERS {
            return Err(HalError::ConfigError(format!(
                "{name}: channels must be 1..={}, got {}",
                layout::ENCODERS,
                opts.channels
            )));
        }
        let dirs = layout::parse_dio_dirs(&opts.dio_dirs).ok_or_else(|| {
            HalError::ConfigError(format!(
                "{name}: dio_dirs must be {} of I/O, got '{}'",
                layout::DIO_PORTS,
                opts.dio_dirs
            ))
        })?;

        let id = hw.bus.read8(layout::BOARD_ID);
        if id != layout::STG_BOARD_ID {
            return Err(HalError::BoardNotFound(format!(
                "{name}: no stg board at {:#x} (id {id:#04x})",
                config.address
            )));
        }
        hw.bus.write8(layout::DIO_DIR, dirs);

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
        let mut ports = FixedVec::new();
        for port in 0..layout::DIO_PORTS {
            let port_layout = layout::dio_port(port);
            let bits = layout::dio_pins(port);
            let p = if dirs & (1 << port) != 0 {
                DigitalPort::export_outputs(pins, name, port_layout, &bits, false)?
            } else {
                DigitalPort::export_inputs(pins, name, port_layout, &bits)?
            };
            push_channel(&mut ports, p, name, "digital port")?;
        }

        let mut board = Board {
            name: name.to_string(),
            bus: hw.bus,
            clock: hw.clock,
            encoders,
            adc,
            dacs,
            ports,
            diag: DriverDiagnostics::default(),
        };
        board.safe();
        board.adc.prime(&StgAdc, &mut *board.bus, &*board.clock);

        info!(
            "Attached {} at {:#x}: {} encoders, {} ADCs, {} DACs, dio {}",
            name,
            config.address,
            opts.channels,
            layout::ADCS,
            opts.channels,
            opts.dio_dirs.to_ascii_uppercase()
        );
        self.board = Some(board);

        Ok(vec![
            ExportedFunction::new(name, "capture-position", FN_CAPTURE_POSITION),
            ExportedFunction::new(name, "read-adcs", FN_READ_ADCS),
            ExportedFunction::new(name, "di-read", FN_DI_READ).without_fp(),
            ExportedFunction::new(name, "write-dacs", FN_WRITE_DACS),
            ExportedFunction::new(name, "do-write", FN_DO_WRITE).without_fp(),
        ])
    }

    fn call(&mut self, function: usize, _period_ns: u64) {
        let Some(b) = self.board.as_mut() else {
            return;
        };
        b.diag.scans += 1;
        match function {
            FN_CAPTURE_POSITION => {
                StgEncoders::latch_all(&mut *b.bus);
                for enc in &mut b.encoders {
                    enc.capture(&StgEncoders, &mut *b.bus);
                }
            }
            FN_READ_ADCS => {
                b.adc.scan(&StgAdc, &mut *b.bus, &*b.clock);
                b.diag.adc_timeouts = b.adc.timeouts();
            }
            FN_DI_READ => {
                for port in &mut b.ports {
                    port.read(&mut *b.bus);
                }
            }
            FN_WRITE_DACS => b.write_dacs(),
            FN_DO_WRITE => {
                for port in &mut b.ports {
                    port.write(&mut *b.bus, &*b.clock, 0);
                }
            }
            _ => {}
        }
    }

    fn detach(&mut self) -> Result<(), HalError> {
        if let Some(mut board) = self.board.take() {
            board.safe();
            for enc in &mut board.encoders {
                enc.release(&StgEncoders, &mut *board.bus);
            }
            debug!("{}: DACs at 0 V, outputs at rest", board.name);
        }
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        self.board.as_ref().map(|b| b.diag.clone())
    }
}
