//! Parallel port driver facade.

use super::layout::{self, CONTROL_PINS, DATA_PINS, DEFAULT_RESET_TIME_NS, STATUS_PINS};
use crate::channels::{DigitalPort, ResetOutcome};
use cnc_common::hal::clock::TickClock;
use cnc_common::hal::config::BoardConfig;
use cnc_common::hal::driver::{BoardDriver, DriverDiagnostics, HalError, HwAccess};
use cnc_common::hal::pins::{ExportedFunction, PinDir, PinRegistry, U32Pin};
use cnc_common::hal::regs::RegisterIo;
use serde::Deserialize;
use tracing::{debug, info};

const FN_READ: usize = 0;
const FN_WRITE: usize = 1;
const FN_RESET: usize = 2;

/// Direction of the eight data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataDir {
    /// Pins 2-9 are outputs.
    #[default]
    Out,
    /// Pins 2-9 are inputs (port tristated).
    In,
}

/// `[boards.options]` for a parallel port.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParportOptions {
    /// Data line direction.
    pub data_dir: DataDir,
    /// Initial `reset-time` in nanoseconds.
    pub reset_time_ns: u32,
}

impl Default for ParportOptions {
    fn default() -> Self {
        Self {
            data_dir: DataDir::Out,
            reset_time_ns: DEFAULT_RESET_TIME_NS,
        }
    }
}

struct Board {
    name: String,
    bus: Box<dyn RegisterIo>,
    clock: Box<dyn TickClock>,
    data: DigitalPort,
    status: DigitalPort,
    control: DigitalPort,
    reset_time: U32Pin,
    dwell_ticks: u64,
    spin_ticks: u64,
    diag: DriverDiagnostics,
}

impl Board {
    fn refresh_dwell(&mut self, period_ns: u64) {
        let requested = self.reset_time.get();
        let clamped = layout::clamp_reset_time(requested, period_ns);
        if clamped != requested {
            self.reset_time.set(clamped);
        }
        self.dwell_ticks = self.clock.ns_to_ticks(u64::from(clamped));
        self.spin_ticks = self.clock.ns_to_ticks(layout::spin_budget_ns(period_ns));
    }

    fn rest(&mut self) {
        self.data.safe(&mut *self.bus, &*self.clock);
        self.control.safe(&mut *self.bus, &*self.clock);
    }
}

/// Parallel port board driver.
///
/// Exports `read`, `write` and `reset`. Schedule `reset` after `write` in
/// the same thread so auto-reset pins produce one pulse per period.
#[derive(Default)]
pub struct ParportDriver {
    board: Option<Board>,
}

impl ParportDriver {
    /// Unattached driver.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BoardDriver for ParportDriver {
    fn family(&self) -> &'static str {
        "parport"
    }

    fn version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    fn attach(
        &mut self,
        config: &BoardConfig,
        hw: HwAccess,
        pins: &mut PinRegistry,
    ) -> Result<Vec<ExportedFunction>, HalError> {
        let opts: ParportOptions = config.options()?;
        let name = config.name.as_str();
        let data_input = opts.data_dir == DataDir::In;

        let data = if data_input {
            DigitalPort::export_inputs(pins, name, layout::data_port(), &DATA_PINS)?
        } else {
            DigitalPort::export_outputs(pins, name, layout::data_port(), &DATA_PINS, true)?
        };
        let status = DigitalPort::export_inputs(pins, name, layout::status_port(), &STATUS_PINS)?;
        let control =
            DigitalPort::export_outputs(pins, name, layout::control_port(data_input), &CONTROL_PINS, true)?;
        let reset_time = pins.new_u32(format!("{name}.reset-time"), PinDir::Io, opts.reset_time_ns)?;

        let mut board = Board {
            name: name.to_string(),
            bus: hw.bus,
            clock: hw.clock,
            data,
            status,
            control,
            reset_time,
            dwell_ticks: 0,
            spin_ticks: 0,
            diag: DriverDiagnostics::default(),
        };
        board.rest();

        info!(
            "Attached {} at {:#x} (data {:?}, reset-time {} ns)",
            name, config.address, opts.data_dir, opts.reset_time_ns
        );
        self.board = Some(board);

        Ok(vec![
            ExportedFunction::new(name, "read", FN_READ).without_fp(),
            ExportedFunction::new(name, "write", FN_WRITE).without_fp(),
            ExportedFunction::new(name, "reset", FN_RESET).without_fp().blocking(),
        ])
    }

    fn call(&mut self, function: usize, period_ns: u64) {
        let Some(b) = self.board.as_mut() else {
            return;
        };
        b.diag.scans += 1;
        match function {
            FN_READ => {
                b.status.read(&mut *b.bus);
                b.data.read(&mut *b.bus);
            }
            FN_WRITE => {
                b.refresh_dwell(period_ns);
                b.data.write(&mut *b.bus, &*b.clock, b.dwell_ticks);
                b.control.write(&mut *b.bus, &*b.clock, b.dwell_ticks);
            }
            FN_RESET => {
                let budget = b.spin_ticks;
                for port in [&mut b.data, &mut b.control] {
                    if port.reset(&mut *b.bus, &*b.clock, budget) == ResetOutcome::Deferred {
                        b.diag.deferred_resets += 1;
                    }
                }
            }
            _ => {}
        }
    }

    fn detach(&mut self) -> Result<(), HalError> {
        if let Some(mut board) = self.board.take() {
            board.rest();
            debug!("{}: outputs at rest, releasing port", board.name);
        }
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        self.board.as_ref().map(|b| b.diag.clone())
    }
}
