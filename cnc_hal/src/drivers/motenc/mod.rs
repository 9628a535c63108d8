//! Motenc style PCI motion board.
//!
//! Eight 32-bit quadrature counters with index capture, eight 14-bit ADC
//! inputs converted in two groups of four, eight 16-bit DACs, 32 digital
//! inputs, 16 digital outputs and a hardware watchdog that cuts the outputs
//! when the host stops re-arming it.

mod driver;
pub mod layout;
mod sim;

pub use driver::{MotencDriver, MotencOptions};
pub use sim::MotencModel;

use crate::hw::sim::{SimBus, SimClock, shared};
use cnc_common::hal::clock::TickClock;
use cnc_common::hal::driver::BoardDriver;
use cnc_common::hal::regs::RegisterIo;

/// Family name used in configuration.
pub const FAMILY: &str = "motenc";

/// Factory function to create a motenc driver instance.
pub fn create_driver() -> Box<dyn BoardDriver> {
    Box::new(MotencDriver::new())
}

/// Register window backed by a fresh [`MotencModel`] running on `clock`.
pub fn simulate(clock: &SimClock) -> Box<dyn RegisterIo> {
    let model = MotencModel::new(clock.ticks_per_sec() / 1_000);
    Box::new(SimBus::new(shared(model), clock.clone()))
}
