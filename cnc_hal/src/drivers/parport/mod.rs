//! PC parallel port.
//!
//! Three ports on one card: eight data lines (output or input), five status
//! inputs and four control outputs. Outputs support timed auto-reset, which
//! turns the port into a pulse generator for step/direction drives.

mod driver;
pub mod layout;
mod sim;

pub use driver::{DataDir, ParportDriver, ParportOptions};
pub use sim::ParportModel;

use crate::hw::sim::{SimBus, SimClock, shared};
use cnc_common::hal::driver::BoardDriver;
use cnc_common::hal::regs::RegisterIo;

/// Family name used in configuration.
pub const FAMILY: &str = "parport";

/// Factory function to create a parallel port driver instance.
pub fn create_driver() -> Box<dyn BoardDriver> {
    Box::new(ParportDriver::new())
}

/// Register window backed by a fresh [`ParportModel`].
pub fn simulate(clock: &SimClock) -> Box<dyn RegisterIo> {
    Box::new(SimBus::new(shared(ParportModel::new()), clock.clone()))
}
