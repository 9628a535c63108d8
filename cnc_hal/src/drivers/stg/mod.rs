//! Servo-To-Go style ISA motion board.
//!
//! Eight 24-bit quadrature counters with index latch, eight multiplexed
//! 13-bit ADC inputs, eight 13-bit DAC outputs and 32 digital lines in four
//! ports of configurable direction.

mod driver;
pub mod layout;
mod sim;

pub use driver::{StgDriver, StgOptions};
pub use sim::StgModel;

use crate::hw::sim::{SimBus, SimClock, shared};
use cnc_common::hal::driver::BoardDriver;
use cnc_common::hal::regs::RegisterIo;

/// Family name used in configuration.
pub const FAMILY: &str = "stg";

/// Factory function to create an stg driver instance.
pub fn create_driver() -> Box<dyn BoardDriver> {
    Box::new(StgDriver::new())
}

/// Register window backed by a fresh [`StgModel`].
pub fn simulate(clock: &SimClock) -> Box<dyn RegisterIo> {
    Box::new(SimBus::new(shared(StgModel::new()), clock.clone()))
}
