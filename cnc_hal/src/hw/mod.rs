//! Hardware access back ends.
//!
//! - [`port`] - x86 I/O-port windows (`ioperm`)
//! - [`mmio`] - physical memory windows (`/dev/mem`)
//! - [`clock`] - host monotonic clock
//! - [`sim`] - simulated clock, bus and register file

pub mod clock;
pub mod mmio;
pub mod port;
pub mod sim;

pub use clock::MonotonicClock;
pub use mmio::MmioRegion;
pub use port::PortIo;

use cnc_common::hal::config::{Access, BoardConfig};
use cnc_common::hal::driver::HalError;
use cnc_common::hal::regs::RegisterIo;

/// Open the register window a board configuration points at.
///
/// `span` is the family's register window size in bytes.
pub fn open_bus(config: &BoardConfig, span: u32) -> Result<Box<dyn RegisterIo>, HalError> {
    match config.access {
        Access::Port => {
            let span = u16::try_from(span).map_err(|_| {
                HalError::MappingFailed(format!("{}: port span {span:#x} too large", config.name))
            })?;
            Ok(Box::new(PortIo::open(config.address, span)?))
        }
        Access::Mmio => Ok(Box::new(MmioRegion::open(config.address, span as usize)?)),
    }
}
