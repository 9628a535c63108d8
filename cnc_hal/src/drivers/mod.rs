//! Board family drivers.
//!
//! - [`parport`] - PC parallel port
//! - [`stg`] - Servo-To-Go style ISA motion board
//! - [`motenc`] - Motenc style PCI motion board with hardware watchdog
//!
//! Each family lives in its own directory:
//!
//! - `layout.rs` - register offsets, bit definitions and constant tables
//! - `driver.rs` - the `BoardDriver` implementation
//! - `sim.rs` - register-level model for tests and `--simulate`
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `BoardDriver` from `cnc_common::hal::driver`
//! 3. Provide `create_driver()` and `simulate()`
//! 4. Register the family in [`register_all_drivers`]

pub mod motenc;
pub mod parport;
pub mod stg;

use crate::driver_registry::{DriverEntry, DriverRegistry};
use cnc_common::hal::driver::HalError;

/// Register every built-in board family.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register(
        parport::FAMILY,
        DriverEntry::new(parport::create_driver, parport::simulate, parport::layout::SPAN),
    );
    registry.register(
        stg::FAMILY,
        DriverEntry::new(stg::create_driver, stg::simulate, stg::layout::SPAN),
    );
    registry.register(
        motenc::FAMILY,
        DriverEntry::new(motenc::create_driver, motenc::simulate, motenc::layout::SPAN),
    );
}

/// Append a channel to a board's fixed-capacity table.
pub(crate) fn push_channel<T, const N: usize>(
    table: &mut heapless::Vec<T, N>,
    item: T,
    board: &str,
    kind: &str,
) -> Result<(), HalError> {
    table
        .push(item)
        .map_err(|_| HalError::ConfigError(format!("{board}: more than {N} {kind} channels")))
}
