//! Hardware abstraction layer contracts.
//!
//! This module contains the traits and types shared by the board drivers
//! and the host that schedules them:
//!
//! - [`regs`] - Register access primitive
//! - [`clock`] - Monotonic tick clock and bounded busy-wait
//! - [`pins`] - Pin/parameter registry and exported functions
//! - [`config`] - Machine and board configuration
//! - [`driver`] - `BoardDriver` trait and `HalError`

pub mod clock;
pub mod config;
pub mod consts;
pub mod driver;
pub mod pins;
pub mod regs;
