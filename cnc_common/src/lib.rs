//! CNC Common Library
//!
//! Shared contracts and leaf utilities for the CNC hardware I/O layer.
//!
//! # Module Structure
//!
//! - [`hal`] - Register, clock, pin and driver contracts plus configuration
//! - [`rollover`] - Counter extension for narrow hardware fields
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - Channel limits and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cnc_common::prelude::*;
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod prelude;
pub mod rollover;
