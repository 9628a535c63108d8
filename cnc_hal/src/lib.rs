//! # CNC HAL Library
//!
//! Real-time board drivers for CNC motion control: quadrature encoders,
//! ADC/DAC channels, digital I/O and hardware watchdogs, published through a
//! typed pin registry and scanned once per period.
//!
//! # Module Structure
//!
//! - [`channels`] - Board-independent channel logic (encoder, ADC, DAC, DIO, watchdog)
//! - [`drivers`] - Board families and their register layouts
//! - [`driver_registry`] - Family name to driver factory mapping
//! - [`hw`] - Port, memory-mapped and simulated register access
//! - [`core`] - HalCore struct, scan loop management
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        cnc_hal (single crate)                    │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ PinRegistry │◄──►│   HalCore    │◄──►│  Driver Registry    │  │
//! │  │ (cnc_common)│    │ (scan loop)  │    │                     │  │
//! │  └─────────────┘    └──────┬───────┘    └─────────────────────┘  │
//! │                            │                                     │
//! │                            ▼                                     │
//! │                   ┌────────────────┐     ┌──────────────────┐    │
//! │                   │  BoardDriver   │────►│ channels + hw    │    │
//! │                   │  (per family)  │     │ (RegisterIo)     │    │
//! │                   └────────────────┘     └──────────────────┘    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod channels;
pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod hw;

// Re-export key types for convenience
pub use crate::core::{HalCore, TimingStats};
pub use crate::driver_registry::{DriverEntry, DriverRegistry};
