//! Prelude module for common re-exports.
//!
//! ```rust
//! use cnc_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::hal::config::{Access, BoardConfig, MachineConfig};

// ─── Hardware contracts ─────────────────────────────────────────────
pub use crate::hal::clock::{Deadline, TickClock, spin_until};
pub use crate::hal::driver::{BoardDriver, DriverDiagnostics, DriverFactory, HalError, HwAccess};
pub use crate::hal::regs::{RegisterIo, Width};

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::hal::pins::{
    BitPin, ExportedFunction, FloatPin, FunctionKind, PinDir, PinRegistry, S32Pin, U32Pin,
};

// ─── Numeric helpers ────────────────────────────────────────────────
pub use crate::rollover::{extend, sign_extend};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::DEFAULT_PERIOD_NS;
