//! Board driver trait and error types.
//!
//! This module defines:
//! - `BoardDriver` trait - Interface every board family implements
//! - `HalError` enum - Error types for attach-time and registry operations
//! - `HwAccess` - Register window and tick clock handed to a driver
//! - `DriverFactory` type alias - Factory function type
//! - `DriverDiagnostics` struct - Optional driver counters

use crate::hal::clock::TickClock;
use crate::hal::config::BoardConfig;
use crate::hal::pins::{ExportedFunction, PinRegistry, PinType};
use crate::hal::regs::RegisterIo;
use thiserror::Error;

/// Error types for HAL operations.
///
/// These only ever come out of attach, detach and registry calls. Scan
/// functions cannot fail.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Probe did not find the expected board at the configured address
    #[error("Board not found: {0}")]
    BoardNotFound(String),

    /// Register window could not be mapped or port access not granted
    #[error("Register mapping failed: {0}")]
    MappingFailed(String),

    /// Hardware communication error
    #[error("Hardware communication error: {0}")]
    CommunicationError(String),

    /// No driver registered for the requested board family
    #[error("Driver not found: {0}")]
    DriverNotFound(String),

    /// A pin with this name is already exported
    #[error("Pin already exists: {0}")]
    PinExists(String),

    /// No pin with this name is exported
    #[error("Pin not found: {0}")]
    PinNotFound(String),

    /// Pin exists with a different value type
    #[error("Pin {name} is {actual}, not {expected}")]
    PinTypeMismatch {
        /// Pin name
        name: String,
        /// Requested type
        expected: PinType,
        /// Actual type
        actual: PinType,
    },
}

/// Hardware resources handed to a driver at attach.
///
/// The driver takes ownership: each register window belongs to exactly one
/// driver instance until it is detached and dropped.
pub struct HwAccess {
    /// The board's register window.
    pub bus: Box<dyn RegisterIo>,
    /// Monotonic tick clock.
    pub clock: Box<dyn TickClock>,
}

impl HwAccess {
    /// Bundle a bus and clock.
    pub fn new(bus: Box<dyn RegisterIo>, clock: Box<dyn TickClock>) -> Self {
        Self { bus, clock }
    }
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn BoardDriver>;

/// Optional driver counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverDiagnostics {
    /// Number of scan-function invocations
    pub scans: u64,
    /// ADC conversions abandoned after the wait budget ran out
    pub adc_timeouts: u64,
    /// Reset pulses carried over to a later scan instead of busy-waited
    pub deferred_resets: u64,
    /// Times the hardware watchdog was observed to have fired
    pub watchdog_bites: u64,
}

/// Trait defining the interface for board drivers.
///
/// # Lifecycle
///
/// 1. `attach()` - Called once before the scan loop starts
/// 2. `call()` - Called once per period for every exported function
/// 3. `detach()` - Called when the HAL is stopping
///
/// # Timing Contracts
///
/// | Operation | Max Duration | RT Constraint |
/// |-----------|--------------|---------------|
/// | `attach()` | unbounded | None (pre-RT) |
/// | `call()` | small fraction of period | **HARD** |
/// | `detach()` | 1 second | None (post-RT) |
pub trait BoardDriver: Send {
    /// Board family identifier (e.g., "parport", "stg").
    fn family(&self) -> &'static str;

    /// Driver semantic version.
    fn version(&self) -> &'static str;

    /// Claim the hardware, probe the board and export pins.
    ///
    /// # Errors
    /// `BoardNotFound` if the probe fails, `ConfigError` for bad options,
    /// `PinExists` if the board name collides with another board.
    fn attach(
        &mut self,
        config: &BoardConfig,
        hw: HwAccess,
        pins: &mut PinRegistry,
    ) -> Result<Vec<ExportedFunction>, HalError>;

    /// Run exported function `function` for one scan.
    ///
    /// Must not allocate, block, or sleep. Faults are absorbed.
    fn call(&mut self, function: usize, period_ns: u64);

    /// Drive all outputs to their safe state and release the hardware.
    fn detach(&mut self) -> Result<(), HalError>;

    /// Get driver counters.
    /// Default: None
    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        None
    }
}
