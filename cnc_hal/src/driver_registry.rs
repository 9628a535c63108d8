//! Driver registry for board families.
//!
//! Provides a `DriverRegistry` struct mapping a family name to its driver
//! factory and simulated hardware. This uses constructor-injection rather
//! than global state.

use crate::hw::sim::SimClock;
use cnc_common::hal::driver::{BoardDriver, DriverFactory, HalError};
use cnc_common::hal::regs::RegisterIo;
use std::collections::HashMap;

/// Builds a register window over a family's simulated board.
pub type SimFactory = fn(&SimClock) -> Box<dyn RegisterIo>;

/// Everything the HAL needs to bring up one board family.
#[derive(Debug, Clone, Copy)]
pub struct DriverEntry {
    /// Creates an unattached driver.
    pub create: DriverFactory,
    /// Creates a simulated register window.
    pub simulate: SimFactory,
    /// Size of the family's register window in bytes.
    pub span: u32,
}

impl DriverEntry {
    /// Bundle a family's factories.
    pub fn new(create: DriverFactory, simulate: SimFactory, span: u32) -> Self {
        Self { create, simulate, span }
    }
}

/// Registry of available board families.
///
/// Constructed at startup, populated via `register()`, and passed to
/// `HalCore` by value. No global state, testable in isolation.
pub struct DriverRegistry {
    entries: HashMap<&'static str, DriverEntry>,
}

impl DriverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registry holding every built-in family.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::drivers::register_all_drivers(&mut registry);
        registry
    }

    /// Register a board family.
    ///
    /// # Panics
    /// Panics if a family with the same name is already registered.
    pub fn register(&mut self, name: &'static str, entry: DriverEntry) {
        if self.entries.contains_key(name) {
            panic!("Driver '{name}' is already registered");
        }
        self.entries.insert(name, entry);
    }

    /// Get a family's entry by name.
    pub fn get(&self, name: &str) -> Option<DriverEntry> {
        self.entries.get(name).copied()
    }

    /// Look up a family, failing with `DriverNotFound`.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no family with the given name is registered.
    pub fn entry(&self, name: &str) -> Result<DriverEntry, HalError> {
        self.get(name)
            .ok_or_else(|| HalError::DriverNotFound(name.to_string()))
    }

    /// Create a driver instance by family name.
    ///
    /// # Errors
    /// Returns `HalError::DriverNotFound` if no family with the given name is registered.
    pub fn create_driver(&self, name: &str) -> Result<Box<dyn BoardDriver>, HalError> {
        Ok((self.entry(name)?.create)())
    }

    /// List all registered family names.
    pub fn list_drivers(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
