//! HAL configuration types.
//!
//! - `MachineConfig` - Main configuration loaded from machine.toml
//! - `BoardConfig` - One attached board
//! - `Access` - How a board's registers are reached
//!
//! # TOML Example
//!
//! ```toml
//! period_ns = 1000000
//!
//! [shared]
//! service_name = "mill"
//!
//! [[boards]]
//! name = "parport.0"
//! family = "parport"
//! address = 0x378
//!
//! [boards.options]
//! data_dir = "out"
//! reset_time_ns = 5000
//! ```

use crate::config::SharedConfig;
use crate::consts::{DEFAULT_PERIOD_NS, MAX_BOARDS};
use crate::hal::driver::HalError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_period_ns() -> u64 {
    DEFAULT_PERIOD_NS
}

/// Main configuration loaded from `machine.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    /// Settings common to all binaries.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Scan period in nanoseconds.
    /// Defaults to DEFAULT_PERIOD_NS (1 ms) if omitted.
    #[serde(default = "default_period_ns")]
    pub period_ns: u64,

    /// Boards to attach, in scan order.
    #[serde(default)]
    pub boards: Vec<BoardConfig>,
}

impl MachineConfig {
    /// Validate the machine configuration.
    ///
    /// # Validation Rules
    /// 1. `period_ns` > 0
    /// 2. `boards.len()` <= MAX_BOARDS
    /// 3. Board names non-empty, free of whitespace, and unique
    /// 4. Board families non-empty
    pub fn validate(&self) -> Result<(), HalError> {
        self.shared
            .validate()
            .map_err(|e| HalError::ConfigError(e.to_string()))?;

        if self.period_ns == 0 {
            return Err(HalError::ConfigError(
                "period_ns must be greater than 0".to_string(),
            ));
        }

        if self.boards.len() > MAX_BOARDS {
            return Err(HalError::ConfigError(format!(
                "Too many boards: {} (max {})",
                self.boards.len(),
                MAX_BOARDS
            )));
        }

        let mut names = HashSet::new();
        for board in &self.boards {
            board.validate()?;
            if !names.insert(board.name.as_str()) {
                return Err(HalError::ConfigError(format!(
                    "Duplicate board name: {}",
                    board.name
                )));
            }
        }

        Ok(())
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            period_ns: DEFAULT_PERIOD_NS,
            boards: Vec::new(),
        }
    }
}

/// How a board's registers are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    /// x86 I/O port space; `address` is the base port.
    #[default]
    Port,
    /// Physical memory window; `address` is the physical base.
    Mmio,
}

/// One attached board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Instance name, used as the pin prefix (e.g. "stg.0").
    pub name: String,

    /// Board family, selects the driver (e.g. "stg").
    pub family: String,

    /// Base port or physical address.
    #[serde(default)]
    pub address: u64,

    /// Port or memory-mapped access.
    #[serde(default)]
    pub access: Access,

    /// Family-specific options, parsed by the driver.
    #[serde(default)]
    pub options: toml::Table,
}

impl BoardConfig {
    /// Minimal board entry with no options.
    pub fn new(name: impl Into<String>, family: impl Into<String>, address: u64) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            address,
            access: Access::default(),
            options: toml::Table::new(),
        }
    }

    /// Validate name and family.
    pub fn validate(&self) -> Result<(), HalError> {
        if self.name.is_empty() || self.name.chars().any(char::is_whitespace) {
            return Err(HalError::ConfigError(format!(
                "Invalid board name '{}'",
                self.name
            )));
        }
        if self.family.is_empty() {
            return Err(HalError::ConfigError(format!(
                "Board '{}' has no family",
                self.name
            )));
        }
        Ok(())
    }

    /// Deserialize the family-specific options table.
    ///
    /// Missing keys take the option struct's serde defaults.
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, HalError> {
        toml::Value::Table(self.options.clone())
            .try_into()
            .map_err(|e| {
                HalError::ConfigError(format!("Board '{}' options: {}", self.name, e))
            })
    }
}
