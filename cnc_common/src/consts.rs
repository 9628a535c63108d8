//! System-wide constants for the CNC HAL workspace.
//!
//! Single source of truth for numeric limits and default paths.

/// Maximum encoder channels on one board.
pub const MAX_ENCODERS: usize = 8;

/// Maximum analog input channels on one board.
pub const MAX_ADC_CHANNELS: usize = 8;

/// Maximum analog output channels on one board.
pub const MAX_DAC_CHANNELS: usize = 8;

/// Maximum digital ports (register groups) on one board.
pub const MAX_DIO_PORTS: usize = 4;

/// Maximum bits in one digital port register.
pub const MAX_PORT_BITS: usize = 32;

/// Maximum boards attached to one HAL instance.
pub const MAX_BOARDS: usize = 16;

/// Default scan period in nanoseconds (1 kHz servo thread).
pub const DEFAULT_PERIOD_NS: u64 = 1_000_000;

/// Scale magnitudes below this are treated as unset.
pub const SCALE_EPSILON: f64 = 1e-20;

/// Scale substituted when the configured one is unusable.
pub const DEFAULT_SCALE: f64 = 1.0;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/cnc/machine.toml";
