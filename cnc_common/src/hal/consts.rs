//! HAL constants.

/// Canonical HAL service name (used for logging).
pub const HAL_SERVICE_NAME: &str = "cnc_hal";

/// Upper bound on clock polls in any busy-wait inside a scan function.
pub const MAX_SPIN_POLLS: u32 = 100_000;

/// Scans an ADC conversion may stay not-done before the pipeline restarts.
pub const MAX_ADC_WAITS: u32 = 4;

/// Overruns logged individually before switching to sampled logging.
pub const OVERRUN_LOG_BURST: u64 = 10;

/// SCHED_FIFO priority of the scan thread when built with the `rt` feature.
pub const RT_PRIORITY: i32 = 80;

/// Cycles between periodic timing summaries at debug level.
pub const STATS_LOG_INTERVAL: u64 = 1000;
