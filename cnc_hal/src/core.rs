//! HAL Core struct and scan loop management.
//!
//! The `HalCore` struct is the main entry point for HAL operations.
//! It attaches the configured boards, builds the ordered list of scan
//! functions, runs them once per period and detaches on shutdown.

use crate::driver_registry::{DriverEntry, DriverRegistry};
use crate::hw::sim::SimClock;
use crate::hw::{self, MonotonicClock};
use cnc_common::config::ConfigLoader;
use cnc_common::hal::config::{BoardConfig, MachineConfig};
use cnc_common::hal::consts::{HAL_SERVICE_NAME, OVERRUN_LOG_BURST, STATS_LOG_INTERVAL};
use cnc_common::hal::driver::{BoardDriver, DriverDiagnostics, HalError, HwAccess};
use cnc_common::hal::pins::{ExportedFunction, PinRegistry};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Timing statistics for scan loop monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimingStats {
    /// Number of cycles executed
    pub cycle_count: u64,
    /// Number of cycles that took longer than the period
    pub overruns: u64,
    /// Maximum observed cycle time
    pub max_cycle_ns: u64,
    /// Sum of cycle times for average calculation
    pub total_cycle_ns: u64,
}

impl TimingStats {
    /// Record one cycle.
    pub fn record(&mut self, duration_ns: u64, period_ns: u64) -> bool {
        self.cycle_count += 1;
        self.total_cycle_ns = self.total_cycle_ns.saturating_add(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        let overrun = duration_ns > period_ns;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }

    /// Mean cycle time, zero before the first cycle.
    pub fn avg_cycle_ns(&self) -> u64 {
        self.total_cycle_ns.checked_div(self.cycle_count).unwrap_or(0)
    }
}

struct AttachedBoard {
    name: String,
    driver: Box<dyn BoardDriver>,
}

struct ScheduledFunction {
    board: usize,
    function: ExportedFunction,
}

/// HAL Core manages board drivers and the scan loop.
pub struct HalCore {
    /// Machine configuration
    config: MachineConfig,
    /// Known board families
    registry: DriverRegistry,
    /// Exported pins of every attached board
    pins: PinRegistry,
    /// Attached boards in configuration order
    boards: Vec<AttachedBoard>,
    /// Scan functions in execution order
    functions: Vec<ScheduledFunction>,
    /// Running flag for loop control
    running: Arc<AtomicBool>,
    /// Timing statistics
    stats: TimingStats,
    /// Shared clock of the simulated boards, advanced one period per scan
    sim_clock: Option<SimClock>,
}

impl HalCore {
    /// Create a new HalCore instance with the given configuration.
    ///
    /// # Errors
    /// Returns error if configuration validation fails or a board names an
    /// unknown family.
    pub fn new(config: MachineConfig, registry: DriverRegistry) -> Result<Self, HalError> {
        config.validate()?;
        for board in &config.boards {
            registry.entry(&board.family)?;
        }

        info!(
            "{} created with {} board(s), period={}ns",
            HAL_SERVICE_NAME,
            config.boards.len(),
            config.period_ns
        );

        Ok(Self {
            config,
            registry,
            pins: PinRegistry::new(),
            boards: Vec::new(),
            functions: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            stats: TimingStats::default(),
            sim_clock: None,
        })
    }

    /// Load machine configuration from a TOML file.
    pub fn load_config(config_path: &Path) -> Result<MachineConfig, HalError> {
        info!("Loading configuration from {:?}", config_path);

        let config = MachineConfig::load(config_path).map_err(|e| {
            HalError::ConfigError(format!("{}: {}", config_path.display(), e))
        })?;

        info!(
            "Loaded config: service={}, {} board(s)",
            config.shared.service_name,
            config.boards.len()
        );
        Ok(config)
    }

    /// Attach every configured board to real hardware.
    pub fn attach(&mut self) -> Result<(), HalError> {
        self.attach_with(|board, entry| {
            let bus = hw::open_bus(board, entry.span)?;
            Ok(HwAccess::new(bus, Box::new(MonotonicClock)))
        })
    }

    /// Attach every configured board to its family's simulated hardware.
    ///
    /// All boards share one clock that advances one period per scan and one
    /// tick per read, so busy-waits inside a scan always terminate.
    pub fn attach_simulated(&mut self) -> Result<(), HalError> {
        let clock = SimClock::new().with_step(1);
        self.sim_clock = Some(clock.clone());
        self.attach_with(move |_, entry| {
            Ok(HwAccess::new((entry.simulate)(&clock), Box::new(clock.clone())))
        })
    }

    /// Attach every configured board with hardware from `open`.
    ///
    /// On failure every board attached so far is detached again and its
    /// pins removed.
    pub fn attach_with<F>(&mut self, mut open: F) -> Result<(), HalError>
    where
        F: FnMut(&BoardConfig, &DriverEntry) -> Result<HwAccess, HalError>,
    {
        if !self.boards.is_empty() {
            return Err(HalError::InitFailed("boards already attached".to_string()));
        }

        let boards = self.config.boards.clone();
        for board in &boards {
            if let Err(e) = self.attach_board(board, &mut open) {
                error!("Failed to attach {}: {}", board.name, e);
                self.pins.unexport_prefix(&board.name);
                if let Err(de) = self.detach_all() {
                    error!("Rollback after {} failed: {}", board.name, de);
                }
                return Err(e);
            }
        }

        info!(
            "Attached {} board(s): {} function(s), {} pin(s)",
            self.boards.len(),
            self.functions.len(),
            self.pins.len()
        );
        Ok(())
    }

    fn attach_board<F>(&mut self, board: &BoardConfig, open: &mut F) -> Result<(), HalError>
    where
        F: FnMut(&BoardConfig, &DriverEntry) -> Result<HwAccess, HalError>,
    {
        let entry = self.registry.entry(&board.family)?;
        let mut driver = (entry.create)();
        debug!("Created driver: {} v{}", driver.family(), driver.version());

        let hw = open(board, &entry)?;
        let exported = driver.attach(board, hw, &mut self.pins)?;

        let index = self.boards.len();
        self.functions.extend(
            exported
                .into_iter()
                .map(|function| ScheduledFunction { board: index, function }),
        );
        self.boards.push(AttachedBoard {
            name: board.name.clone(),
            driver,
        });
        Ok(())
    }

    /// Run every scan function once, in order.
    ///
    /// Scan functions cannot fail; this never blocks beyond their bounded
    /// busy-waits.
    pub fn scan(&mut self) {
        let period_ns = self.config.period_ns;
        for f in &self.functions {
            self.boards[f.board].driver.call(f.function.index, period_ns);
        }
        if let Some(clock) = &self.sim_clock {
            clock.advance_ns(period_ns);
        }
    }

    /// Run the scan loop until the running flag is cleared.
    pub fn run(&mut self) -> Result<(), HalError> {
        self.run_loop(None)
    }

    /// Run exactly `cycles` paced scans, or fewer if the running flag is
    /// cleared first.
    pub fn run_cycles(&mut self, cycles: u64) -> Result<(), HalError> {
        self.run_loop(Some(cycles))
    }

    fn run_loop(&mut self, limit: Option<u64>) -> Result<(), HalError> {
        if self.boards.is_empty() {
            warn!("Scan loop starting with no boards attached");
        }
        info!("Starting scan loop (period={}ns)...", self.config.period_ns);
        self.running.store(true, Ordering::SeqCst);

        if detect_rt_mode() {
            info!("Running in real-time mode");
        } else {
            info!("Running in standard (non-RT) mode");
        }

        #[cfg(feature = "rt")]
        let result = {
            rt_setup()?;
            self.run_rt_loop(limit)
        };

        #[cfg(not(feature = "rt"))]
        let result = self.run_sim_loop(limit);

        self.running.store(false, Ordering::SeqCst);
        info!(
            "Scan loop stopped after {} cycles (overruns: {})",
            self.stats.cycle_count, self.stats.overruns
        );
        result
    }

    fn keep_running(&self, done: u64, limit: Option<u64>) -> bool {
        self.running.load(Ordering::SeqCst) && limit.is_none_or(|n| done < n)
    }

    /// Scan loop paced by `std::thread::sleep`.
    #[cfg(not(feature = "rt"))]
    fn run_sim_loop(&mut self, limit: Option<u64>) -> Result<(), HalError> {
        use std::time::{Duration, Instant};

        let period = Duration::from_nanos(self.config.period_ns);
        let mut done = 0;
        while self.keep_running(done, limit) {
            let cycle_start = Instant::now();
            self.scan();
            let elapsed = cycle_start.elapsed();
            self.record_cycle(elapsed.as_nanos() as u64);
            done += 1;

            if elapsed < period {
                std::thread::sleep(period - elapsed);
            }
        }
        Ok(())
    }

    /// Scan loop paced by `clock_nanosleep(TIMER_ABSTIME)`.
    #[cfg(feature = "rt")]
    fn run_rt_loop(&mut self, limit: Option<u64>) -> Result<(), HalError> {
        use nix::time::{ClockId, ClockNanosleepFlags, clock_gettime, clock_nanosleep};

        let clock = ClockId::CLOCK_MONOTONIC;
        let now = || {
            clock_gettime(clock).map_err(|e| HalError::InitFailed(format!("clock_gettime: {e}")))
        };
        let mut next_wake = now()?;
        let mut done = 0;
        while self.keep_running(done, limit) {
            next_wake = timespec_add_ns(next_wake, self.config.period_ns as i64);

            let cycle_start = now()?;
            self.scan();
            let cycle_end = now()?;
            let duration_ns = timespec_diff_ns(&cycle_end, &cycle_start).max(0) as u64;
            self.record_cycle(duration_ns);
            done += 1;

            let _ = clock_nanosleep(clock, ClockNanosleepFlags::TIMER_ABSTIME, &next_wake);
        }
        Ok(())
    }

    fn record_cycle(&mut self, duration_ns: u64) {
        let period_ns = self.config.period_ns;
        if self.stats.record(duration_ns, period_ns) {
            let overruns = self.stats.overruns;
            if overruns <= OVERRUN_LOG_BURST || overruns % 1000 == 0 {
                warn!(
                    "Overrun #{}: cycle took {}ns (period {}ns)",
                    overruns, duration_ns, period_ns
                );
            }
        }

        if self.stats.cycle_count % STATS_LOG_INTERVAL == 0 {
            debug!(
                "Scan loop: {} cycles, avg={}ns, max={}ns, overruns={}",
                self.stats.cycle_count,
                self.stats.avg_cycle_ns(),
                self.stats.max_cycle_ns,
                self.stats.overruns
            );
        }
    }

    /// Stop the loop, put every board in its safe state and release it.
    ///
    /// Every board is detached even if an earlier one fails; the first
    /// error is returned.
    pub fn shutdown(&mut self) -> Result<(), HalError> {
        info!("Shutdown requested");
        self.running.store(false, Ordering::SeqCst);
        for (name, diag) in self.diagnostics() {
            info!(
                "{}: scans={}, adc_timeouts={}, deferred_resets={}, watchdog_bites={}",
                name, diag.scans, diag.adc_timeouts, diag.deferred_resets, diag.watchdog_bites
            );
        }
        let result = self.detach_all();
        info!(
            "Timing: {} cycles, avg={}ns, max={}ns, overruns={}",
            self.stats.cycle_count,
            self.stats.avg_cycle_ns(),
            self.stats.max_cycle_ns,
            self.stats.overruns
        );
        result
    }

    fn detach_all(&mut self) -> Result<(), HalError> {
        self.functions.clear();
        let mut first_err = None;
        for mut board in self.boards.drain(..) {
            if let Err(e) = board.driver.detach() {
                error!("Failed to detach {}: {}", board.name, e);
                first_err.get_or_insert(e);
            }
            let removed = self.pins.unexport_prefix(&board.name);
            debug!("{}: detached, {} pin(s) removed", board.name, removed);
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Get the running flag for signal handlers.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Exported pins.
    pub fn pins(&self) -> &PinRegistry {
        &self.pins
    }

    /// Scan function names in execution order.
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.function.name.as_str()).collect()
    }

    /// Scan functions in execution order.
    pub fn functions(&self) -> impl Iterator<Item = &ExportedFunction> {
        self.functions.iter().map(|f| &f.function)
    }

    /// Counters of every attached board that keeps them.
    pub fn diagnostics(&self) -> Vec<(String, DriverDiagnostics)> {
        self.boards
            .iter()
            .filter_map(|b| b.driver.diagnostics().map(|d| (b.name.clone(), d)))
            .collect()
    }

    /// Get timing statistics.
    pub fn stats(&self) -> &TimingStats {
        &self.stats
    }

    /// Clock of the simulated boards, if attached with `attach_simulated`.
    pub fn sim_clock(&self) -> Option<&SimClock> {
        self.sim_clock.as_ref()
    }

    /// The configuration this core was created with.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }
}

impl Drop for HalCore {
    fn drop(&mut self) {
        if !self.boards.is_empty() {
            let _ = self.detach_all();
        }
    }
}

/// Detect if running in real-time mode by checking scheduler policy.
fn detect_rt_mode() -> bool {
    #[cfg(target_os = "linux")]
    {
        use libc::{SCHED_FIFO, SCHED_RR, sched_getscheduler};
        unsafe {
            let policy = sched_getscheduler(0);
            policy == SCHED_FIFO || policy == SCHED_RR
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

/// Lock memory and switch to SCHED_FIFO before entering the loop.
#[cfg(feature = "rt")]
fn rt_setup() -> Result<(), HalError> {
    use cnc_common::hal::consts::RT_PRIORITY;
    use nix::sys::mman::{MlockallFlags, mlockall};

    mlockall(MlockallFlags::MCL_CURRENT | MlockallFlags::MCL_FUTURE)
        .map_err(|e| HalError::InitFailed(format!("mlockall failed: {e}")))?;

    let param = libc::sched_param {
        sched_priority: RT_PRIORITY,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        let err = std::io::Error::last_os_error();
        return Err(HalError::InitFailed(format!(
            "sched_setscheduler(SCHED_FIFO, {RT_PRIORITY}) failed: {err}"
        )));
    }
    Ok(())
}

/// Add nanoseconds to a TimeSpec.
#[cfg(feature = "rt")]
fn timespec_add_ns(ts: nix::sys::time::TimeSpec, ns: i64) -> nix::sys::time::TimeSpec {
    use nix::sys::time::TimeSpec;
    let mut secs = ts.tv_sec();
    let mut nanos = ts.tv_nsec() + ns;
    while nanos >= 1_000_000_000 {
        secs += 1;
        nanos -= 1_000_000_000;
    }
    TimeSpec::new(secs, nanos)
}

/// Compute the difference (a - b) in nanoseconds.
#[cfg(feature = "rt")]
fn timespec_diff_ns(a: &nix::sys::time::TimeSpec, b: &nix::sys::time::TimeSpec) -> i64 {
    (a.tv_sec() - b.tv_sec()) * 1_000_000_000 + (a.tv_nsec() - b.tv_nsec())
}
