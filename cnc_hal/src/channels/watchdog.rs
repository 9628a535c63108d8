//! Hardware watchdog supervision.
//!
//! While enabled, the board cuts its outputs if it is not re-armed within
//! the selected timebase. In manual mode the supervisor re-arms on every
//! scan; in auto-reset mode every output write re-arms in hardware and the
//! supervisor only re-arms on request.
//!
//! Once the watchdog has bitten the supervisor stops re-arming on its own.
//! Outputs stay cut until the operator raises `watchdog.reset`.

use cnc_common::hal::driver::HalError;
use cnc_common::hal::pins::{BitPin, PinDir, PinRegistry, U32Pin};
use cnc_common::hal::regs::RegisterIo;
use tracing::trace;

/// Watchdog settings as last written to the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchdogConfig {
    /// Index into the board's timebase table.
    pub timebase: u8,
    /// Whether the watchdog is armed.
    pub enabled: bool,
    /// Whether output writes count as re-arm.
    pub auto_reset: bool,
}

/// Register-level access to one board family's watchdog.
pub trait WatchdogHw {
    /// Allowed timeouts in milliseconds, ascending; the index is the
    /// hardware timebase code.
    fn timebases_ms(&self) -> &'static [u32];

    /// Write the control register.
    fn configure(&self, bus: &mut dyn RegisterIo, config: WatchdogConfig);

    /// Write the re-arm trigger.
    fn rearm(&self, bus: &mut dyn RegisterIo);

    /// Whether the watchdog has fired.
    fn has_bitten(&self, bus: &mut dyn RegisterIo) -> bool;
}

/// Pick the smallest allowed timebase not below `requested_ms`, or the
/// largest one if none is.
///
/// Returns `(code, milliseconds)`.
pub fn snap_timebase(allowed: &[u32], requested_ms: u32) -> (u8, u32) {
    allowed
        .iter()
        .enumerate()
        .find(|(_, ms)| **ms >= requested_ms)
        .or_else(|| allowed.iter().enumerate().last())
        .map_or((0, 0), |(code, ms)| (code as u8, *ms))
}

/// Watchdog supervisor for one board.
///
/// Pins under `<board>.watchdog`: `timeout-ms` (u32 io, snapped to an
/// allowed value), `enable` and `auto-reset` (bit io), `has-bitten` (bit
/// out), `reset` (bit in, re-arm request).
#[derive(Debug)]
pub struct WatchdogSupervisor {
    shadow: Option<WatchdogConfig>,
    bitten: bool,
    last_request: bool,
    bites: u64,
    timeout_ms: U32Pin,
    enable: BitPin,
    auto_reset: BitPin,
    has_bitten: BitPin,
    reset: BitPin,
}

impl WatchdogSupervisor {
    /// Export the supervisor's pins for `board`.
    pub fn export(
        pins: &mut PinRegistry,
        board: &str,
        timeout_ms: u32,
        enable: bool,
        auto_reset: bool,
    ) -> Result<Self, HalError> {
        Ok(Self {
            shadow: None,
            bitten: false,
            last_request: false,
            bites: 0,
            timeout_ms: pins.new_u32(format!("{board}.watchdog.timeout-ms"), PinDir::Io, timeout_ms)?,
            enable: pins.new_bit(format!("{board}.watchdog.enable"), PinDir::Io, enable)?,
            auto_reset: pins.new_bit(format!("{board}.watchdog.auto-reset"), PinDir::Io, auto_reset)?,
            has_bitten: pins.new_bit(format!("{board}.watchdog.has-bitten"), PinDir::Out, false)?,
            reset: pins.new_bit(format!("{board}.watchdog.reset"), PinDir::In, false)?,
        })
    }

    /// Configuration last written to the hardware.
    pub fn shadow(&self) -> Option<WatchdogConfig> {
        self.shadow
    }

    /// Number of times the watchdog was observed to fire.
    pub fn bites(&self) -> u64 {
        self.bites
    }

    fn requested<H: WatchdogHw + ?Sized>(&self, hw: &H) -> WatchdogConfig {
        let requested = self.timeout_ms.get();
        let (timebase, ms) = snap_timebase(hw.timebases_ms(), requested);
        if ms != requested {
            self.timeout_ms.set(ms);
        }
        WatchdogConfig {
            timebase,
            enabled: self.enable.get(),
            auto_reset: self.auto_reset.get(),
        }
    }

    /// Write the configuration if it differs from the shadow.
    fn apply<H: WatchdogHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo, config: WatchdogConfig) {
        if self.shadow != Some(config) {
            trace!(?config, "watchdog reconfigured");
            hw.configure(bus, config);
            self.shadow = Some(config);
        }
    }

    /// One supervisory scan.
    ///
    /// Returns true when this scan re-armed a watchdog that had bitten, so
    /// the caller can re-send outputs the hardware cut.
    pub fn scan<H: WatchdogHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo) -> bool {
        let config = self.requested(hw);
        self.apply(hw, bus, config);

        let bitten = hw.has_bitten(bus);
        if bitten && !self.bitten {
            self.bites += 1;
        }
        self.bitten = bitten;
        self.has_bitten.set(bitten);

        let request = self.reset.get();
        let rising = request && !self.last_request;
        self.last_request = request;

        let routine = config.enabled && !config.auto_reset && !bitten;
        if routine || rising {
            hw.rearm(bus);
        }
        rising && bitten
    }

    /// Disable the watchdog before the board is released.
    pub fn disarm<H: WatchdogHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo) {
        let config = WatchdogConfig {
            enabled: false,
            ..self.shadow.unwrap_or_default()
        };
        self.apply(hw, bus, config);
    }
}
