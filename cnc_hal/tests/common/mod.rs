//! Shared fixtures for driver integration tests.
//!
//! A [`Rig`] is one driver attached to one simulated board. The test keeps
//! handles to the model and the clock so it can move encoders, drive inputs
//! and let time pass between scans.

#![allow(dead_code)]

use cnc_common::prelude::*;
use cnc_hal::hw::sim::{Shared, SimBus, SimClock, SimDevice, lock, shared};
use std::sync::MutexGuard;

/// Scan period used by every rig.
pub const PERIOD_NS: u64 = 1_000_000;

/// Board configuration with options parsed from a TOML fragment.
pub fn board(name: &str, family: &str, options: &str) -> BoardConfig {
    let mut config = BoardConfig::new(name, family, 0x300);
    config.options = toml::from_str(options).expect("options fragment");
    config
}

/// Attach `driver` to `model`, returning the attach error on failure.
pub fn try_attach<D: SimDevice + 'static>(
    driver: Box<dyn BoardDriver>,
    model: D,
    clock: SimClock,
    config: &BoardConfig,
) -> Result<Rig<D>, (HalError, PinRegistry)> {
    let model = shared(model);
    let mut pins = PinRegistry::new();
    let mut driver = driver;
    let hw = HwAccess::new(Box::new(SimBus::new(model.clone(), clock.clone())), Box::new(clock.clone()));
    match driver.attach(config, hw, &mut pins) {
        Ok(functions) => Ok(Rig {
            driver,
            pins,
            model,
            clock,
            functions,
        }),
        Err(e) => Err((e, pins)),
    }
}

/// One attached board.
pub struct Rig<D: SimDevice> {
    pub driver: Box<dyn BoardDriver>,
    pub pins: PinRegistry,
    pub model: Shared<D>,
    pub clock: SimClock,
    pub functions: Vec<ExportedFunction>,
}

impl<D: SimDevice> Rig<D> {
    /// Attach or panic.
    pub fn attach(driver: Box<dyn BoardDriver>, model: D, clock: SimClock, config: &BoardConfig) -> Self
    where
        D: 'static,
    {
        match try_attach(driver, model, clock, config) {
            Ok(rig) => rig,
            Err((e, _)) => panic!("attach failed: {e}"),
        }
    }

    /// Call one exported function by its short name (`"write"`, `"capture-position"`).
    pub fn call(&mut self, function: &str) {
        let index = self
            .functions
            .iter()
            .find(|f| f.name.rsplit('.').next() == Some(function))
            .map(|f| f.index)
            .unwrap_or_else(|| panic!("no function {function}"));
        self.driver.call(index, PERIOD_NS);
    }

    /// Call every exported function in export order.
    pub fn scan(&mut self) {
        for f in &self.functions {
            self.driver.call(f.index, PERIOD_NS);
        }
    }

    /// The simulated hardware.
    pub fn hw(&self) -> MutexGuard<'_, D> {
        lock(&self.model)
    }

    pub fn bit(&self, name: &str) -> BitPin {
        self.pins.bit(name).unwrap()
    }

    pub fn float(&self, name: &str) -> FloatPin {
        self.pins.float(name).unwrap()
    }

    pub fn s32(&self, name: &str) -> S32Pin {
        self.pins.s32(name).unwrap()
    }

    pub fn u32(&self, name: &str) -> U32Pin {
        self.pins.u32(name).unwrap()
    }

    pub fn diagnostics(&self) -> DriverDiagnostics {
        self.driver.diagnostics().expect("attached driver reports diagnostics")
    }
}
