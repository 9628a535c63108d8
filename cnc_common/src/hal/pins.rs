//! In-process pin/parameter registry.
//!
//! A pin is a named, typed, directioned memory cell. Drivers create their
//! pins at attach time and keep cheap handles to them; operators and other
//! components look the same cells up by name. Every cell is a single atomic
//! word, so a value written between scans is observed whole at the next one.
//!
//! Naming: `<board>.<kind>.<NN>.<pin>`, e.g. `stg.0.enc.03.position`.
//!
//! Scan functions are registered as [`ExportedFunction`] descriptors; the
//! host scheduler calls them once per period in registration order.

use crate::hal::driver::HalError;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};

/// Who writes a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinDir {
    /// The driver publishes; everybody else reads.
    Out,
    /// The driver consumes a command written by someone else.
    In,
    /// Parameter: an operator may change it; the driver reads it each scan
    /// and may write it back (self-clearing handshakes, substituted defaults).
    Io,
}

/// Value type of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PinType {
    /// Boolean.
    Bit,
    /// Signed 32-bit integer.
    S32,
    /// Unsigned 32-bit integer.
    U32,
    /// 64-bit float.
    Float,
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Bit => "bit",
            Self::S32 => "s32",
            Self::U32 => "u32",
            Self::Float => "float",
        };
        f.pad(s)
    }
}

/// Boolean pin handle.
#[derive(Debug, Clone, Default)]
pub struct BitPin(Arc<AtomicBool>);

impl BitPin {
    /// Current value.
    #[inline]
    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Store a new value.
    #[inline]
    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::Relaxed)
    }
}

/// Signed 32-bit pin handle.
#[derive(Debug, Clone, Default)]
pub struct S32Pin(Arc<AtomicI32>);

impl S32Pin {
    /// Current value.
    #[inline]
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Store a new value.
    #[inline]
    pub fn set(&self, value: i32) {
        self.0.store(value, Ordering::Relaxed)
    }
}

/// Unsigned 32-bit pin handle.
#[derive(Debug, Clone, Default)]
pub struct U32Pin(Arc<AtomicU32>);

impl U32Pin {
    /// Current value.
    #[inline]
    pub fn get(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    /// Store a new value.
    #[inline]
    pub fn set(&self, value: u32) {
        self.0.store(value, Ordering::Relaxed)
    }
}

/// Float pin handle. The `f64` is stored as its bit pattern in one word.
#[derive(Debug, Clone, Default)]
pub struct FloatPin(Arc<AtomicU64>);

impl FloatPin {
    /// Current value.
    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Store a new value.
    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed)
    }
}

/// A type-erased cell as stored in the registry.
#[derive(Debug, Clone)]
enum PinCell {
    Bit(BitPin),
    S32(S32Pin),
    U32(U32Pin),
    Float(FloatPin),
}

impl PinCell {
    fn pin_type(&self) -> PinType {
        match self {
            Self::Bit(_) => PinType::Bit,
            Self::S32(_) => PinType::S32,
            Self::U32(_) => PinType::U32,
            Self::Float(_) => PinType::Float,
        }
    }
}

#[derive(Debug, Clone)]
struct PinEntry {
    dir: PinDir,
    cell: PinCell,
}

/// Worst-case execution characteristic of an exported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// Returns as soon as its register traffic is done.
    NonBlocking,
    /// May busy-wait on the tick clock for a bounded slice of the period.
    Blocking,
}

/// A scan function a driver offers to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFunction {
    /// Full name, `<board>.<function>`.
    pub name: String,
    /// Driver-local index passed back to `BoardDriver::call`.
    pub index: usize,
    /// Declared execution characteristic.
    pub kind: FunctionKind,
    /// Whether the function uses floating point.
    pub uses_fp: bool,
}

impl ExportedFunction {
    /// Describe a non-blocking floating-point function.
    pub fn new(board: &str, function: &str, index: usize) -> Self {
        Self {
            name: format!("{board}.{function}"),
            index,
            kind: FunctionKind::NonBlocking,
            uses_fp: true,
        }
    }

    /// Mark the function as not using floating point.
    pub fn without_fp(mut self) -> Self {
        self.uses_fp = false;
        self
    }

    /// Mark the function as busy-waiting.
    pub fn blocking(mut self) -> Self {
        self.kind = FunctionKind::Blocking;
        self
    }
}

/// Summary of one exported pin, for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct PinInfo {
    /// Full pin name.
    pub name: String,
    /// Value type.
    pub pin_type: PinType,
    /// Direction.
    pub dir: PinDir,
    /// Current value rendered as text.
    pub value: String,
}

/// Name-keyed table of exported pins.
#[derive(Debug, Default)]
pub struct PinRegistry {
    pins: BTreeMap<String, PinEntry>,
}

impl PinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, name: String, dir: PinDir, cell: PinCell) -> Result<(), HalError> {
        if self.pins.contains_key(&name) {
            return Err(HalError::PinExists(name));
        }
        self.pins.insert(name, PinEntry { dir, cell });
        Ok(())
    }

    fn entry(&self, name: &str) -> Result<&PinEntry, HalError> {
        self.pins
            .get(name)
            .ok_or_else(|| HalError::PinNotFound(name.to_string()))
    }

    /// Create a boolean pin.
    pub fn new_bit(&mut self, name: impl Into<String>, dir: PinDir, initial: bool) -> Result<BitPin, HalError> {
        let pin = BitPin::default();
        pin.set(initial);
        self.insert(name.into(), dir, PinCell::Bit(pin.clone()))?;
        Ok(pin)
    }

    /// Create a signed 32-bit pin.
    pub fn new_s32(&mut self, name: impl Into<String>, dir: PinDir, initial: i32) -> Result<S32Pin, HalError> {
        let pin = S32Pin::default();
        pin.set(initial);
        self.insert(name.into(), dir, PinCell::S32(pin.clone()))?;
        Ok(pin)
    }

    /// Create an unsigned 32-bit pin.
    pub fn new_u32(&mut self, name: impl Into<String>, dir: PinDir, initial: u32) -> Result<U32Pin, HalError> {
        let pin = U32Pin::default();
        pin.set(initial);
        self.insert(name.into(), dir, PinCell::U32(pin.clone()))?;
        Ok(pin)
    }

    /// Create a float pin.
    pub fn new_float(&mut self, name: impl Into<String>, dir: PinDir, initial: f64) -> Result<FloatPin, HalError> {
        let pin = FloatPin::default();
        pin.set(initial);
        self.insert(name.into(), dir, PinCell::Float(pin.clone()))?;
        Ok(pin)
    }

    /// Look up a boolean pin.
    pub fn bit(&self, name: &str) -> Result<BitPin, HalError> {
        match &self.entry(name)?.cell {
            PinCell::Bit(p) => Ok(p.clone()),
            other => Err(mismatch(name, PinType::Bit, other.pin_type())),
        }
    }

    /// Look up a signed 32-bit pin.
    pub fn s32(&self, name: &str) -> Result<S32Pin, HalError> {
        match &self.entry(name)?.cell {
            PinCell::S32(p) => Ok(p.clone()),
            other => Err(mismatch(name, PinType::S32, other.pin_type())),
        }
    }

    /// Look up an unsigned 32-bit pin.
    pub fn u32(&self, name: &str) -> Result<U32Pin, HalError> {
        match &self.entry(name)?.cell {
            PinCell::U32(p) => Ok(p.clone()),
            other => Err(mismatch(name, PinType::U32, other.pin_type())),
        }
    }

    /// Look up a float pin.
    pub fn float(&self, name: &str) -> Result<FloatPin, HalError> {
        match &self.entry(name)?.cell {
            PinCell::Float(p) => Ok(p.clone()),
            other => Err(mismatch(name, PinType::Float, other.pin_type())),
        }
    }

    /// Direction of a pin.
    pub fn dir(&self, name: &str) -> Result<PinDir, HalError> {
        Ok(self.entry(name)?.dir)
    }

    /// Remove every pin whose name starts with `<prefix>.`.
    ///
    /// Returns the number of pins removed.
    pub fn unexport_prefix(&mut self, prefix: &str) -> usize {
        let dotted = format!("{prefix}.");
        let before = self.pins.len();
        self.pins.retain(|name, _| !name.starts_with(&dotted));
        before - self.pins.len()
    }

    /// Number of exported pins.
    pub fn len(&self) -> usize {
        self.pins.len()
    }

    /// Whether no pins are exported.
    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Snapshot of all pins, sorted by name.
    pub fn list(&self) -> Vec<PinInfo> {
        self.pins
            .iter()
            .map(|(name, entry)| PinInfo {
                name: name.clone(),
                pin_type: entry.cell.pin_type(),
                dir: entry.dir,
                value: match &entry.cell {
                    PinCell::Bit(p) => p.get().to_string(),
                    PinCell::S32(p) => p.get().to_string(),
                    PinCell::U32(p) => p.get().to_string(),
                    PinCell::Float(p) => format!("{:.6}", p.get()),
                },
            })
            .collect()
    }
}

fn mismatch(name: &str, expected: PinType, actual: PinType) -> HalError {
    HalError::PinTypeMismatch {
        name: name.to_string(),
        expected,
        actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_lookup_shares_the_cell() {
        let mut reg = PinRegistry::new();
        let driver_side = reg.new_float("stg.0.enc.00.scale", PinDir::Io, 1.0).unwrap();
        let operator_side = reg.float("stg.0.enc.00.scale").unwrap();

        operator_side.set(2000.0);
        assert_eq!(driver_side.get(), 2000.0);
        assert_eq!(reg.dir("stg.0.enc.00.scale").unwrap(), PinDir::Io);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut reg = PinRegistry::new();
        reg.new_bit("parport.0.pin-02-out", PinDir::In, false).unwrap();
        let err = reg.new_bit("parport.0.pin-02-out", PinDir::In, false).unwrap_err();
        assert!(matches!(err, HalError::PinExists(_)));
    }

    #[test]
    fn type_mismatch_reported() {
        let mut reg = PinRegistry::new();
        reg.new_s32("stg.0.enc.00.counts", PinDir::Out, 0).unwrap();
        let err = reg.float("stg.0.enc.00.counts").unwrap_err();
        assert!(matches!(
            err,
            HalError::PinTypeMismatch { expected: PinType::Float, actual: PinType::S32, .. }
        ));
        assert!(matches!(reg.bit("nope"), Err(HalError::PinNotFound(_))));
    }

    #[test]
    fn unexport_prefix_only_removes_that_board() {
        let mut reg = PinRegistry::new();
        reg.new_u32("parport.0.reset-time", PinDir::Io, 5000).unwrap();
        reg.new_bit("parport.0.pin-10-in", PinDir::Out, false).unwrap();
        reg.new_bit("parport.01.pin-10-in", PinDir::Out, false).unwrap();

        assert_eq!(reg.unexport_prefix("parport.0"), 2);
        assert_eq!(reg.len(), 1);
        assert!(reg.bit("parport.01.pin-10-in").is_ok());
    }

    #[test]
    fn float_round_trips_exact_bits() {
        let pin = FloatPin::default();
        pin.set(-0.1);
        assert_eq!(pin.get().to_bits(), (-0.1f64).to_bits());
    }

    #[test]
    fn list_is_sorted_and_rendered() {
        let mut reg = PinRegistry::new();
        reg.new_s32("b.count", PinDir::Out, -3).unwrap();
        reg.new_bit("a.flag", PinDir::In, true).unwrap();
        let list = reg.list();
        assert_eq!(list[0].name, "a.flag");
        assert_eq!(list[0].value, "true");
        assert_eq!(list[1].value, "-3");
        assert_eq!(list[1].pin_type, PinType::S32);
    }

    #[test]
    fn exported_function_naming() {
        let f = ExportedFunction::new("parport.0", "write", 1).without_fp();
        assert_eq!(f.name, "parport.0.write");
        assert_eq!(f.kind, FunctionKind::NonBlocking);
        assert!(!f.uses_fp);

        let f = ExportedFunction::new("parport.0", "reset", 2).without_fp().blocking();
        assert_eq!(f.kind, FunctionKind::Blocking);
    }
}
