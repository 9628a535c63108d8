//! Simulated hardware.
//!
//! - [`SimClock`] - Manually advanced tick clock shared between the driver
//!   under test and the hardware model
//! - [`SimDevice`] - Register-level behaviour of a simulated board
//! - [`SimBus`] - Adapts a shared `SimDevice` to `RegisterIo`
//! - [`RegisterFile`] - Plain RAM-like device with a timestamped write log
//!
//! The device sits behind `Arc<Mutex<_>>` so a test can keep a handle and
//! inspect or poke the hardware between scans.

use cnc_common::hal::clock::TickClock;
use cnc_common::hal::regs::{RegisterIo, Width};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Simulated tick clock.
///
/// Clones share the same counter. With a non-zero `step`, every
/// [`TickClock::ticks`] call advances the counter, so busy-waits terminate.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Arc<AtomicU64>,
    step: u64,
    ticks_per_sec: u64,
}

impl SimClock {
    /// Clock at tick zero with one tick per nanosecond and no auto-step.
    pub fn new() -> Self {
        Self {
            now: Arc::new(AtomicU64::new(0)),
            step: 0,
            ticks_per_sec: 1_000_000_000,
        }
    }

    /// Advance by `step` ticks on every read.
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    /// Use a different tick rate.
    pub fn with_rate(mut self, ticks_per_sec: u64) -> Self {
        self.ticks_per_sec = ticks_per_sec;
        self
    }

    /// Current tick without stepping.
    pub fn peek(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }

    /// Move the clock forward.
    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::Relaxed);
    }

    /// Move the clock forward by nanoseconds.
    pub fn advance_ns(&self, ns: u64) {
        self.advance(self.ns_to_ticks(ns));
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for SimClock {
    fn ticks(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::Relaxed)
    }

    fn ticks_per_sec(&self) -> u64 {
        self.ticks_per_sec
    }
}

/// Register-level behaviour of a simulated board.
pub trait SimDevice: Send {
    /// Handle a read of `width` at `offset`.
    fn read(&mut self, offset: u32, width: Width, now: u64) -> u32;

    /// Handle a write of `width` at `offset`.
    fn write(&mut self, offset: u32, width: Width, value: u32, now: u64);
}

/// Shared handle to a simulated device.
pub type Shared<D> = Arc<Mutex<D>>;

/// Wrap a device for sharing between a bus and a test.
pub fn shared<D: SimDevice>(device: D) -> Shared<D> {
    Arc::new(Mutex::new(device))
}

/// Lock a shared device, ignoring poisoning from a panicked test thread.
pub fn lock<D>(device: &Shared<D>) -> MutexGuard<'_, D> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// `RegisterIo` over a shared simulated device.
pub struct SimBus<D: SimDevice> {
    device: Shared<D>,
    clock: SimClock,
}

impl<D: SimDevice> SimBus<D> {
    /// Bind `device` to a bus timestamped by `clock`.
    pub fn new(device: Shared<D>, clock: SimClock) -> Self {
        Self { device, clock }
    }

    fn rd(&mut self, offset: u32, width: Width) -> u32 {
        let now = self.clock.peek();
        lock(&self.device).read(offset, width, now) & width.mask()
    }

    fn wr(&mut self, offset: u32, width: Width, value: u32) {
        let now = self.clock.peek();
        lock(&self.device).write(offset, width, value & width.mask(), now)
    }
}

impl<D: SimDevice> RegisterIo for SimBus<D> {
    fn read8(&mut self, offset: u32) -> u8 {
        self.rd(offset, Width::W8) as u8
    }
    fn write8(&mut self, offset: u32, value: u8) {
        self.wr(offset, Width::W8, u32::from(value))
    }
    fn read16(&mut self, offset: u32) -> u16 {
        self.rd(offset, Width::W16) as u16
    }
    fn write16(&mut self, offset: u32, value: u16) {
        self.wr(offset, Width::W16, u32::from(value))
    }
    fn read32(&mut self, offset: u32) -> u32 {
        self.rd(offset, Width::W32)
    }
    fn write32(&mut self, offset: u32, value: u32) {
        self.wr(offset, Width::W32, value)
    }
}

/// One logged register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRecord {
    /// Register offset.
    pub offset: u32,
    /// Value written.
    pub value: u32,
    /// Clock tick at the time of the write.
    pub tick: u64,
}

/// RAM-like device: reads return the last written value (or a preset input).
#[derive(Debug, Default)]
pub struct RegisterFile {
    regs: HashMap<u32, u32>,
    inputs: HashMap<u32, u32>,
    writes: Vec<WriteRecord>,
    reads: usize,
}

impl RegisterFile {
    /// Empty register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make reads of `offset` return `value` regardless of writes.
    pub fn set_input(&mut self, offset: u32, value: u32) {
        self.inputs.insert(offset, value);
    }

    /// Stop overriding reads of `offset`.
    pub fn clear_input(&mut self, offset: u32) {
        self.inputs.remove(&offset);
    }

    /// Last value written to `offset` (zero if never written).
    pub fn value(&self, offset: u32) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    /// All writes in order.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    /// Writes to one register, in order.
    pub fn writes_to(&self, offset: u32) -> Vec<WriteRecord> {
        self.writes.iter().copied().filter(|w| w.offset == offset).collect()
    }

    /// Number of reads served.
    pub fn read_count(&self) -> usize {
        self.reads
    }
}

impl SimDevice for RegisterFile {
    fn read(&mut self, offset: u32, _width: Width, _now: u64) -> u32 {
        self.reads += 1;
        self.inputs
            .get(&offset)
            .or_else(|| self.regs.get(&offset))
            .copied()
            .unwrap_or(0)
    }

    fn write(&mut self, offset: u32, _width: Width, value: u32, now: u64) {
        self.regs.insert(offset, value);
        self.writes.push(WriteRecord { offset, value, tick: now });
    }
}
