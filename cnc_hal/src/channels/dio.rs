//! Digital I/O ports with timed reset pulses.
//!
//! A port is a group of bits sharing one hardware register, all of one
//! direction. Output ports can mark bits as auto-resetting: after a write
//! drives such a bit away from its rest level, a later `reset` call returns
//! it to rest, no earlier than `dwell` ticks after the write.
//!
//! Pin names use the connector pin number:
//!
//! - inputs: `<board>.pin-NN-in` and `<board>.pin-NN-in-not` (bit out)
//! - outputs: `<board>.pin-NN-out` (bit in), `<board>.pin-NN-out-invert`
//!   (bit io) and, on resettable ports, `<board>.pin-NN-out-reset` (bit io)
//!
//! A bit's rest level is its `-out-invert` value: the level it has when the
//! commanded value is false.

use cnc_common::consts::MAX_PORT_BITS;
use cnc_common::hal::clock::{Deadline, TickClock, spin_until};
use cnc_common::hal::consts::MAX_SPIN_POLLS;
use cnc_common::hal::driver::HalError;
use cnc_common::hal::pins::{BitPin, PinDir, PinRegistry};
use cnc_common::hal::regs::{RegisterIo, Width};
use heapless::Vec;

/// Direction of a whole port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDir {
    /// Bits are read from the hardware.
    Input,
    /// Bits are written to the hardware.
    Output,
}

/// Where a port lives and how the board wires it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayout {
    /// Register offset from the board base.
    pub offset: u32,
    /// Register width.
    pub width: Width,
    /// Bits inverted by on-board hardware; XORed after the per-bit invert.
    pub hw_invert: u32,
    /// Bits outside the port that every write must carry.
    pub fixed_bits: u32,
}

impl PortLayout {
    /// Port at `offset` with no inverters and no fixed bits.
    pub const fn plain(offset: u32, width: Width) -> Self {
        Self { offset, width, hw_invert: 0, fixed_bits: 0 }
    }
}

/// Pending return of auto-reset bits to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSchedule {
    /// Tick of the write that drove the bits away from rest.
    pub issued_at: u64,
    /// Minimum ticks the bits must be held.
    pub dwell_ticks: u64,
    /// Bits to return to rest.
    pub mask: u32,
    /// Logical port value to write once the deadline passes.
    pub value_after_clear: u32,
}

impl ResetSchedule {
    /// Earliest tick the clearing write may happen.
    pub const fn deadline(&self) -> Deadline {
        Deadline::after(self.issued_at, self.dwell_ticks)
    }
}

/// Result of a `reset` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Nothing was pending.
    Idle,
    /// The clearing write happened; `at` is the tick just after it.
    Cleared {
        /// Tick read after the write.
        at: u64,
    },
    /// The deadline is too far away; the reset stays pending.
    Deferred,
}

#[derive(Debug)]
struct DioBit {
    mask: u32,
    pin: BitPin,
    pin_not: Option<BitPin>,
    invert: Option<BitPin>,
    reset: Option<BitPin>,
}

/// One register's worth of digital bits.
#[derive(Debug)]
pub struct DigitalPort {
    layout: PortLayout,
    dir: PortDir,
    bits: Vec<DioBit, MAX_PORT_BITS>,
    port_mask: u32,
    last: Option<u32>,
    last_write_tick: u64,
    pending: Option<ResetSchedule>,
}

impl DigitalPort {
    fn empty(layout: PortLayout, dir: PortDir) -> Self {
        Self {
            layout,
            dir,
            bits: Vec::new(),
            port_mask: 0,
            last: None,
            last_write_tick: 0,
            pending: None,
        }
    }

    fn push(&mut self, board: &str, bit: DioBit) -> Result<(), HalError> {
        self.port_mask |= bit.mask;
        self.bits
            .push(bit)
            .map_err(|_| HalError::ConfigError(format!("{board}: more than {MAX_PORT_BITS} bits in one port")))
    }

    /// Export an input port. `bits` pairs connector pin numbers with
    /// register masks.
    pub fn export_inputs(
        pins: &mut PinRegistry,
        board: &str,
        layout: PortLayout,
        bits: &[(u8, u32)],
    ) -> Result<Self, HalError> {
        let mut port = Self::empty(layout, PortDir::Input);
        for &(nn, mask) in bits {
            let bit = DioBit {
                mask,
                pin: pins.new_bit(format!("{board}.pin-{nn:02}-in"), PinDir::Out, false)?,
                pin_not: Some(pins.new_bit(format!("{board}.pin-{nn:02}-in-not"), PinDir::Out, true)?),
                invert: None,
                reset: None,
            };
            port.push(board, bit)?;
        }
        Ok(port)
    }

    /// Export an output port. With `resettable`, each bit also gets an
    /// `-out-reset` parameter.
    pub fn export_outputs(
        pins: &mut PinRegistry,
        board: &str,
        layout: PortLayout,
        bits: &[(u8, u32)],
        resettable: bool,
    ) -> Result<Self, HalError> {
        let mut port = Self::empty(layout, PortDir::Output);
        for &(nn, mask) in bits {
            let reset = if resettable {
                Some(pins.new_bit(format!("{board}.pin-{nn:02}-out-reset"), PinDir::Io, false)?)
            } else {
                None
            };
            let bit = DioBit {
                mask,
                pin: pins.new_bit(format!("{board}.pin-{nn:02}-out"), PinDir::In, false)?,
                pin_not: None,
                invert: Some(pins.new_bit(format!("{board}.pin-{nn:02}-out-invert"), PinDir::Io, false)?),
                reset,
            };
            port.push(board, bit)?;
        }
        Ok(port)
    }

    /// Port direction.
    pub fn dir(&self) -> PortDir {
        self.dir
    }

    /// Register layout.
    pub fn layout(&self) -> PortLayout {
        self.layout
    }

    /// Last register value written, if any.
    pub fn last_written(&self) -> Option<u32> {
        self.last.map(|logical| self.register_value(logical))
    }

    /// Outstanding reset, if any.
    pub fn pending(&self) -> Option<ResetSchedule> {
        self.pending
    }

    #[inline]
    fn register_value(&self, logical: u32) -> u32 {
        ((logical ^ self.layout.hw_invert) & self.port_mask) | self.layout.fixed_bits
    }

    #[inline]
    fn put(&mut self, bus: &mut dyn RegisterIo, clock: &dyn TickClock, logical: u32) -> u64 {
        bus.write(self.layout.offset, self.layout.width, self.register_value(logical));
        let ts = clock.ticks();
        self.last = Some(logical);
        self.last_write_tick = ts;
        ts
    }

    /// Rest level of every bit, as a logical port value.
    fn rest(&self) -> u32 {
        self.bits
            .iter()
            .filter(|b| b.invert.as_ref().is_some_and(BitPin::get))
            .fold(0, |acc, b| acc | b.mask)
    }

    /// Sample an input port and publish its pins.
    pub fn read(&mut self, bus: &mut dyn RegisterIo) {
        if self.dir != PortDir::Input {
            return;
        }
        let raw = bus.read(self.layout.offset, self.layout.width) ^ self.layout.hw_invert;
        for bit in &self.bits {
            let on = raw & bit.mask != 0;
            bit.pin.set(on);
            if let Some(not) = &bit.pin_not {
                not.set(!on);
            }
        }
    }

    /// Assemble and write an output port.
    ///
    /// The register is only written when the assembled value changed. While
    /// a reset is pending its bits are held at their written level. Returns
    /// whether a write happened.
    pub fn write(&mut self, bus: &mut dyn RegisterIo, clock: &dyn TickClock, dwell_ticks: u64) -> bool {
        if self.dir != PortDir::Output {
            return false;
        }

        let mut logical = 0;
        let mut rest = 0;
        let mut resettable = 0;
        for bit in &self.bits {
            let invert = bit.invert.as_ref().is_some_and(BitPin::get);
            if bit.pin.get() ^ invert {
                logical |= bit.mask;
            }
            if invert {
                rest |= bit.mask;
            }
            if bit.reset.as_ref().is_some_and(BitPin::get) {
                resettable |= bit.mask;
            }
        }

        let mut wrote = false;
        if let (Some(p), Some(last)) = (self.pending.as_mut(), self.last) {
            logical = (logical & !p.mask) | (last & p.mask);
            p.value_after_clear = (logical & !p.mask) | (p.value_after_clear & p.mask);
        }
        if self.last != Some(logical) {
            self.put(bus, clock, logical);
            wrote = true;
        }

        let Some(last) = self.last else {
            return wrote;
        };
        let away = (last ^ rest) & resettable;
        let written_at = self.last_write_tick;
        match self.pending.as_mut() {
            None if away != 0 => {
                self.pending = Some(ResetSchedule {
                    issued_at: written_at,
                    dwell_ticks: dwell_ticks.max(1),
                    mask: away,
                    value_after_clear: (last & !away) | (rest & away),
                });
            }
            // Bits raised behind a pending reset join it, timed from this write.
            Some(p) if away & !p.mask != 0 => {
                let fresh = away & !p.mask;
                p.mask |= fresh;
                p.issued_at = p.issued_at.max(written_at);
                p.dwell_ticks = p.dwell_ticks.max(dwell_ticks.max(1));
                p.value_after_clear = (p.value_after_clear & !fresh) | (rest & fresh);
            }
            _ => {}
        }
        wrote
    }

    /// Return pending auto-reset bits to rest once their deadline passes.
    ///
    /// If the deadline is already reached the clearing write happens at
    /// once; if it is at most `budget_ticks` away this call spins until it;
    /// otherwise the reset is left for a later call.
    pub fn reset(&mut self, bus: &mut dyn RegisterIo, clock: &dyn TickClock, budget_ticks: u64) -> ResetOutcome {
        let Some(pending) = self.pending else {
            return ResetOutcome::Idle;
        };
        let deadline = pending.deadline();
        let now = clock.ticks();
        if !deadline.reached(now) {
            if deadline.remaining(now) > budget_ticks {
                return ResetOutcome::Deferred;
            }
            if spin_until(clock, deadline, MAX_SPIN_POLLS).is_none() {
                return ResetOutcome::Deferred;
            }
        }
        let at = self.put(bus, clock, pending.value_after_clear);
        self.pending = None;
        ResetOutcome::Cleared { at }
    }

    /// Forget the last written value so the next `write` goes out even if
    /// the assembled value is unchanged. Drops any pending reset.
    pub fn invalidate(&mut self) {
        self.last = None;
        self.pending = None;
    }

    /// Drive every output bit to rest and drop any pending reset.
    pub fn safe(&mut self, bus: &mut dyn RegisterIo, clock: &dyn TickClock) {
        if self.dir != PortDir::Output {
            return;
        }
        self.pending = None;
        let rest = self.rest();
        self.put(bus, clock, rest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::sim::{RegisterFile, Shared, SimBus, SimClock, lock, shared};

    const OUT: PortLayout = PortLayout { offset: 2, width: Width::W8, hw_invert: 0x0B, fixed_bits: 0x20 };
    const BITS: [(u8, u32); 4] = [(1, 0x01), (14, 0x02), (16, 0x04), (17, 0x08)];

    struct Rig {
        pins: PinRegistry,
        port: DigitalPort,
        dev: Shared<RegisterFile>,
        bus: SimBus<RegisterFile>,
        clock: SimClock,
    }

    fn outputs(resettable: bool) -> Rig {
        let mut pins = PinRegistry::new();
        let port = DigitalPort::export_outputs(&mut pins, "pp", OUT, &BITS, resettable).unwrap();
        let clock = SimClock::new().with_step(1);
        let dev = shared(RegisterFile::new());
        let bus = SimBus::new(dev.clone(), clock.clone());
        Rig { pins, port, dev, bus, clock }
    }

    impl Rig {
        fn write(&mut self, dwell: u64) -> bool {
            self.port.write(&mut self.bus, &self.clock, dwell)
        }
        fn reset(&mut self, budget: u64) -> ResetOutcome {
            self.port.reset(&mut self.bus, &self.clock, budget)
        }
        fn bit(&self, name: &str) -> BitPin {
            self.pins.bit(name).unwrap()
        }
    }

    #[test]
    fn assembly_applies_invert_hw_invert_and_fixed_bits() {
        let mut rig = outputs(false);
        rig.bit("pp.pin-01-out").set(true);
        rig.bit("pp.pin-16-out-invert").set(true);
        assert!(rig.write(0));
        // logical 0b0101, hardware inverts 0b1011 -> 0b1110, plus 0x20.
        assert_eq!(lock(&rig.dev).value(2), 0x2E);
        assert_eq!(rig.port.last_written(), Some(0x2E));
    }

    #[test]
    fn unchanged_value_is_not_rewritten() {
        let mut rig = outputs(false);
        assert!(rig.write(0));
        assert!(!rig.write(0));
        rig.bit("pp.pin-17-out").set(true);
        assert!(rig.write(0));
        assert_eq!(lock(&rig.dev).writes_to(2).len(), 2);
    }

    #[test]
    fn reset_pulse_respects_dwell() {
        let mut rig = outputs(true);
        rig.write(0);
        rig.bit("pp.pin-14-out-reset").set(true);
        rig.bit("pp.pin-14-out").set(true);
        rig.clock.advance(1_000);

        let dwell = 5_000;
        assert!(rig.write(dwell));
        let set_at = lock(&rig.dev).writes_to(2)[1].tick;
        let pending = rig.port.pending().unwrap();
        assert_eq!(pending.mask, 0x02);

        assert!(matches!(rig.reset(dwell), ResetOutcome::Cleared { .. }));
        let writes = lock(&rig.dev).writes_to(2);
        assert_eq!(writes.len(), 3);
        assert!(writes[2].tick >= set_at + dwell);
        // Bit 1 back at rest (low), hardware-inverted.
        assert_eq!(writes[2].value & 0x02, 0x02);
        assert_eq!(writes[1].value & 0x02, 0x00);
        assert!(rig.port.pending().is_none());
    }

    #[test]
    fn far_deadline_is_deferred_then_cleared() {
        let mut rig = outputs(true);
        rig.bit("pp.pin-01-out-reset").set(true);
        rig.bit("pp.pin-01-out").set(true);
        rig.write(50_000);

        assert_eq!(rig.reset(1_000), ResetOutcome::Deferred);
        assert_eq!(lock(&rig.dev).writes_to(2).len(), 1);

        rig.clock.advance(60_000);
        assert!(matches!(rig.reset(1_000), ResetOutcome::Cleared { .. }));
        assert_eq!(rig.reset(1_000), ResetOutcome::Idle);
    }

    #[test]
    fn intermediate_write_holds_reset_bits() {
        let mut rig = outputs(true);
        rig.bit("pp.pin-01-out-reset").set(true);
        rig.bit("pp.pin-01-out").set(true);
        rig.write(50_000);

        // Operator drops the command and raises another bit before the dwell ends.
        rig.bit("pp.pin-01-out").set(false);
        rig.bit("pp.pin-17-out").set(true);
        assert!(rig.write(50_000));
        let writes = lock(&rig.dev).writes_to(2);
        // pin 1 (bit 0, hardware-inverted) still driven: register bit 0 low.
        assert_eq!(writes[1].value & 0x01, 0x00);

        rig.clock.advance(60_000);
        rig.reset(0);
        let after = lock(&rig.dev).value(2);
        // pin 1 at rest, pin 17 still on.
        assert_eq!(after & 0x01, 0x01);
        assert_eq!(after & 0x08, 0x00);
    }

    #[test]
    fn bit_raised_while_reset_pending_gets_full_dwell() {
        let mut rig = outputs(true);
        rig.bit("pp.pin-01-out-reset").set(true);
        rig.bit("pp.pin-01-out").set(true);
        rig.write(50_000);
        assert_eq!(rig.reset(1_000), ResetOutcome::Deferred);

        rig.clock.advance(30_000);
        rig.bit("pp.pin-14-out-reset").set(true);
        rig.bit("pp.pin-14-out").set(true);
        assert!(rig.write(50_000));
        let raised_at = lock(&rig.dev).writes_to(2)[1].tick;
        let pending = rig.port.pending().unwrap();
        assert_eq!(pending.mask, 0x03);
        assert_eq!(pending.issued_at, raised_at);

        // Past the first bit's deadline but not the second's: nothing clears early.
        rig.clock.advance(25_000);
        assert_eq!(rig.reset(1_000), ResetOutcome::Deferred);

        rig.clock.advance(30_000);
        assert!(matches!(rig.reset(1_000), ResetOutcome::Cleared { .. }));
        let writes = lock(&rig.dev).writes_to(2);
        assert_eq!(writes.len(), 3);
        assert!(writes[2].tick >= raised_at + 50_000);
        // Both pins back at rest (low), hardware-inverted.
        assert_eq!(writes[2].value & 0x03, 0x03);
    }

    #[test]
    fn reset_bit_at_rest_schedules_nothing() {
        let mut rig = outputs(true);
        rig.bit("pp.pin-16-out-reset").set(true);
        rig.write(100);
        assert!(rig.port.pending().is_none());
        assert_eq!(rig.reset(100), ResetOutcome::Idle);
    }

    #[test]
    fn safe_drives_rest_levels() {
        let mut rig = outputs(true);
        rig.bit("pp.pin-01-out").set(true);
        rig.bit("pp.pin-14-out-invert").set(true);
        rig.write(0);
        rig.port.safe(&mut rig.bus, &rig.clock);
        // logical rest 0b0010 ^ 0b1011 = 0b1001, plus 0x20.
        assert_eq!(lock(&rig.dev).value(2), 0x29);
    }

    #[test]
    fn inputs_publish_both_polarities() {
        let mut pins = PinRegistry::new();
        let layout = PortLayout { offset: 1, width: Width::W8, hw_invert: 0x80, fixed_bits: 0 };
        let mut port = DigitalPort::export_inputs(&mut pins, "pp", layout, &[(10, 0x40), (11, 0x80)]).unwrap();
        let dev = shared(RegisterFile::new());
        let mut bus = SimBus::new(dev.clone(), SimClock::new());

        lock(&dev).set_input(1, 0x40);
        port.read(&mut bus);
        assert!(pins.bit("pp.pin-10-in").unwrap().get());
        assert!(!pins.bit("pp.pin-10-in-not").unwrap().get());
        // Hardware-inverted line reads high when the register bit is low.
        assert!(pins.bit("pp.pin-11-in").unwrap().get());

        lock(&dev).set_input(1, 0x80);
        port.read(&mut bus);
        assert!(!pins.bit("pp.pin-10-in").unwrap().get());
        assert!(!pins.bit("pp.pin-11-in").unwrap().get());
        assert!(pins.bit("pp.pin-11-in-not").unwrap().get());
    }
}
