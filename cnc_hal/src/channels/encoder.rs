//! Quadrature encoder channel.
//!
//! Each scan the channel reads its hardware counter, extends it to a 64-bit
//! logical count, services the index-latch handshake and publishes the
//! count and the scaled position.
//!
//! Pins, under `<board>.enc.<NN>`:
//!
//! | Pin | Type | Dir | Meaning |
//! |-----|------|-----|---------|
//! | `rawcounts` | s32 | out | Counter as read, sign-extended |
//! | `counts` | s32 | out | Low 32 bits of the extended count |
//! | `position` | float | out | `count / scale` |
//! | `scale` | float | io | Counts per user unit |
//! | `index-enable` | bit | io | Arm index capture; cleared by the driver on capture |
//! | `index-reset` | bit | io | Zero the count when the index is captured |

use crate::channels::scale::ScaleCache;
use cnc_common::consts::DEFAULT_SCALE;
use cnc_common::hal::driver::HalError;
use cnc_common::hal::pins::{BitPin, FloatPin, PinDir, PinRegistry, S32Pin};
use cnc_common::hal::regs::RegisterIo;
use cnc_common::rollover;

/// Register-level access to one board family's encoder counters.
pub trait EncoderHw {
    /// Width of the hardware counter.
    fn counter_bits(&self) -> u32;

    /// Read a counter, sign-extended to 32 bits.
    fn read_count(&self, bus: &mut dyn RegisterIo, channel: usize) -> i32;

    /// Enable or disable index capture.
    fn arm_index(&self, bus: &mut dyn RegisterIo, channel: usize, armed: bool);

    /// Whether an index pulse has been captured since arming.
    fn index_seen(&self, bus: &mut dyn RegisterIo, channel: usize) -> bool;

    /// Acknowledge a captured index pulse.
    fn ack_index(&self, bus: &mut dyn RegisterIo, channel: usize);

    /// Zero the hardware counter.
    fn reset_count(&self, bus: &mut dyn RegisterIo, channel: usize);
}

/// One encoder input.
#[derive(Debug)]
pub struct EncoderChannel {
    channel: usize,
    count: i64,
    armed: bool,
    scale: ScaleCache,
    rawcounts: S32Pin,
    counts: S32Pin,
    position: FloatPin,
    scale_param: FloatPin,
    index_enable: BitPin,
    index_reset: BitPin,
}

impl EncoderChannel {
    /// Export the channel's pins under `prefix` (e.g. `stg.0.enc.03`).
    pub fn export(pins: &mut PinRegistry, prefix: &str, channel: usize) -> Result<Self, HalError> {
        Ok(Self {
            channel,
            count: 0,
            armed: false,
            scale: ScaleCache::new(DEFAULT_SCALE),
            rawcounts: pins.new_s32(format!("{prefix}.rawcounts"), PinDir::Out, 0)?,
            counts: pins.new_s32(format!("{prefix}.counts"), PinDir::Out, 0)?,
            position: pins.new_float(format!("{prefix}.position"), PinDir::Out, 0.0)?,
            scale_param: pins.new_float(format!("{prefix}.scale"), PinDir::Io, DEFAULT_SCALE)?,
            index_enable: pins.new_bit(format!("{prefix}.index-enable"), PinDir::Io, false)?,
            index_reset: pins.new_bit(format!("{prefix}.index-reset"), PinDir::Io, false)?,
        })
    }

    /// Hardware channel number.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Extended logical count.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// One scan: index handshake, counter read, publish.
    pub fn capture<H: EncoderHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo) {
        if let Some(substitute) = self.scale.update(self.scale_param.get()) {
            self.scale_param.set(substitute);
        }

        let ch = self.channel;
        let want_index = self.index_enable.get();
        if want_index && !self.armed {
            hw.arm_index(bus, ch, true);
            self.armed = true;
        } else if !want_index && self.armed {
            hw.arm_index(bus, ch, false);
            self.armed = false;
        } else if self.armed && hw.index_seen(bus, ch) {
            hw.ack_index(bus, ch);
            hw.arm_index(bus, ch, false);
            self.armed = false;
            self.index_enable.set(false);
            if self.index_reset.get() {
                hw.reset_count(bus, ch);
                self.count = 0;
            }
        }

        let raw = hw.read_count(bus, ch);
        let bits = hw.counter_bits();
        let low = u64::from(raw as u32) & ((1u64 << bits) - 1);
        self.count = rollover::extend(self.count, low, bits);

        self.rawcounts.set(raw);
        self.counts.set(self.count as i32);
        self.position.set(self.count as f64 * self.scale.recip());
    }

    /// Disarm index capture before the board is released.
    pub fn release<H: EncoderHw + ?Sized>(&mut self, hw: &H, bus: &mut dyn RegisterIo) {
        if self.armed {
            hw.arm_index(bus, self.channel, false);
            self.armed = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::sim::{RegisterFile, Shared, SimBus, SimClock, SimDevice, lock, shared};
    use cnc_common::hal::regs::Width;

    const ARM: u32 = 0x40;
    const SEEN: u32 = 0x44;
    const ACK: u32 = 0x48;

    /// 24-bit counters at `ch * 4`, one bit per channel in the index registers.
    struct TestEncoders;

    impl EncoderHw for TestEncoders {
        fn counter_bits(&self) -> u32 {
            24
        }
        fn read_count(&self, bus: &mut dyn RegisterIo, channel: usize) -> i32 {
            rollover::sign_extend(bus.read32(channel as u32 * 4) & 0xFF_FFFF, 24)
        }
        fn arm_index(&self, bus: &mut dyn RegisterIo, channel: usize, armed: bool) {
            let v = bus.read32(ARM);
            let bit = 1 << channel;
            bus.write32(ARM, if armed { v | bit } else { v & !bit });
        }
        fn index_seen(&self, bus: &mut dyn RegisterIo, channel: usize) -> bool {
            bus.read32(SEEN) & (1 << channel) != 0
        }
        fn ack_index(&self, bus: &mut dyn RegisterIo, channel: usize) {
            bus.write32(ACK, 1 << channel);
        }
        fn reset_count(&self, bus: &mut dyn RegisterIo, channel: usize) {
            bus.write32(channel as u32 * 4, 0);
        }
    }

    fn setup() -> (PinRegistry, EncoderChannel, Shared<RegisterFile>, SimBus<RegisterFile>) {
        let mut pins = PinRegistry::new();
        let enc = EncoderChannel::export(&mut pins, "test.0.enc.01", 1).unwrap();
        let dev = shared(RegisterFile::new());
        let bus = SimBus::new(dev.clone(), SimClock::new());
        (pins, enc, dev, bus)
    }

    fn poke(dev: &Shared<RegisterFile>, offset: u32, value: u32) {
        lock(dev).write(offset, Width::W32, value, 0);
    }

    #[test]
    fn counter_wrap_is_extended() {
        let (pins, mut enc, dev, mut bus) = setup();

        poke(&dev, 4, 0x7F_FFF0);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(enc.count(), 0x7F_FFF0);

        poke(&dev, 4, 0x80_0010);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(enc.count(), 0x80_0010);
        assert_eq!(pins.s32("test.0.enc.01.rawcounts").unwrap().get(), -0x7F_FFF0);
        assert_eq!(pins.s32("test.0.enc.01.counts").unwrap().get(), 0x80_0010);
    }

    #[test]
    fn negative_counts_from_zero() {
        let (_pins, mut enc, dev, mut bus) = setup();
        poke(&dev, 4, 0xFF_FFFB);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(enc.count(), -5);
    }

    #[test]
    fn scale_change_applies_on_next_scan() {
        let (pins, mut enc, dev, mut bus) = setup();
        let scale = pins.float("test.0.enc.01.scale").unwrap();
        let position = pins.float("test.0.enc.01.position").unwrap();

        scale.set(100.0);
        poke(&dev, 4, 1000);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(position.get(), 10.0);

        scale.set(200.0);
        assert_eq!(position.get(), 10.0);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(position.get(), 5.0);
    }

    #[test]
    fn zero_scale_written_back() {
        let (pins, mut enc, dev, mut bus) = setup();
        let scale = pins.float("test.0.enc.01.scale").unwrap();
        scale.set(0.0);
        poke(&dev, 4, 7);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(scale.get(), DEFAULT_SCALE);
        assert_eq!(pins.float("test.0.enc.01.position").unwrap().get(), 7.0);
    }

    #[test]
    fn index_handshake_self_clears_and_resets() {
        let (pins, mut enc, dev, mut bus) = setup();
        let enable = pins.bit("test.0.enc.01.index-enable").unwrap();
        pins.bit("test.0.enc.01.index-reset").unwrap().set(true);

        poke(&dev, 4, 500);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(enc.count(), 500);

        enable.set(true);
        enc.capture(&TestEncoders, &mut bus);
        assert_eq!(lock(&dev).value(ARM), 0b10);
        assert!(enable.get());

        lock(&dev).set_input(SEEN, 0b10);
        enc.capture(&TestEncoders, &mut bus);
        assert!(!enable.get());
        assert_eq!(lock(&dev).value(ACK), 0b10);
        assert_eq!(lock(&dev).value(ARM), 0);
        assert_eq!(enc.count(), 0);
    }

    #[test]
    fn index_without_reset_keeps_count() {
        let (pins, mut enc, dev, mut bus) = setup();
        let enable = pins.bit("test.0.enc.01.index-enable").unwrap();
        poke(&dev, 4, 42);
        enable.set(true);
        enc.capture(&TestEncoders, &mut bus);
        lock(&dev).set_input(SEEN, 0b10);
        enc.capture(&TestEncoders, &mut bus);
        assert!(!enable.get());
        assert_eq!(enc.count(), 42);
    }

    #[test]
    fn release_disarms() {
        let (pins, mut enc, dev, mut bus) = setup();
        pins.bit("test.0.enc.01.index-enable").unwrap().set(true);
        enc.capture(&TestEncoders, &mut bus);
        enc.release(&TestEncoders, &mut bus);
        assert_eq!(lock(&dev).value(ARM), 0);
    }
}
