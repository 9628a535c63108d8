//! Register access primitive.
//!
//! Board drivers talk to hardware exclusively through [`RegisterIo`]. An
//! implementation owns one board's address window; offsets are relative to
//! the board base. The real implementations (x86 port I/O, memory-mapped
//! PCI windows) and the simulated bus live in `cnc_hal::hw`.
//!
//! Reads take `&mut self` because reading a hardware register may have side
//! effects (clearing a status flag, advancing a FIFO).

/// Width of a single register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// 8-bit access.
    W8,
    /// 16-bit access.
    W16,
    /// 32-bit access.
    W32,
}

impl Width {
    /// Mask of the bits carried by this width.
    pub const fn mask(self) -> u32 {
        match self {
            Self::W8 => 0xFF,
            Self::W16 => 0xFFFF,
            Self::W32 => 0xFFFF_FFFF,
        }
    }

    /// Number of bits carried by this width.
    pub const fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
        }
    }
}

/// Raw fixed-width access to one board's registers.
///
/// Implementations must perform exactly one bus cycle per call, in program
/// order, with no caching. Accessors never fail: once a board is attached
/// its window is assumed valid, and a bad bus cycle surfaces as a bad value.
pub trait RegisterIo: Send {
    /// Read an 8-bit register.
    fn read8(&mut self, offset: u32) -> u8;
    /// Write an 8-bit register.
    fn write8(&mut self, offset: u32, value: u8);
    /// Read a 16-bit register.
    fn read16(&mut self, offset: u32) -> u16;
    /// Write a 16-bit register.
    fn write16(&mut self, offset: u32, value: u16);
    /// Read a 32-bit register.
    fn read32(&mut self, offset: u32) -> u32;
    /// Write a 32-bit register.
    fn write32(&mut self, offset: u32, value: u32);

    /// Read a register of the given width, zero-extended.
    fn read(&mut self, offset: u32, width: Width) -> u32 {
        match width {
            Width::W8 => u32::from(self.read8(offset)),
            Width::W16 => u32::from(self.read16(offset)),
            Width::W32 => self.read32(offset),
        }
    }

    /// Write a register of the given width; excess bits are dropped.
    fn write(&mut self, offset: u32, width: Width, value: u32) {
        match width {
            Width::W8 => self.write8(offset, value as u8),
            Width::W16 => self.write16(offset, value as u16),
            Width::W32 => self.write32(offset, value),
        }
    }

    /// Write an 8-bit register twice.
    ///
    /// Slow ISA decoders may drop a write that closely follows a read of
    /// another register; the repeat guarantees the value has landed before
    /// any later access.
    fn write8_twice(&mut self, offset: u32, value: u8) {
        self.write8(offset, value);
        self.write8(offset, value);
    }
}

impl<R: RegisterIo + ?Sized> RegisterIo for Box<R> {
    fn read8(&mut self, offset: u32) -> u8 {
        (**self).read8(offset)
    }
    fn write8(&mut self, offset: u32, value: u8) {
        (**self).write8(offset, value)
    }
    fn read16(&mut self, offset: u32) -> u16 {
        (**self).read16(offset)
    }
    fn write16(&mut self, offset: u32, value: u16) {
        (**self).write16(offset, value)
    }
    fn read32(&mut self, offset: u32) -> u32 {
        (**self).read32(offset)
    }
    fn write32(&mut self, offset: u32, value: u32) {
        (**self).write32(offset, value)
    }
    fn write8_twice(&mut self, offset: u32, value: u8) {
        (**self).write8_twice(offset, value)
    }
}
