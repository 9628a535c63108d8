//! Memory-mapped register window over `/dev/mem`.

use cnc_common::hal::driver::HalError;
use cnc_common::hal::regs::RegisterIo;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::ptr;
use tracing::debug;

const PAGE_SIZE: u64 = 4096;

/// A physical register window mapped into this process.
pub struct MmioRegion {
    map: MmapMut,
    /// Offset of the board base inside the page-aligned mapping.
    start: usize,
    len: usize,
}

impl MmioRegion {
    /// Map `len` bytes of physical memory starting at `phys`.
    ///
    /// # Errors
    /// `MappingFailed` if `/dev/mem` cannot be opened or mapped.
    pub fn open(phys: u64, len: usize) -> Result<Self, HalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open("/dev/mem")
            .map_err(|e| HalError::MappingFailed(format!("open /dev/mem: {e}")))?;

        let page = phys & !(PAGE_SIZE - 1);
        let start = (phys - page) as usize;

        // SAFETY: the mapping is private to this region and the hardware
        // window is owned by exactly one driver for its lifetime.
        let map = unsafe {
            MmapOptions::new()
                .offset(page)
                .len(start + len)
                .map_mut(&file)
        }
        .map_err(|e| HalError::MappingFailed(format!("mmap {phys:#x}+{len:#x}: {e}")))?;

        debug!("Mapped {:#x} bytes of physical memory at {:#x}", len, phys);
        Ok(Self { map, start, len })
    }

    #[inline]
    fn ptr<T>(&mut self, offset: u32) -> *mut T {
        let offset = offset as usize;
        assert!(offset + size_of::<T>() <= self.len, "MMIO offset {offset:#x} outside window");
        // SAFETY: bounds checked above; the mapping outlives the pointer.
        unsafe { self.map.as_mut_ptr().add(self.start + offset).cast::<T>() }
    }
}

impl RegisterIo for MmioRegion {
    #[inline]
    fn read8(&mut self, offset: u32) -> u8 {
        // SAFETY: in-bounds, device memory requires volatile access.
        unsafe { ptr::read_volatile(self.ptr::<u8>(offset)) }
    }

    #[inline]
    fn write8(&mut self, offset: u32, value: u8) {
        // SAFETY: as above.
        unsafe { ptr::write_volatile(self.ptr::<u8>(offset), value) }
    }

    #[inline]
    fn read16(&mut self, offset: u32) -> u16 {
        // SAFETY: as above.
        unsafe { ptr::read_volatile(self.ptr::<u16>(offset)) }
    }

    #[inline]
    fn write16(&mut self, offset: u32, value: u16) {
        // SAFETY: as above.
        unsafe { ptr::write_volatile(self.ptr::<u16>(offset), value) }
    }

    #[inline]
    fn read32(&mut self, offset: u32) -> u32 {
        // SAFETY: as above.
        unsafe { ptr::read_volatile(self.ptr::<u32>(offset)) }
    }

    #[inline]
    fn write32(&mut self, offset: u32, value: u32) {
        // SAFETY: as above.
        unsafe { ptr::write_volatile(self.ptr::<u32>(offset), value) }
    }
}
