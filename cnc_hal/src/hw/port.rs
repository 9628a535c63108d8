//! x86 I/O-port register window.
//!
//! Access is granted per port range with `ioperm(2)` at open and revoked on
//! drop. On targets without an I/O port space `open` fails with
//! `MappingFailed`.

use cnc_common::hal::driver::HalError;
use cnc_common::hal::regs::RegisterIo;
use tracing::{debug, warn};

/// A range of I/O ports owned by one board.
#[derive(Debug)]
pub struct PortIo {
    base: u16,
    span: u16,
}

impl PortIo {
    /// Request access to `span` ports starting at `base`.
    ///
    /// # Errors
    /// `MappingFailed` if the range does not fit the port space or the
    /// kernel refuses access (usually missing `CAP_SYS_RAWIO`).
    pub fn open(base: u64, span: u16) -> Result<Self, HalError> {
        let base = u16::try_from(base)
            .ok()
            .filter(|b| b.checked_add(span).is_some())
            .ok_or_else(|| {
                HalError::MappingFailed(format!("port range {base:#x}+{span} out of range"))
            })?;
        raw::grant(base, span, true)?;
        debug!("Granted I/O ports {:#x}..{:#x}", base, base + span);
        Ok(Self { base, span })
    }

    #[inline]
    fn port(&self, offset: u32) -> u16 {
        debug_assert!(offset < u32::from(self.span));
        self.base.wrapping_add(offset as u16)
    }
}

impl Drop for PortIo {
    fn drop(&mut self) {
        if let Err(e) = raw::grant(self.base, self.span, false) {
            warn!("Failed to release I/O ports {:#x}: {}", self.base, e);
        }
    }
}

impl RegisterIo for PortIo {
    #[inline]
    fn read8(&mut self, offset: u32) -> u8 {
        // SAFETY: the range was granted to this process in `open`.
        unsafe { raw::inb(self.port(offset)) }
    }

    #[inline]
    fn write8(&mut self, offset: u32, value: u8) {
        // SAFETY: as above.
        unsafe { raw::outb(self.port(offset), value) }
    }

    #[inline]
    fn read16(&mut self, offset: u32) -> u16 {
        // SAFETY: as above.
        unsafe { raw::inw(self.port(offset)) }
    }

    #[inline]
    fn write16(&mut self, offset: u32, value: u16) {
        // SAFETY: as above.
        unsafe { raw::outw(self.port(offset), value) }
    }

    #[inline]
    fn read32(&mut self, offset: u32) -> u32 {
        // SAFETY: as above.
        unsafe { raw::inl(self.port(offset)) }
    }

    #[inline]
    fn write32(&mut self, offset: u32, value: u32) {
        // SAFETY: as above.
        unsafe { raw::outl(self.port(offset), value) }
    }
}

#[cfg(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64")))]
mod raw {
    use cnc_common::hal::driver::HalError;
    use core::arch::asm;

    pub fn grant(base: u16, span: u16, on: bool) -> Result<(), HalError> {
        // SAFETY: ioperm only changes this process's port permission bitmap.
        let rc = unsafe {
            libc::ioperm(
                libc::c_ulong::from(base),
                libc::c_ulong::from(span),
                libc::c_int::from(on),
            )
        };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            return Err(HalError::MappingFailed(format!(
                "ioperm({base:#x}, {span}) failed: {err}"
            )));
        }
        Ok(())
    }

    pub unsafe fn inb(port: u16) -> u8 {
        let value: u8;
        unsafe { asm!("in al, dx", out("al") value, in("dx") port, options(nomem, nostack, preserves_flags)) };
        value
    }

    pub unsafe fn outb(port: u16, value: u8) {
        unsafe { asm!("out dx, al", in("dx") port, in("al") value, options(nomem, nostack, preserves_flags)) };
    }

    pub unsafe fn inw(port: u16) -> u16 {
        let value: u16;
        unsafe { asm!("in ax, dx", out("ax") value, in("dx") port, options(nomem, nostack, preserves_flags)) };
        value
    }

    pub unsafe fn outw(port: u16, value: u16) {
        unsafe { asm!("out dx, ax", in("dx") port, in("ax") value, options(nomem, nostack, preserves_flags)) };
    }

    pub unsafe fn inl(port: u16) -> u32 {
        let value: u32;
        unsafe { asm!("in eax, dx", out("eax") value, in("dx") port, options(nomem, nostack, preserves_flags)) };
        value
    }

    pub unsafe fn outl(port: u16, value: u32) {
        unsafe { asm!("out dx, eax", in("dx") port, in("eax") value, options(nomem, nostack, preserves_flags)) };
    }
}

#[cfg(not(all(target_os = "linux", any(target_arch = "x86", target_arch = "x86_64"))))]
mod raw {
    use cnc_common::hal::driver::HalError;

    pub fn grant(base: u16, _span: u16, _on: bool) -> Result<(), HalError> {
        Err(HalError::MappingFailed(format!(
            "no I/O port space on this target (port {base:#x})"
        )))
    }

    // Unreachable: `open` never succeeds on these targets.
    pub unsafe fn inb(_port: u16) -> u8 {
        0xFF
    }
    pub unsafe fn outb(_port: u16, _value: u8) {}
    pub unsafe fn inw(_port: u16) -> u16 {
        0xFFFF
    }
    pub unsafe fn outw(_port: u16, _value: u16) {}
    pub unsafe fn inl(_port: u16) -> u32 {
        0xFFFF_FFFF
    }
    pub unsafe fn outl(_port: u16, _value: u32) {}
}
