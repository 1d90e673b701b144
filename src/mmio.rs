// SPDX-License-Identifier: MIT

//! Volatile access to a mapped register window.

use core::ptr;

use log::warn;

use crate::mapper::{Mapper, PhysicalAddress, VirtualAddress};
use crate::DumpError;

/// Byte-offset addressed register access.
///
/// Every call is a device side effect, not a pure load or store: reads may
/// clear hardware state and writes may trigger cycles, so accesses must not
/// be reordered or coalesced by callers.
pub trait RegionIo {
    fn read8(&mut self, offset: u32) -> u8;
    fn read16(&mut self, offset: u32) -> u16;
    fn read32(&mut self, offset: u32) -> u32;
    fn write8(&mut self, offset: u32, value: u8);
    fn write16(&mut self, offset: u32, value: u16);
    fn write32(&mut self, offset: u32, value: u32);
}

/// A fixed-length window of device registers, mapped for the lifetime of the
/// borrow of its mapper and unmapped on drop, on every exit path.
pub struct MappedWindow<'a, M: Mapper> {
    mapper: &'a mut M,
    virt: VirtualAddress,
    size: usize,
}

impl<'a, M: Mapper> MappedWindow<'a, M> {
    /// # Safety
    /// `base` must be a device register range (or otherwise side-effect-free
    /// physical memory) that nothing else in this process is accessing.
    pub unsafe fn map(
        mapper: &'a mut M,
        base: PhysicalAddress,
        size: usize,
    ) -> Result<Self, DumpError> {
        let virt = unsafe { mapper.map(base, size) }.map_err(DumpError::MapFailed)?;
        Ok(Self { mapper, virt, size })
    }

    fn addr(&self, offset: u32, width: usize) -> usize {
        let offset = offset as usize;
        assert!(offset + width <= self.size, "register access out of window");
        let addr = self.virt.0 + offset;
        assert!(addr % width == 0, "misaligned register access");
        addr
    }

    /// Bulk copy out of the window, for ranges that are plain shadowed
    /// memory rather than registers.
    pub fn copy_into(&self, offset: usize, buf: &mut [u8]) {
        assert!(offset + buf.len() <= self.size, "copy out of window");
        unsafe {
            ptr::copy_nonoverlapping(
                (self.virt.0 + offset) as *const u8,
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
    }
}

impl<M: Mapper> RegionIo for MappedWindow<'_, M> {
    fn read8(&mut self, offset: u32) -> u8 {
        unsafe { ptr::read_volatile(self.addr(offset, 1) as *const u8) }
    }

    fn read16(&mut self, offset: u32) -> u16 {
        unsafe { ptr::read_volatile(self.addr(offset, 2) as *const u16) }
    }

    fn read32(&mut self, offset: u32) -> u32 {
        unsafe { ptr::read_volatile(self.addr(offset, 4) as *const u32) }
    }

    fn write8(&mut self, offset: u32, value: u8) {
        unsafe { ptr::write_volatile(self.addr(offset, 1) as *mut u8, value) }
    }

    fn write16(&mut self, offset: u32, value: u16) {
        unsafe { ptr::write_volatile(self.addr(offset, 2) as *mut u16, value) }
    }

    fn write32(&mut self, offset: u32, value: u32) {
        unsafe { ptr::write_volatile(self.addr(offset, 4) as *mut u32, value) }
    }
}

impl<M: Mapper> Drop for MappedWindow<'_, M> {
    fn drop(&mut self) {
        if unsafe { self.mapper.unmap(self.virt, self.size) }.is_err() {
            warn!("failed to unmap register window at {:#x}", self.virt.0);
        }
    }
}
