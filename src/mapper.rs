//! Mapping physical register windows into the process address space.

use core::ptr;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct PhysicalAddress(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct VirtualAddress(pub usize);

/// Maps physical ranges at page granularity. `map`/`unmap` take care of the
/// alignment bookkeeping so callers can ask for windows that start inside a
/// page (the SPIBAR base is only guaranteed to be window-size aligned).
pub trait Mapper {
    /// # Safety
    /// `address` and `size` must be page aligned and refer to a range the
    /// caller is allowed to access as plain memory.
    unsafe fn map_aligned(
        &mut self,
        address: PhysicalAddress,
        size: usize,
    ) -> Result<VirtualAddress, &'static str>;

    /// # Safety
    /// `address` must come from `map_aligned` with the same aligned `size`,
    /// and must not be accessed afterwards.
    unsafe fn unmap_aligned(
        &mut self,
        address: VirtualAddress,
        size: usize,
    ) -> Result<(), &'static str>;

    fn page_size(&self) -> usize;

    /// # Safety
    /// As `map_aligned`, minus the alignment requirement.
    unsafe fn map(
        &mut self,
        address: PhysicalAddress,
        size: usize,
    ) -> Result<VirtualAddress, &'static str> {
        let page_size = self.page_size() as u64;
        let page = address.0 / page_size;
        let aligned_address = PhysicalAddress(page * page_size);
        let offset = (address.0 - aligned_address.0) as usize;
        let pages = (offset + size + page_size as usize - 1) / page_size as usize;
        let aligned_size = pages * page_size as usize;
        let virtual_address = unsafe { self.map_aligned(aligned_address, aligned_size)? };
        Ok(VirtualAddress(virtual_address.0 + offset))
    }

    /// # Safety
    /// As `unmap_aligned`, minus the alignment requirement.
    unsafe fn unmap(&mut self, address: VirtualAddress, size: usize) -> Result<(), &'static str> {
        let page_size = self.page_size();
        let page = address.0 / page_size;
        let aligned_address = VirtualAddress(page * page_size);
        let offset = address.0 - aligned_address.0;
        let pages = (offset + size + page_size - 1) / page_size;
        let aligned_size = pages * page_size;
        unsafe { self.unmap_aligned(aligned_address, aligned_size) }
    }
}

/// `Mapper` backed by `/dev/mem`. Requires a process privileged enough to
/// open it read-write; the file descriptor is not kept across calls, the
/// mapping itself pins the range.
pub struct DevMem;

impl Mapper for DevMem {
    unsafe fn map_aligned(
        &mut self,
        address: PhysicalAddress,
        size: usize,
    ) -> Result<VirtualAddress, &'static str> {
        let fd = unsafe {
            libc::open(b"/dev/mem\0".as_ptr() as *const libc::c_char, libc::O_RDWR)
        };
        if fd < 0 {
            return Err("failed to open /dev/mem");
        }

        let p = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                address.0 as libc::off_t,
            )
        };

        unsafe { libc::close(fd) };

        if p == libc::MAP_FAILED {
            return Err("failed to map /dev/mem");
        }

        Ok(VirtualAddress(p as usize))
    }

    unsafe fn unmap_aligned(
        &mut self,
        address: VirtualAddress,
        size: usize,
    ) -> Result<(), &'static str> {
        if unsafe { libc::munmap(address.0 as *mut libc::c_void, size) } != 0 {
            return Err("failed to unmap /dev/mem");
        }
        Ok(())
    }

    fn page_size(&self) -> usize {
        unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
    }
}
