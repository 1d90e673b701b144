//! Test doubles: a register-level model of the flash controller, a mapper
//! backed by heap buffers, and a canned PCI bus.

use crate::catalog::{
    BarLocation, PlatformDescriptor, FADDR_MASK, MAX_CYCLE_BYTES, STD_BITS, STD_LAYOUT,
};
use crate::mapper::{Mapper, PhysicalAddress, VirtualAddress};
use crate::mmio::RegionIo;
use crate::pci::{PciAddress, PciBus, PciFunction};
use crate::DumpError;

pub const SPI_00_1F_5: PciAddress = PciAddress { segment: 0, bus: 0, device: 31, function: 5 };

/// Descriptor with the standard layout, for tests that need to vary the
/// location or ID set without touching the shipped catalog.
pub fn test_descriptor(
    sku: &'static str,
    address: PciAddress,
    device_ids: &'static [u16],
) -> PlatformDescriptor {
    PlatformDescriptor {
        sku,
        bar: BarLocation {
            address,
            reg: 0x10,
            width: 4,
            mask: 0xFFFF_F000,
            offset: 0,
            size: 0x1000,
            fixed_address: None,
        },
        regs: STD_LAYOUT,
        bits: STD_BITS,
        faddr_mask: FADDR_MASK,
        read_cycle: 0x01,
        device_ids,
    }
}

/// Behavioral model of the hardware sequencing registers: programming FADDR
/// and the byte count then setting the go bit copies from a backing flash
/// image into the FDATA slots, with configurable busy and error behavior.
pub struct FakeSpi {
    flash: Vec<u8>,
    hsfs: u8,
    faddr: u32,
    byte_count: u8,
    fdata: [u8; MAX_CYCLE_BYTES],
    /// Every `(address, length)` cycle that was triggered, in order.
    pub cycles: Vec<(u32, usize)>,
    /// Status reads reporting busy after each trigger.
    pub busy_reads_per_cycle: u32,
    busy_remaining: u32,
    /// Busy bit never clears.
    pub stuck_busy: bool,
    /// Status bits that survive every acknowledge write.
    pub stuck_bits: u8,
    /// Values served verbatim by the next status reads.
    pub status_overrides: Vec<u8>,
    /// Sets a stuck error flag once this many cycles have run.
    pub fail_after_cycles: Option<usize>,
}

impl FakeSpi {
    pub fn new(flash: Vec<u8>) -> Self {
        Self {
            flash,
            // Leftover done flag, like hardware after a firmware read.
            hsfs: STD_BITS.fdone,
            faddr: 0,
            byte_count: 0,
            fdata: [0; MAX_CYCLE_BYTES],
            cycles: Vec::new(),
            busy_reads_per_cycle: 0,
            busy_remaining: 0,
            stuck_busy: false,
            stuck_bits: 0,
            status_overrides: Vec::new(),
            fail_after_cycles: None,
        }
    }

    fn trigger(&mut self) {
        let length = self.byte_count as usize + 1;
        let start = (self.faddr as usize).min(self.flash.len());
        let end = (start + length).min(self.flash.len());
        self.fdata = [0; MAX_CYCLE_BYTES];
        self.fdata[..end - start].copy_from_slice(&self.flash[start..end]);
        self.cycles.push((self.faddr, length));
        if let Some(limit) = self.fail_after_cycles {
            if self.cycles.len() > limit {
                self.stuck_bits |= STD_BITS.fcerr;
            }
        }
        self.hsfs |= STD_BITS.fdone;
        self.busy_remaining = self.busy_reads_per_cycle;
    }
}

impl RegionIo for FakeSpi {
    fn read8(&mut self, offset: u32) -> u8 {
        assert_eq!(offset, STD_LAYOUT.hsfs, "unexpected 8-bit read at {:#x}", offset);
        if !self.status_overrides.is_empty() {
            return self.status_overrides.remove(0);
        }
        if self.stuck_busy {
            return self.hsfs | STD_BITS.scip;
        }
        if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            return self.hsfs | STD_BITS.scip;
        }
        self.hsfs
    }

    fn read16(&mut self, offset: u32) -> u16 {
        unreachable!("16-bit read at {:#x} not modeled", offset);
    }

    fn read32(&mut self, offset: u32) -> u32 {
        let slot = STD_LAYOUT
            .fdata
            .iter()
            .position(|&fdata| fdata == offset)
            .unwrap_or_else(|| panic!("unexpected 32-bit read at {:#x}", offset));
        let bytes = &self.fdata[slot * 4..slot * 4 + 4];
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn write8(&mut self, offset: u32, value: u8) {
        if offset == STD_LAYOUT.hsfs {
            // W1C acknowledge; stuck bits reassert themselves.
            self.hsfs = (self.hsfs & !value) | self.stuck_bits;
        } else if offset == STD_LAYOUT.hsfc {
            if value & 0x01 != 0 {
                self.trigger();
            }
        } else if offset == STD_LAYOUT.hsfc + 1 {
            self.byte_count = value;
        } else {
            panic!("unexpected 8-bit write at {:#x}", offset);
        }
    }

    fn write16(&mut self, offset: u32, _value: u16) {
        unreachable!("16-bit write at {:#x} not modeled", offset);
    }

    fn write32(&mut self, offset: u32, value: u32) {
        assert_eq!(offset, STD_LAYOUT.faddr, "unexpected 32-bit write at {:#x}", offset);
        self.faddr = value;
    }
}

/// `Mapper` handing out pointers into heap-backed regions. Backing storage
/// is word-sized so 32-bit register accesses stay aligned.
pub struct MockMapper {
    regions: Vec<(u64, Vec<u32>)>,
    maps: usize,
    unmaps: usize,
}

impl MockMapper {
    pub fn new() -> Self {
        Self { regions: Vec::new(), maps: 0, unmaps: 0 }
    }

    pub fn add_region(&mut self, base: u64, size: usize) {
        assert_eq!(base % 4096, 0);
        assert_eq!(size % 4, 0);
        self.regions.push((base, vec![0u32; size / 4]));
    }

    pub fn fill_region(&mut self, base: u64, pattern: impl Fn(usize) -> u8) {
        let (_, words) = self
            .regions
            .iter_mut()
            .find(|(region_base, _)| *region_base == base)
            .expect("no such region");
        for index in 0..words.len() * 4 {
            set_byte(words, index, pattern(index));
        }
    }

    pub fn write_region_byte(&mut self, base: u64, offset: usize, value: u8) {
        let (_, words) = self
            .regions
            .iter_mut()
            .find(|(region_base, _)| *region_base == base)
            .expect("no such region");
        set_byte(words, offset, value);
    }

    pub fn maps(&self) -> usize {
        self.maps
    }

    pub fn unmaps(&self) -> usize {
        self.unmaps
    }
}

fn set_byte(words: &mut [u32], index: usize, value: u8) {
    let shift = (index % 4) * 8;
    let word = &mut words[index / 4];
    *word = (*word & !(0xFF << shift)) | (u32::from(value) << shift);
}

impl Mapper for MockMapper {
    unsafe fn map_aligned(
        &mut self,
        address: PhysicalAddress,
        size: usize,
    ) -> Result<VirtualAddress, &'static str> {
        for (base, words) in &self.regions {
            let end = base + (words.len() * 4) as u64;
            if address.0 >= *base && address.0 + size as u64 <= end {
                self.maps += 1;
                let delta = (address.0 - base) as usize;
                return Ok(VirtualAddress(words.as_ptr() as usize + delta));
            }
        }
        Err("no region covers the requested range")
    }

    unsafe fn unmap_aligned(
        &mut self,
        _address: VirtualAddress,
        _size: usize,
    ) -> Result<(), &'static str> {
        self.unmaps += 1;
        Ok(())
    }

    fn page_size(&self) -> usize {
        4096
    }
}

/// Canned PCI bus: a fixed ISA bridge identity and a set of functions with
/// preloaded config dwords.
pub struct MockBus {
    identity: Option<u16>,
    functions: Vec<(PciAddress, Vec<(u16, u32)>)>,
}

impl MockBus {
    pub fn new(identity: Option<u16>) -> Self {
        Self { identity, functions: Vec::new() }
    }

    pub fn add_function(&mut self, address: PciAddress, config: &[(u16, u32)]) {
        self.functions.push((address, config.to_vec()));
    }
}

impl PciBus for MockBus {
    type Function = MockFunction;

    fn isa_bridge_device_id(&self) -> Result<u16, DumpError> {
        self.identity.ok_or(DumpError::IdentityDeviceNotFound)
    }

    fn open(&self, address: PciAddress) -> Result<MockFunction, DumpError> {
        let (_, config) = self
            .functions
            .iter()
            .find(|(function_address, _)| *function_address == address)
            .ok_or(DumpError::DeviceNotFound(address))?;
        let mut function = MockFunction::new(address);
        for &(offset, value) in config {
            function.set_config32(offset, value);
        }
        Ok(function)
    }
}

pub struct MockFunction {
    address: PciAddress,
    config: Vec<u8>,
    enabled: bool,
}

impl MockFunction {
    pub fn new(address: PciAddress) -> Self {
        Self { address, config: vec![0; 256], enabled: false }
    }

    pub fn set_config32(&mut self, offset: u16, value: u32) {
        let offset = offset as usize;
        self.config[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }
}

impl PciFunction for MockFunction {
    fn address(&self) -> PciAddress {
        self.address
    }

    fn read_config32(&mut self, offset: u16) -> Result<u32, DumpError> {
        let offset = offset as usize;
        let bytes = &self.config[offset..offset + 4];
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_config16(&mut self, offset: u16) -> Result<u16, DumpError> {
        let offset = offset as usize;
        Ok(u16::from_le_bytes([self.config[offset], self.config[offset + 1]]))
    }

    fn enable(&mut self) -> Result<(), DumpError> {
        self.enabled = true;
        Ok(())
    }
}
