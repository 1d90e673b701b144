//! Per-PCH register layouts, control constants and matching device IDs.
//!
//! Offsets and ID lists are distilled from CHIPSEC's published per-SKU
//! platform configuration. Entries are pure data: nothing in here touches
//! hardware, and the rest of the crate treats a chosen descriptor as
//! immutable for the whole dump.

use crate::pci::PciAddress;

/// Number of 32-bit FDATA slot registers.
pub const FDATA_SLOTS: usize = 16;

/// Bytes one hardware cycle can move through the data slots.
pub const MAX_CYCLE_BYTES: usize = FDATA_SLOTS * 4;

/// How the SPIBAR physical base is obtained for one platform.
#[derive(Clone, Copy, Debug)]
pub struct BarLocation {
    /// Register-window device, when the base comes from config space.
    pub address: PciAddress,
    /// Config-space offset of the base address field.
    pub reg: u16,
    /// Width of that field in bytes: 4, or 8 for split low/high dwords.
    pub width: u8,
    /// Clears the low, non-address bits of the raw field.
    pub mask: u64,
    /// Added to the masked base.
    pub offset: u64,
    /// Bytes to map at the resolved base.
    pub size: u64,
    /// When set, the base is `fixed_address + offset` and no device lookup
    /// happens at all.
    pub fixed_address: Option<u64>,
}

/// Byte offsets of the flash controller registers inside the window.
#[derive(Clone, Copy, Debug)]
pub struct RegisterLayout {
    pub hsfs: u32,
    pub hsfc: u32,
    pub faddr: u32,
    pub fdata: [u32; FDATA_SLOTS],
}

/// Register selector, resolved against a layout at call sites instead of a
/// per-access name lookup.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FlashReg {
    Status,
    Control,
    Address,
    Data(u8),
}

impl RegisterLayout {
    pub fn offset(&self, reg: FlashReg) -> u32 {
        match reg {
            FlashReg::Status => self.hsfs,
            FlashReg::Control => self.hsfc,
            FlashReg::Address => self.faddr,
            FlashReg::Data(slot) => self.fdata[slot as usize],
        }
    }

    /// One past the last byte of the data-slot region.
    pub fn data_region_end(&self) -> u32 {
        self.fdata.iter().copied().max().unwrap_or(0) + 4
    }
}

/// Masks within the 8-bit status register.
#[derive(Clone, Copy, Debug)]
pub struct StatusBits {
    /// Cycle in progress ("busy").
    pub scip: u8,
    /// Cycle done.
    pub fdone: u8,
    /// Cycle error.
    pub fcerr: u8,
    /// Access error (alignment / permission).
    pub ael: u8,
    /// Write-one-to-clear mask acknowledging the three flags above.
    pub clear: u8,
}

#[derive(Clone, Copy, Debug)]
pub struct PlatformDescriptor {
    pub sku: &'static str,
    pub bar: BarLocation,
    pub regs: RegisterLayout,
    pub bits: StatusBits,
    /// Valid flash-address bits for the FADDR register.
    pub faddr_mask: u32,
    /// Control value that starts a read cycle.
    pub read_cycle: u8,
    pub device_ids: &'static [u16],
}

impl PlatformDescriptor {
    pub fn matches(&self, device_id: u16) -> bool {
        self.device_ids.contains(&device_id)
    }

    /// Catalog entries are static data; a malformed one is a bug in the
    /// table, not a runtime condition.
    pub fn is_well_formed(&self) -> bool {
        self.bar.size.is_power_of_two()
            && self.bar.size >= u64::from(self.regs.data_region_end())
            && self.bits.scip != 0
            && self.bits.clear != 0
    }
}

pub(crate) const STD_LAYOUT: RegisterLayout = RegisterLayout {
    hsfs: 0x04,
    hsfc: 0x06,
    faddr: 0x08,
    fdata: [
        0x10, 0x14, 0x18, 0x1C, 0x20, 0x24, 0x28, 0x2C,
        0x30, 0x34, 0x38, 0x3C, 0x40, 0x44, 0x48, 0x4C,
    ],
};

pub(crate) const STD_BITS: StatusBits = StatusBits {
    scip: 0x01,
    fdone: 0x02,
    fcerr: 0x04,
    ael: 0x20,
    clear: 0x07,
};

pub(crate) const FADDR_MASK: u32 = 0x07FF_FFFF;

static Q170_DIDS: &[u16] = &[
    0x9D43, 0x9D46, 0x9D48, 0xA143, 0xA144, 0xA145, 0xA146, 0xA147, 0xA148, 0xA149,
    0xA14A, 0xA14D, 0xA14E, 0xA150, 0xA151, 0xA152, 0xA153, 0xA154, 0xA155,
];

static AVN_DIDS: &[u16] = &[
    0x1F00, 0x1F01, 0x1F02, 0x1F03, 0x1F04, 0x1F05, 0x1F06, 0x1F07, 0x1F08, 0x1F09,
    0x1F0A, 0x1F0B, 0x1F0C, 0x1F0D, 0x1F0E, 0x1F0F,
];

static Q370_DIDS: &[u16] = &[
    0xA303, 0xA304, 0xA305, 0xA306, 0xA308, 0xA309, 0xA30A, 0xA30C, 0xA30D, 0xA30E,
];

/// Known platforms, scanned in order by the resolver.
pub static CATALOG: &[PlatformDescriptor] = &[
    PlatformDescriptor {
        sku: "PCH_Q170",
        bar: BarLocation {
            address: PciAddress { segment: 0, bus: 0, device: 31, function: 5 },
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
        device_ids: Q170_DIDS,
    },
    PlatformDescriptor {
        sku: "PCH_AVN",
        bar: BarLocation {
            address: PciAddress { segment: 0, bus: 0, device: 31, function: 0 },
            reg: 0x54,
            width: 4,
            mask: 0xFFFF_FFFF_FFFF_FE00,
            offset: 0,
            size: 0x200,
            fixed_address: None,
        },
        regs: STD_LAYOUT,
        bits: STD_BITS,
        faddr_mask: FADDR_MASK,
        read_cycle: 0x01,
        device_ids: AVN_DIDS,
    },
    PlatformDescriptor {
        sku: "PCH_Q370",
        bar: BarLocation {
            address: PciAddress { segment: 0, bus: 0, device: 31, function: 5 },
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
        device_ids: Q370_DIDS,
    },
];
