//! Read-only dump of the SPI flash behind an Intel PCH.
//!
//! The flash is read through the chipset's hardware sequencing registers: a
//! small register window (SPIBAR) is located through PCI configuration space,
//! mapped, and then driven through repeated program/poll/acknowledge cycles
//! that move up to 64 bytes of flash data per cycle into the FDATA slot
//! registers. When that path is unavailable, or the window fails a sanity
//! check, the dump falls back to a straight copy of the BIOS-shadowed flash
//! image below 4 GiB.
//!
//! The register window is assumed to have a single exclusive accessor for
//! the duration of a dump; nothing here defends against another agent
//! reprogramming the same registers concurrently.

#[macro_use]
extern crate bitflags;

use std::error;
use std::fmt;
use std::io;

pub use self::catalog::{PlatformDescriptor, CATALOG, MAX_CYCLE_BYTES};
pub mod catalog;

pub use self::cycle::CycleEngine;
pub mod cycle;

pub use self::dump::dump;
pub mod dump;

pub mod fallback;

pub use self::mapper::{DevMem, Mapper, PhysicalAddress, VirtualAddress};
pub mod mapper;

pub use self::mmio::{MappedWindow, RegionIo};
pub mod mmio;

pub use self::pci::{PciAddress, PciBus, PciFunction, SysfsBus};
pub mod pci;

pub mod resolver;

pub use self::sink::Sink;
pub mod sink;

pub mod transfer;
pub mod window;

#[cfg(test)]
mod mock;

/// One read operation: `length` bytes starting at flash byte `offset`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ReadRequest {
    pub offset: u64,
    pub length: u64,
}

impl ReadRequest {
    /// Returns `None` when `offset + length` overflows.
    pub fn new(offset: u64, length: u64) -> Option<Self> {
        offset.checked_add(length)?;
        Some(Self { offset, length })
    }
}

#[derive(Debug)]
pub enum DumpError {
    /// No catalog entry matched the ISA bridge device ID, or every match
    /// lacked its register-window device on the bus.
    NoMatchingPlatform(u16),
    /// The ISA bridge (PCI class 0x0601) could not be located.
    IdentityDeviceNotFound,
    DeviceNotFound(pci::PciAddress),
    DeviceEnableFailed(io::Error),
    MapFailed(&'static str),
    /// Two consecutive status reads came back all-zero or all-ones.
    SanityCheckFailed(u8, u8),
    CycleTimeout,
    /// Error or alignment-error flag still set after the acknowledge write.
    CycleError(u8),
    OffsetOutOfFallbackWindow(u64),
    SinkWriteFailed(io::Error),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatchingPlatform(did) => {
                write!(f, "no known platform matches ISA bridge device ID {:#06x}", did)
            }
            Self::IdentityDeviceNotFound => write!(f, "ISA bridge (class 0x0601) not found"),
            Self::DeviceNotFound(address) => write!(f, "PCI device {} not present", address),
            Self::DeviceEnableFailed(err) => write!(f, "failed to enable PCI device: {}", err),
            Self::MapFailed(msg) => write!(f, "physical mapping failed: {}", msg),
            Self::SanityCheckFailed(first, second) => {
                write!(f, "status register stuck at {:#04x}/{:#04x}", first, second)
            }
            Self::CycleTimeout => write!(f, "flash cycle did not complete in time"),
            Self::CycleError(hsfs) => {
                write!(f, "flash cycle finished with error status {:#04x}", hsfs)
            }
            Self::OffsetOutOfFallbackWindow(offset) => {
                write!(f, "offset {:#x} is beyond the shadowed flash window", offset)
            }
            Self::SinkWriteFailed(err) => write!(f, "writing to the output sink failed: {}", err),
        }
    }
}

impl error::Error for DumpError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::DeviceEnableFailed(err) | Self::SinkWriteFailed(err) => Some(err),
            _ => None,
        }
    }
}
