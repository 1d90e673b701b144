// SPDX-License-Identifier: MIT

//! PCI configuration access through sysfs.
//!
//! The identification device (the ISA bridge) and the SPI register-window
//! device are both reached through `/sys/bus/pci/devices`. Holding a
//! function's config file open keeps a reference to the device for as long
//! as the caller needs it; dropping the handle releases it.

use std::fmt;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};

use crate::DumpError;

const SYSFS_PCI_DEVICES: &str = "/sys/bus/pci/devices";

/// Config-space offset of the command register.
pub const PCI_COMMAND: u16 = 0x04;

/// Base/sub class of an ISA bridge.
const PCI_CLASS_BRIDGE_ISA: u32 = 0x0601;

bitflags! {
    /// PCI command register bits.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct PciCommand: u16 {
        const IO_SPACE = 1 << 0;
        const MEMORY_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PciAddress {
    pub segment: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{:x}",
            self.segment, self.bus, self.device, self.function
        )
    }
}

/// Locating devices by address-space coordinates.
pub trait PciBus {
    type Function: PciFunction;

    /// Device ID of the platform's ISA bridge, the fixed identification
    /// device all catalog matching keys on.
    fn isa_bridge_device_id(&self) -> Result<u16, DumpError>;

    fn open(&self, address: PciAddress) -> Result<Self::Function, DumpError>;
}

/// One opened PCI function.
pub trait PciFunction {
    fn address(&self) -> PciAddress;

    /// Little-endian 32-bit read from config space.
    fn read_config32(&mut self, offset: u16) -> Result<u32, DumpError>;

    fn read_config16(&mut self, offset: u16) -> Result<u16, DumpError>;

    /// Brings the function up; a no-op when it is already enabled.
    fn enable(&mut self) -> Result<(), DumpError>;
}

pub struct SysfsBus;

impl SysfsBus {
    fn device_dir(address: PciAddress) -> String {
        format!("{}/{}", SYSFS_PCI_DEVICES, address)
    }
}

impl PciBus for SysfsBus {
    type Function = SysfsFunction;

    fn isa_bridge_device_id(&self) -> Result<u16, DumpError> {
        let entries =
            fs::read_dir(SYSFS_PCI_DEVICES).map_err(|_| DumpError::IdentityDeviceNotFound)?;
        for entry in entries.flatten() {
            let Some(class) = read_hex_attr(&entry.path().join("class")) else {
                continue;
            };
            // class reads as 0xBBSSPP (base/sub/interface).
            if (class >> 8) as u32 != PCI_CLASS_BRIDGE_ISA {
                continue;
            }
            if let Some(device_id) = read_hex_attr(&entry.path().join("device")) {
                return Ok(device_id as u16);
            }
        }
        Err(DumpError::IdentityDeviceNotFound)
    }

    fn open(&self, address: PciAddress) -> Result<SysfsFunction, DumpError> {
        let config = File::open(format!("{}/config", Self::device_dir(address)))
            .map_err(|_| DumpError::DeviceNotFound(address))?;
        Ok(SysfsFunction { address, config })
    }
}

/// Keeps the config file handle open so the device stays referenced until
/// the function is dropped.
pub struct SysfsFunction {
    address: PciAddress,
    config: File,
}

impl SysfsFunction {
    fn read_config_bytes(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), DumpError> {
        self.config
            .seek(SeekFrom::Start(u64::from(offset)))
            .and_then(|_| self.config.read_exact(buf))
            .map_err(|_| DumpError::DeviceNotFound(self.address))
    }
}

impl PciFunction for SysfsFunction {
    fn address(&self) -> PciAddress {
        self.address
    }

    fn read_config32(&mut self, offset: u16) -> Result<u32, DumpError> {
        let mut buf = [0u8; 4];
        self.read_config_bytes(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_config16(&mut self, offset: u16) -> Result<u16, DumpError> {
        let mut buf = [0u8; 2];
        self.read_config_bytes(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn enable(&mut self) -> Result<(), DumpError> {
        let command = PciCommand::from_bits_truncate(self.read_config16(PCI_COMMAND)?);
        if command.contains(PciCommand::MEMORY_SPACE) {
            return Ok(());
        }
        // The sysfs attribute runs the kernel's full bring-up.
        fs::write(format!("{}/enable", SysfsBus::device_dir(self.address)), "1")
            .map_err(DumpError::DeviceEnableFailed)
    }
}

fn read_hex_attr(path: &std::path::Path) -> Option<u64> {
    let text = fs::read_to_string(path).ok()?;
    parse_hex(&text)
}

fn parse_hex(text: &str) -> Option<u64> {
    let text = text.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    u64::from_str_radix(text, 16).ok()
}
