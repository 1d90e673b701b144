// SPDX-License-Identifier: MIT

//! Resolving and mapping the SPI register window.

use log::info;

use crate::catalog::PlatformDescriptor;
use crate::mapper::{Mapper, PhysicalAddress};
use crate::mmio::MappedWindow;
use crate::pci::PciFunction;
use crate::DumpError;

/// Physical base of the register window.
///
/// Either the descriptor carries a fixed address, or the base is read out of
/// the register-window device's config space: enable the device if needed,
/// read the base-address field (two dwords combined for 8-byte fields), mask
/// off the low non-address bits and apply the descriptor's offset.
pub fn resolve_base<F: PciFunction>(
    descriptor: &PlatformDescriptor,
    function: Option<&mut F>,
) -> Result<u64, DumpError> {
    let bar = &descriptor.bar;

    if let Some(fixed) = bar.fixed_address {
        return Ok(fixed + bar.offset);
    }

    let function = function.ok_or(DumpError::DeviceNotFound(bar.address))?;
    function.enable()?;

    let low = function.read_config32(bar.reg)?;
    let raw = if bar.width == 8 {
        let high = function.read_config32(bar.reg + 4)?;
        (u64::from(high) << 32) | u64::from(low)
    } else {
        u64::from(low)
    };

    Ok((raw & bar.mask) + bar.offset)
}

/// Maps exactly `bar.size` bytes at the resolved base.
pub fn map<'m, M: Mapper>(
    mapper: &'m mut M,
    base: u64,
    descriptor: &PlatformDescriptor,
) -> Result<MappedWindow<'m, M>, DumpError> {
    let window =
        unsafe { MappedWindow::map(mapper, PhysicalAddress(base), descriptor.bar.size as usize) }?;
    info!(
        "{}: register window mapped at {:#x} (len {:#x})",
        descriptor.sku, base, descriptor.bar.size
    );
    Ok(window)
}
