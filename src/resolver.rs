// SPDX-License-Identifier: MIT

//! Selecting the catalog entry that matches the running platform.

use log::{info, warn};

use crate::catalog::PlatformDescriptor;
use crate::pci::PciBus;
use crate::DumpError;

/// Picks the descriptor whose device-ID set contains the ISA bridge's device
/// ID *and* whose register-window device is actually present. Presence on
/// the bus is authoritative: a textual match with an absent device keeps the
/// scan going instead of ending it.
///
/// The returned function is `None` for descriptors with a fixed window
/// address, which need no device at all.
pub fn resolve<'c, B: PciBus>(
    catalog: &'c [PlatformDescriptor],
    bus: &B,
) -> Result<(&'c PlatformDescriptor, Option<B::Function>), DumpError> {
    let device_id = bus.isa_bridge_device_id()?;

    for descriptor in catalog {
        if !descriptor.matches(device_id) {
            continue;
        }

        if descriptor.bar.fixed_address.is_some() {
            info!(
                "matched platform {} by ISA bridge DID {:#06x} (fixed window address)",
                descriptor.sku, device_id
            );
            return Ok((descriptor, None));
        }

        match bus.open(descriptor.bar.address) {
            Ok(function) => {
                info!(
                    "matched platform {} by ISA bridge DID {:#06x}; SPI device at {}",
                    descriptor.sku, device_id, descriptor.bar.address
                );
                return Ok((descriptor, Some(function)));
            }
            Err(_) => {
                warn!(
                    "platform {} matches DID {:#06x}, but SPI device {} is not present",
                    descriptor.sku, device_id, descriptor.bar.address
                );
            }
        }
    }

    warn!("no matching platform for ISA bridge DID {:#06x}", device_id);
    Err(DumpError::NoMatchingPlatform(device_id))
}
