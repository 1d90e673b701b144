// SPDX-License-Identifier: MIT

//! Direct read of the firmware-shadowed flash window below 4 GiB.
//!
//! Firmware keeps the top of the flash decoded at the top of 32-bit address
//! space regardless of chipset identity, so a plain memory copy of that
//! window recovers the early flash contents even when the register protocol
//! is unusable. No registers, no polling, no error flags.

use log::{info, warn};

use crate::mapper::{Mapper, PhysicalAddress};
use crate::mmio::MappedWindow;
use crate::sink::Sink;
use crate::{DumpError, ReadRequest};

/// Physical base of the BIOS-shadowed flash image.
pub const FALLBACK_BASE: u64 = 0xFF00_0000;
/// The shadow covers the top 16 MiB below 4 GiB.
pub const FALLBACK_LEN: u64 = 0x0100_0000;

/// Copies `request` out of the shadow window into the sink.
///
/// An offset past the window is an error; a length overrunning it is
/// clamped, with a warning. Partial data beats a hard failure on this
/// already-degraded path.
pub fn run<M: Mapper, S: Sink>(
    mapper: &mut M,
    request: &ReadRequest,
    sink: &mut S,
) -> Result<u64, DumpError> {
    let mut position = request.offset;
    if position >= FALLBACK_LEN {
        return Err(DumpError::OffsetOutOfFallbackWindow(position));
    }

    let mut remaining = request.length;
    if remaining > FALLBACK_LEN - position {
        warn!(
            "clamping read to the shadow window: requested {:#x}, available {:#x}",
            remaining,
            FALLBACK_LEN - position
        );
        remaining = FALLBACK_LEN - position;
    }

    let page_size = mapper.page_size();
    let window = unsafe {
        MappedWindow::map(mapper, PhysicalAddress(FALLBACK_BASE), FALLBACK_LEN as usize)
    }?;
    info!(
        "using BIOS-shadowed window at {:#x} (len {:#x})",
        FALLBACK_BASE, FALLBACK_LEN
    );

    let mut buf = vec![0u8; page_size];
    let mut written = 0u64;
    while remaining > 0 {
        let chunk = remaining.min(page_size as u64) as usize;
        window.copy_into(position as usize, &mut buf[..chunk]);
        sink.write_all(&buf[..chunk]).map_err(DumpError::SinkWriteFailed)?;

        position += chunk as u64;
        remaining -= chunk as u64;
        written += chunk as u64;
    }

    Ok(written)
}
