// SPDX-License-Identifier: MIT

//! Chunked transfer of an arbitrary-length read through the cycle engine.

use crate::catalog::{FlashReg, PlatformDescriptor, MAX_CYCLE_BYTES};
use crate::cycle::CycleEngine;
use crate::mmio::RegionIo;
use crate::sink::Sink;
use crate::{DumpError, ReadRequest};

/// Two identical all-zero or all-one status reads mean the window is not
/// decoding to the controller at all; a stuck bus floats to one of these
/// two patterns.
pub fn sanity_probe<W: RegionIo>(
    window: &mut W,
    descriptor: &PlatformDescriptor,
) -> Result<(), DumpError> {
    let offset = descriptor.regs.offset(FlashReg::Status);
    let first = window.read8(offset);
    let second = window.read8(offset);
    if (first == 0x00 && second == 0x00) || (first == 0xFF && second == 0xFF) {
        return Err(DumpError::SanityCheckFailed(first, second));
    }
    Ok(())
}

/// Reads `request.length` bytes starting at `request.offset` into the sink,
/// at most [`MAX_CYCLE_BYTES`] per cycle, in strictly ascending offset
/// order. The first cycle failure propagates unchanged; there is no
/// per-chunk retry. Returns the number of bytes written.
pub fn run<W: RegionIo, S: Sink>(
    window: &mut W,
    descriptor: &PlatformDescriptor,
    request: &ReadRequest,
    sink: &mut S,
) -> Result<u64, DumpError> {
    sanity_probe(window, descriptor)?;

    let mut engine = CycleEngine::new(window, descriptor);
    // A cycle left in flight by firmware has to drain before the first
    // program.
    engine.wait_idle()?;

    let mut remaining = request.length;
    let mut position = request.offset;
    let mut written = 0u64;
    let mut buf = [0u8; MAX_CYCLE_BYTES];

    while remaining > 0 {
        let chunk = remaining.min(MAX_CYCLE_BYTES as u64) as usize;
        engine.read_cycle(position as u32, chunk)?;
        engine.drain(&mut buf[..chunk]);
        sink.write_all(&buf[..chunk]).map_err(DumpError::SinkWriteFailed)?;

        position += chunk as u64;
        remaining -= chunk as u64;
        written += chunk as u64;
    }

    Ok(written)
}
