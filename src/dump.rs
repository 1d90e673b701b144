// SPDX-License-Identifier: MIT

//! End-to-end dump: resolve, map, transfer, with a layered fallback.

use log::{info, warn};

use crate::catalog::PlatformDescriptor;
use crate::fallback;
use crate::mapper::Mapper;
use crate::pci::PciBus;
use crate::resolver;
use crate::sink::Sink;
use crate::transfer;
use crate::window;
use crate::{DumpError, ReadRequest};

/// Runs one read request to completion.
///
/// The register path is tried first: platform resolution, window mapping,
/// sanity probe, chunked transfer. A failure at any of those stages unmaps
/// whatever was mapped, truncates the sink and retries the whole request
/// through the BIOS-shadow fallback; only a fallback failure is surfaced.
/// Partial output never counts as success.
pub fn dump<B: PciBus, M: Mapper, S: Sink>(
    catalog: &[PlatformDescriptor],
    bus: &B,
    mapper: &mut M,
    request: &ReadRequest,
    sink: &mut S,
) -> Result<u64, DumpError> {
    match register_path(catalog, bus, mapper, request, sink) {
        Ok(written) => {
            info!("register path dump complete: {} bytes", written);
            Ok(written)
        }
        Err(err) => {
            warn!("register path failed: {}; retrying through the BIOS shadow", err);
            sink.restart().map_err(DumpError::SinkWriteFailed)?;
            let written = fallback::run(mapper, request, sink)?;
            info!("fallback dump complete: {} bytes", written);
            Ok(written)
        }
    }
}

fn register_path<B: PciBus, M: Mapper, S: Sink>(
    catalog: &[PlatformDescriptor],
    bus: &B,
    mapper: &mut M,
    request: &ReadRequest,
    sink: &mut S,
) -> Result<u64, DumpError> {
    // The device handle is declared before the window so it outlives the
    // mapping: unmap happens first, then the device reference is released.
    let (descriptor, mut function) = resolver::resolve(catalog, bus)?;
    let base = window::resolve_base(descriptor, function.as_mut())?;
    let mut window = window::map(mapper, base, descriptor)?;
    transfer::run(&mut window, descriptor, request, sink)
}
