// SPDX-License-Identifier: MIT

//! One hardware read cycle: program, trigger, poll, acknowledge.

use std::thread;
use std::time::Duration;

use crate::catalog::{FlashReg, PlatformDescriptor, MAX_CYCLE_BYTES};
use crate::mmio::RegionIo;
use crate::DumpError;

/// Fast polls of the busy bit before conceding the slow path.
const POLL_ATTEMPTS: u32 = 1000;
/// Pause between fast polls.
const POLL_INTERVAL: Duration = Duration::from_micros(100);
/// Single long wait after the fast polls are exhausted; a cycle still busy
/// after this is treated as hung.
const SETTLE_WAIT: Duration = Duration::from_millis(100);

/// Drives the hardware sequencing registers for one cycle at a time.
///
/// A cycle walks `idle -> programmed -> triggered -> polling` and ends in
/// done, timed out, or error. The caller programs at most
/// [`MAX_CYCLE_BYTES`] per cycle and drains the data slots after each
/// successful one.
pub struct CycleEngine<'a, W: RegionIo> {
    window: &'a mut W,
    descriptor: &'a PlatformDescriptor,
}

impl<'a, W: RegionIo> CycleEngine<'a, W> {
    pub fn new(window: &'a mut W, descriptor: &'a PlatformDescriptor) -> Self {
        Self { window, descriptor }
    }

    fn status(&mut self) -> u8 {
        self.window
            .read8(self.descriptor.regs.offset(FlashReg::Status))
    }

    /// Waits for the busy bit to clear, acknowledges the completion flags
    /// and checks that no error survived the acknowledge.
    pub fn wait_idle(&mut self) -> Result<(), DumpError> {
        let bits = &self.descriptor.bits;

        let mut polls = 0;
        while self.status() & bits.scip != 0 {
            polls += 1;
            if polls == POLL_ATTEMPTS {
                thread::sleep(SETTLE_WAIT);
                if self.status() & bits.scip != 0 {
                    return Err(DumpError::CycleTimeout);
                }
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        // W1C acknowledge of done/error/alignment, then verify the error
        // flags actually went away.
        let status_offset = self.descriptor.regs.offset(FlashReg::Status);
        self.window.write8(status_offset, bits.clear);
        let status = self.status();
        if status & (bits.ael | bits.fcerr) != 0 {
            return Err(DumpError::CycleError(status));
        }
        Ok(())
    }

    /// Runs one read cycle of `length` bytes at flash byte `address`.
    pub fn read_cycle(&mut self, address: u32, length: usize) -> Result<(), DumpError> {
        assert!(length >= 1 && length <= MAX_CYCLE_BYTES);
        let regs = &self.descriptor.regs;

        self.window.write32(
            regs.offset(FlashReg::Address),
            address & self.descriptor.faddr_mask,
        );
        // The byte count lives in the byte above the control register,
        // encoded as length - 1.
        self.window
            .write8(regs.offset(FlashReg::Control) + 1, (length - 1) as u8);
        self.window
            .write8(regs.offset(FlashReg::Control), self.descriptor.read_cycle);

        self.wait_idle()
    }

    /// Copies a completed cycle's bytes out of the data slots, in ascending
    /// slot order, little-endian within each slot. Trailing bytes of the
    /// last partial word are discarded.
    pub fn drain(&mut self, buf: &mut [u8]) {
        let regs = &self.descriptor.regs;
        for (slot, chunk) in buf.chunks_mut(4).enumerate() {
            let word = self.window.read32(regs.offset(FlashReg::Data(slot as u8)));
            for (i, byte) in chunk.iter_mut().enumerate() {
                *byte = (word >> (8 * i)) as u8;
            }
        }
    }
}
