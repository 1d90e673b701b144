// SPDX-License-Identifier: MIT

//! Output sink for dumped bytes.

use std::fs::File;
use std::io::{self, Cursor, Seek, SeekFrom, Write};

/// Append-capable, position-tracked byte sink.
///
/// Writes go through [`Write::write_all`], which already retries short
/// writes until the buffer is exhausted or the sink errors.
pub trait Sink: Write {
    /// Drops everything written so far and returns the cursor to the start.
    /// The fallback path restarts the whole request through this, since the
    /// two read paths do not share a cursor.
    fn restart(&mut self) -> io::Result<()>;
}

impl Sink for File {
    fn restart(&mut self) -> io::Result<()> {
        self.set_len(0)?;
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl Sink for Cursor<Vec<u8>> {
    fn restart(&mut self) -> io::Result<()> {
        self.get_mut().clear();
        self.set_position(0);
        Ok(())
    }
}
