//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, TideError};

use super::{WalEntry, HEADER_SIZE};

/// Larger lengths can only come from a corrupted header
const MAX_PAYLOAD: usize = 1 << 30;

/// Reads entries from the WAL file
pub struct WalReader {
    file: BufReader<File>,
    /// Offset just past the last entry read successfully
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file, and `WalCorruption` for a
    /// partial header, a partial payload, or a checksum mismatch.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header = [0u8; HEADER_SIZE];
        let got = read_full(&mut self.file, &mut header)?;
        if got == 0 {
            return Ok(None);
        }
        if got < HEADER_SIZE {
            return Err(TideError::WalCorruption(format!(
                "partial header at offset {}: {} bytes",
                self.position, got
            )));
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header)?;
        if len > MAX_PAYLOAD {
            return Err(TideError::WalCorruption(format!(
                "implausible payload length {} at offset {}",
                len, self.position
            )));
        }
        let mut payload = vec![0u8; len];
        let got = read_full(&mut self.file, &mut payload)?;
        if got < len {
            return Err(TideError::WalCorruption(format!(
                "partial payload at offset {}: {} of {} bytes",
                self.position, got, len
            )));
        }

        let entry = WalEntry::from_parts(lsn, crc, &payload)?;
        self.position += (HEADER_SIZE + len) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last valid entry
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// Read until `buf` is full or EOF, returning the number of bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
