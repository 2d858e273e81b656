//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries and their on-disk
//! framing: `[LSN: u64][CRC: u32][Len: u32][bincode payload]`, little-endian.
//! The CRC covers the LSN and the payload.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TideError};

/// Header size: LSN (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several writes applied atomically; a torn batch is dropped whole
    Batch { ops: Vec<Operation> },
}

impl Operation {
    /// Number of key-level writes carried by this operation
    pub fn write_count(&self) -> usize {
        match self {
            Operation::Put { .. } | Operation::Delete { .. } => 1,
            Operation::Batch { ops } => ops.iter().map(Operation::write_count).sum(),
        }
    }

    /// Flatten into key-level writes, in log order (`None` value = delete)
    pub fn into_writes(self, out: &mut Vec<(Vec<u8>, Option<Vec<u8>>)>) {
        match self {
            Operation::Put { key, value } => out.push((key, Some(value))),
            Operation::Delete { key } => out.push((key, None)),
            Operation::Batch { ops } => {
                for op in ops {
                    op.into_writes(out);
                }
            }
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to the framed on-disk representation
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&(&self.operation, self.timestamp))?;
        if payload.len() > u32::MAX as usize {
            return Err(TideError::WalWrite(format!(
                "entry payload too large: {} bytes",
                payload.len()
            )));
        }

        let crc = Self::compute_crc(self.lsn, &payload);
        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        out.extend_from_slice(&self.lsn.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    /// Parse a framed entry, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = Self::parse_header(bytes)?;
        let payload = bytes
            .get(HEADER_SIZE..HEADER_SIZE + len)
            .ok_or_else(|| TideError::WalCorruption("truncated entry payload".to_string()))?;
        Self::from_parts(lsn, crc, payload)
    }

    /// Split a header into (lsn, crc, payload length)
    pub(crate) fn parse_header(bytes: &[u8]) -> Result<(u64, u32, usize)> {
        if bytes.len() < HEADER_SIZE {
            return Err(TideError::WalCorruption(format!(
                "header too small: {} bytes",
                bytes.len()
            )));
        }
        let mut lsn = [0u8; 8];
        lsn.copy_from_slice(&bytes[0..8]);
        let mut crc = [0u8; 4];
        crc.copy_from_slice(&bytes[8..12]);
        let mut len = [0u8; 4];
        len.copy_from_slice(&bytes[12..16]);
        Ok((
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len) as usize,
        ))
    }

    /// Rebuild an entry from a parsed header and its payload
    pub(crate) fn from_parts(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(lsn, payload);
        if actual != crc {
            return Err(TideError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected {:08x}, got {:08x}",
                lsn, crc, actual
            )));
        }
        let (operation, timestamp): (Operation, u64) = bincode::deserialize(payload)
            .map_err(|e| TideError::WalCorruption(format!("undecodable payload: {}", e)))?;
        Ok(Self {
            lsn,
            operation,
            timestamp,
        })
    }

    /// CRC32 over the LSN and payload bytes
    pub fn compute_crc(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}
