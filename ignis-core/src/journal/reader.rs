//! Journal reader.

use super::record::{HEADER_SIZE, JournalRecord, JournalRecordType, MAX_RECORD_LEN, TYPE_OFFSET};
use super::state::JournalState;
use crate::error::{IgnisError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Result of scanning a journal file.
#[derive(Debug, Clone, Default)]
pub struct JournalScan {
    /// Every complete, valid record in file order.
    pub records: Vec<JournalRecord>,
    /// Length of the valid prefix.
    pub valid_len: u64,
    /// Bytes of an incomplete trailing record, dropped from `records`.
    pub torn_bytes: u64,
}

/// Reads a journal log.
#[derive(Debug, Clone)]
pub struct JournalReader {
    path: PathBuf,
}

impl JournalReader {
    /// Create a reader for a journal log file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records.
    pub fn read_all(&self) -> Result<Vec<JournalRecord>> {
        Ok(self.scan()?.records)
    }

    /// Replay all records into per-action state.
    pub fn load(&self) -> Result<JournalState> {
        JournalState::from_records(self.read_all()?)
    }

    /// Scan the log.
    ///
    /// A final record cut short by a crash is dropped with a warning; it was
    /// never acknowledged. Only the last frame can be torn: its declared end
    /// must lie past the end of the file and no valid frame may follow its
    /// start. Anything else, including a length above [`MAX_RECORD_LEN`], is
    /// reported as corruption.
    pub fn scan(&self) -> Result<JournalScan> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JournalScan::default()),
            Err(e) => {
                return Err(IgnisError::JournalRead {
                    path: self.path.clone(),
                    cause: e.to_string(),
                });
            }
        };
        scan_bytes(&bytes, &self.path)
    }
}

fn scan_bytes(bytes: &[u8], path: &Path) -> Result<JournalScan> {
    let mut scan = JournalScan::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        let corrupt = move |cause: String| IgnisError::JournalCorruption {
            offset: offset as u64,
            cause,
        };

        if rest.len() < 4 {
            return Ok(torn(scan, offset, rest.len(), path));
        }
        let length = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;

        if length == 0 && rest.len() < MAX_RECORD_LEN && rest.iter().all(|&b| b == 0) {
            // Zero-filled tail left behind by a crash during file extension.
            return Ok(torn(scan, offset, rest.len(), path));
        }
        if length < HEADER_SIZE {
            return Err(corrupt(format!("Invalid record length: {}", length)));
        }
        if length > MAX_RECORD_LEN {
            return Err(corrupt(format!(
                "Record length {} exceeds maximum {}",
                length, MAX_RECORD_LEN
            )));
        }
        if rest.len() < length {
            if let Some(&type_byte) = rest.get(TYPE_OFFSET) {
                if JournalRecordType::try_from(type_byte).is_err() {
                    return Err(corrupt(format!(
                        "Unknown record type {} in truncated record",
                        type_byte
                    )));
                }
            }
            if let Some(next) = next_valid_frame(&rest[1..]) {
                return Err(corrupt(format!(
                    "Record length {} overruns a valid record at offset {}",
                    length,
                    offset + 1 + next
                )));
            }
            return Ok(torn(scan, offset, rest.len(), path));
        }

        let record =
            JournalRecord::from_bytes(&rest[..length]).map_err(|e| corrupt(e.to_string()))?;
        scan.records.push(record);
        offset += length;
        scan.valid_len = offset as u64;
    }

    Ok(scan)
}

/// Position of the first complete, checksummed frame in `bytes`, if any.
fn next_valid_frame(bytes: &[u8]) -> Option<usize> {
    (0..bytes.len().saturating_sub(HEADER_SIZE - 1)).find(|&start| {
        let rest = &bytes[start..];
        let length = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        (HEADER_SIZE..=rest.len().min(MAX_RECORD_LEN)).contains(&length)
            && JournalRecord::from_bytes(&rest[..length]).is_ok()
    })
}

fn torn(mut scan: JournalScan, offset: usize, len: usize, path: &Path) -> JournalScan {
    tracing::warn!(
        path = %path.display(),
        offset,
        bytes = len,
        "Dropping incomplete trailing journal record"
    );
    scan.valid_len = offset as u64;
    scan.torn_bytes = len as u64;
    scan
}
