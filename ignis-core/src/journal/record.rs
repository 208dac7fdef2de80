//! Journal record types and serialization.

use crate::graph::ActionStatus;
use crate::types::{ActionId, RunId, TxHash};
use crate::value::Value;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Header size: length (4) + CRC32 (4) + type (1) + run id (16).
pub const HEADER_SIZE: usize = 4 + 4 + 1 + 16;

/// Largest frame the journal writes or accepts.
pub const MAX_RECORD_LEN: usize = 1024 * 1024;

/// Offset of the record type byte.
pub(crate) const TYPE_OFFSET: usize = 8;

/// Bytes covered by the checksum start after the length and CRC fields.
const CHECKSUM_START: usize = 8;

/// Type of journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalRecordType {
    /// An executor run began.
    RunStarted = 0,
    /// A transaction for an action was broadcast.
    ActionSubmitted = 1,
    /// An action confirmed; carries its result.
    ActionConfirmed = 2,
    /// An action failed; carries the error.
    ActionFailed = 3,
    /// A run finished with every action confirmed.
    RunCompleted = 4,
    /// A run finished with failures.
    RunFailed = 5,
    /// A run was cancelled.
    RunCancelled = 6,
}

impl TryFrom<u8> for JournalRecordType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::RunStarted),
            1 => Ok(Self::ActionSubmitted),
            2 => Ok(Self::ActionConfirmed),
            3 => Ok(Self::ActionFailed),
            4 => Ok(Self::RunCompleted),
            5 => Ok(Self::RunFailed),
            6 => Ok(Self::RunCancelled),
            other => Err(other),
        }
    }
}

impl JournalRecordType {
    /// The action status this record establishes, for action records.
    pub fn action_status(&self) -> Option<ActionStatus> {
        match self {
            Self::ActionSubmitted => Some(ActionStatus::Submitted),
            Self::ActionConfirmed => Some(ActionStatus::Confirmed),
            Self::ActionFailed => Some(ActionStatus::Failed),
            _ => None,
        }
    }
}

/// A single journal record.
#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    /// Type of this record.
    pub record_type: JournalRecordType,
    /// The run that wrote it.
    pub run_id: RunId,
    /// Timestamp (Unix epoch nanoseconds).
    pub timestamp_ns: u64,
    /// The action this record is about, for action records.
    pub action_id: Option<ActionId>,
    /// The broadcast transaction, when there is one.
    pub tx_hash: Option<TxHash>,
    /// The action result, for confirmations.
    pub result: Option<Value>,
    /// Error message, for failures.
    pub error: Option<String>,
}

impl JournalRecord {
    fn new(record_type: JournalRecordType, run_id: RunId) -> Self {
        Self {
            record_type,
            run_id,
            timestamp_ns: current_timestamp_ns(),
            action_id: None,
            tx_hash: None,
            result: None,
            error: None,
        }
    }

    /// Create a run started record.
    pub fn run_started(run_id: RunId) -> Self {
        Self::new(JournalRecordType::RunStarted, run_id)
    }

    /// Create an action submitted record.
    pub fn action_submitted(run_id: RunId, action_id: ActionId, tx_hash: TxHash) -> Self {
        Self {
            action_id: Some(action_id),
            tx_hash: Some(tx_hash),
            ..Self::new(JournalRecordType::ActionSubmitted, run_id)
        }
    }

    /// Create an action confirmed record.
    pub fn action_confirmed(
        run_id: RunId,
        action_id: ActionId,
        result: Value,
        tx_hash: Option<TxHash>,
    ) -> Self {
        Self {
            action_id: Some(action_id),
            tx_hash,
            result: Some(result),
            ..Self::new(JournalRecordType::ActionConfirmed, run_id)
        }
    }

    /// Create an action failed record.
    pub fn action_failed(
        run_id: RunId,
        action_id: ActionId,
        error: impl ToString,
        tx_hash: Option<TxHash>,
    ) -> Self {
        Self {
            action_id: Some(action_id),
            tx_hash,
            error: Some(error.to_string()),
            ..Self::new(JournalRecordType::ActionFailed, run_id)
        }
    }

    /// Create a run completed record.
    pub fn run_completed(run_id: RunId) -> Self {
        Self::new(JournalRecordType::RunCompleted, run_id)
    }

    /// Create a run failed record.
    pub fn run_failed(run_id: RunId, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(JournalRecordType::RunFailed, run_id)
        }
    }

    /// Create a run cancelled record.
    pub fn run_cancelled(run_id: RunId) -> Self {
        Self::new(JournalRecordType::RunCancelled, run_id)
    }

    /// Serialize the record to bytes.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut payload = Vec::new();

        payload.write_u64::<LittleEndian>(self.timestamp_ns)?;
        write_bytes(
            &mut payload,
            self.action_id.as_ref().map(|id| id.as_str().as_bytes()),
        )?;

        match &self.tx_hash {
            Some(hash) => {
                payload.write_u8(1)?;
                payload.write_all(hash.as_bytes())?;
            }
            None => payload.write_u8(0)?,
        }

        let result = match &self.result {
            Some(value) => Some(
                serde_json::to_vec(&value.0)
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            ),
            None => None,
        };
        write_bytes(&mut payload, result.as_deref())?;
        write_bytes(&mut payload, self.error.as_ref().map(|e| e.as_bytes()))?;

        let total_len = HEADER_SIZE + payload.len();
        if total_len > MAX_RECORD_LEN {
            return Err(invalid(format!(
                "Record of {} bytes exceeds the {} byte limit",
                total_len, MAX_RECORD_LEN
            )));
        }
        let mut record = Vec::with_capacity(total_len);

        record.write_u32::<LittleEndian>(total_len as u32)?;
        record.write_u32::<LittleEndian>(0)?; // CRC placeholder
        record.write_u8(self.record_type as u8)?;
        record.write_all(self.run_id.as_uuid().as_bytes())?;
        record.write_all(&payload)?;

        let crc = crc32fast::hash(&record[CHECKSUM_START..]);
        record[4..8].copy_from_slice(&crc.to_le_bytes());

        Ok(record)
    }

    /// Deserialize a record from a complete frame.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(invalid("Record too small".to_string()));
        }

        let mut cursor = io::Cursor::new(bytes);
        let total_len = cursor.read_u32::<LittleEndian>()? as usize;
        let stored_crc = cursor.read_u32::<LittleEndian>()?;

        if total_len != bytes.len() {
            return Err(invalid(format!(
                "Record length mismatch: header says {}, frame has {}",
                total_len,
                bytes.len()
            )));
        }

        let computed_crc = crc32fast::hash(&bytes[CHECKSUM_START..]);
        if computed_crc != stored_crc {
            return Err(invalid(format!(
                "CRC mismatch: expected {:#010x}, got {:#010x}",
                stored_crc, computed_crc
            )));
        }

        let type_byte = cursor.read_u8()?;
        let record_type = JournalRecordType::try_from(type_byte)
            .map_err(|b| invalid(format!("Unknown record type {}", b)))?;

        let mut uuid_bytes = [0u8; 16];
        cursor.read_exact(&mut uuid_bytes)?;
        let run_id = RunId::from_uuid(uuid::Uuid::from_bytes(uuid_bytes));

        let timestamp_ns = cursor.read_u64::<LittleEndian>()?;

        let action_id = read_bytes(&mut cursor)?
            .map(|b| String::from_utf8(b).map_err(|e| invalid(e.to_string())))
            .transpose()?
            .map(ActionId::from_raw);

        let tx_hash = match cursor.read_u8()? {
            0 => None,
            1 => {
                let mut hash = [0u8; 32];
                cursor.read_exact(&mut hash)?;
                Some(TxHash::new(hash))
            }
            flag => return Err(invalid(format!("Invalid tx hash flag {}", flag))),
        };

        let result = read_bytes(&mut cursor)?
            .map(|b| serde_json::from_slice(&b).map(Value).map_err(|e| invalid(e.to_string())))
            .transpose()?;

        let error = read_bytes(&mut cursor)?.map(|b| String::from_utf8_lossy(&b).into_owned());

        Ok(Self {
            record_type,
            run_id,
            timestamp_ns,
            action_id,
            tx_hash,
            result,
            error,
        })
    }
}

/// Length-prefixed optional byte string; length 0 encodes `None`.
fn write_bytes(out: &mut Vec<u8>, bytes: Option<&[u8]>) -> io::Result<()> {
    match bytes {
        Some(bytes) if !bytes.is_empty() => {
            out.write_u32::<LittleEndian>(bytes.len() as u32)?;
            out.write_all(bytes)
        }
        _ => out.write_u32::<LittleEndian>(0),
    }
}

fn read_bytes(cursor: &mut io::Cursor<&[u8]>) -> io::Result<Option<Vec<u8>>> {
    let len = cursor.read_u32::<LittleEndian>()? as usize;
    if len == 0 {
        return Ok(None);
    }
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf)?;
    Ok(Some(buf))
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Get current timestamp in nanoseconds since Unix epoch.
pub(crate) fn current_timestamp_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModuleId;

    fn action() -> ActionId {
        ActionId::new(&ModuleId::new("ProxyModule", None), "Box")
    }

    #[test]
    fn confirmed_record_keeps_result_and_hash() {
        let run_id = RunId::new();
        let record = JournalRecord::action_confirmed(
            run_id,
            action(),
            Value::string("0x5fbdb2315678afecb367f032d93f642f64180aa3"),
            Some(TxHash::new([7; 32])),
        );

        let restored = JournalRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, record);
        assert_eq!(
            restored.record_type.action_status(),
            Some(ActionStatus::Confirmed)
        );
    }

    #[test]
    fn run_records_have_no_action() {
        let record = JournalRecord::run_failed(RunId::new(), "E301: boom");
        let restored = JournalRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(restored.action_id, None);
        assert_eq!(restored.error.as_deref(), Some("E301: boom"));
        assert_eq!(restored.record_type.action_status(), None);
    }

    #[test]
    fn crc_covers_record_type() {
        let record = JournalRecord::action_failed(RunId::new(), action(), "reverted", None);
        let mut bytes = record.to_bytes().unwrap();

        // Flip Failed into Confirmed without touching the payload.
        bytes[8] = JournalRecordType::ActionConfirmed as u8;
        assert!(JournalRecord::from_bytes(&bytes).is_err());
    }

    #[test]
    fn crc_verification() {
        let record = JournalRecord::run_started(RunId::new());
        let mut bytes = record.to_bytes().unwrap();
        bytes[HEADER_SIZE] ^= 0xFF;
        assert!(JournalRecord::from_bytes(&bytes).is_err());
    }

    #[test]
    fn oversized_record_is_refused() {
        let huge = Value::string("x".repeat(MAX_RECORD_LEN));
        let record = JournalRecord::action_confirmed(RunId::new(), action(), huge, None);
        assert!(record.to_bytes().is_err());
    }
}
