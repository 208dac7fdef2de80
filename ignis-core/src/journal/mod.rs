//! Execution journal for idempotent, crash-safe resume.
//!
//! The journal records every action transition a run makes. On the next
//! run the graph is rebuilt from its definition and reconciled against the
//! journal: confirmed actions are reused, submitted ones are re-checked on
//! chain, and everything else runs.
//!
//! # Record Format
//!
//! ```text
//! ┌─────────┬────────┬───────┬──────────┬─────────────────────────────────────┐
//! │ Length  │ CRC32  │ Type  │ RunId    │ Payload                             │
//! │ (4 B)   │ (4 B)  │ (1 B) │ (16 B)   │ ts, action, tx hash, result, error  │
//! └─────────┴────────┴───────┴──────────┴─────────────────────────────────────┘
//! ```
//!
//! The checksum covers everything after the CRC field. Frames are at most
//! [`MAX_RECORD_LEN`] bytes. Only the final frame can be cut short: it is
//! dropped on open, and nothing before it is ever truncated. Any other
//! invalid record is reported as corruption and never read as a
//! confirmation.

mod config;
mod reader;
mod record;
mod state;
mod writer;

pub use config::{JournalConfig, parse_bool};
pub use reader::{JournalReader, JournalScan};
pub use record::{HEADER_SIZE, JournalRecord, JournalRecordType, MAX_RECORD_LEN};
pub use state::{JournalEntry, JournalState};
pub use writer::Journal;
