//! Journal writer.

use super::config::JournalConfig;
use super::reader::JournalReader;
use super::record::JournalRecord;
use super::state::JournalState;
use crate::error::{IgnisError, Result};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

struct JournalInner {
    file: BufWriter<File>,
    config: JournalConfig,
}

/// Append-only, crash-safe log of action outcomes.
///
/// Opening a journal takes an exclusive lock on its directory; a second
/// orchestrator against the same directory fails with `JournalLocked`
/// until the first one drops its handle.
pub struct Journal {
    inner: Mutex<JournalInner>,
    lock_file: File,
    path: PathBuf,
    record_count: AtomicU64,
}

impl Journal {
    /// Create or open a journal.
    pub fn open(config: JournalConfig) -> Result<Self> {
        let path = config.log_path();
        let write_err = |cause: String| IgnisError::JournalWrite {
            path: path.clone(),
            cause,
        };

        std::fs::create_dir_all(&config.directory)
            .map_err(|e| write_err(format!("Failed to create journal directory: {}", e)))?;

        let lock_path = config.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| write_err(format!("Failed to open lock file: {}", e)))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| IgnisError::JournalLocked {
                path: lock_path.clone(),
            })?;

        let scan = JournalReader::new(&path).scan()?;
        if scan.torn_bytes > 0 {
            let file = OpenOptions::new()
                .write(true)
                .open(&path)
                .map_err(|e| write_err(format!("Failed to open journal for repair: {}", e)))?;
            file.set_len(scan.valid_len)
                .map_err(|e| write_err(format!("Failed to truncate torn record: {}", e)))?;
            tracing::warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                dropped = scan.torn_bytes,
                "Truncated incomplete journal tail"
            );
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| write_err(format!("Failed to open journal file: {}", e)))?;

        tracing::debug!(
            path = %path.display(),
            records = scan.records.len(),
            "Journal opened"
        );

        Ok(Self {
            inner: Mutex::new(JournalInner {
                file: BufWriter::with_capacity(config.buffer_size, file),
                config,
            }),
            lock_file,
            record_count: AtomicU64::new(scan.records.len() as u64),
            path,
        })
    }

    /// Append a record.
    ///
    /// The record is flushed to the OS before this returns; with
    /// `sync_on_write` it is also synced to disk.
    pub fn record(&self, record: &JournalRecord) -> Result<()> {
        let mut inner = self.inner.lock();

        let bytes = record.to_bytes().map_err(|e| self.write_error(e))?;
        inner
            .file
            .write_all(&bytes)
            .map_err(|e| self.write_error(e))?;
        inner.file.flush().map_err(|e| self.write_error(e))?;

        if inner.config.sync_on_write {
            inner
                .file
                .get_ref()
                .sync_data()
                .map_err(|e| self.write_error(e))?;
        }

        self.record_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flush and sync pending writes.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.file.flush().map_err(|e| self.write_error(e))?;
        inner
            .file
            .get_ref()
            .sync_data()
            .map_err(|e| self.write_error(e))
    }

    /// Replay the journal into per-action state.
    pub fn load(&self) -> Result<JournalState> {
        self.flush()?;
        self.reader().load()
    }

    /// Create a reader over the log.
    pub fn reader(&self) -> JournalReader {
        JournalReader::new(&self.path)
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The journal directory.
    pub fn directory(&self) -> PathBuf {
        self.inner.lock().config.directory.clone()
    }

    /// Number of records in the log, including those from earlier runs.
    pub fn record_count(&self) -> u64 {
        self.record_count.load(Ordering::Relaxed)
    }

    fn write_error(&self, e: impl ToString) -> IgnisError {
        IgnisError::JournalWrite {
            path: self.path.clone(),
            cause: e.to_string(),
        }
    }
}

impl Drop for Journal {
    fn drop(&mut self) {
        let _ = self.inner.get_mut().file.flush();
        let _ = FileExt::unlock(&self.lock_file);
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("path", &self.path)
            .field("record_count", &self.record_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ActionStatus;
    use crate::types::{ActionId, ModuleId, RunId, TxHash};
    use crate::value::Value;
    use tempfile::tempdir;

    fn config(dir: &Path) -> JournalConfig {
        JournalConfig::default()
            .with_directory(dir)
            .with_sync(false)
    }

    fn action(local: &str) -> ActionId {
        ActionId::new(&ModuleId::new("ProxyModule", None), local)
    }

    #[test]
    fn journal_write_and_load() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(config(dir.path())).unwrap();
        let run = RunId::new();

        journal.record(&JournalRecord::run_started(run)).unwrap();
        journal
            .record(&JournalRecord::action_submitted(run, action("Box"), TxHash::new([1; 32])))
            .unwrap();
        journal
            .record(&JournalRecord::action_confirmed(
                run,
                action("Box"),
                Value::string("0xbox"),
                Some(TxHash::new([1; 32])),
            ))
            .unwrap();
        journal
            .record(&JournalRecord::action_submitted(
                run,
                action("TransparentUpgradeableProxy"),
                TxHash::new([2; 32]),
            ))
            .unwrap();

        let state = journal.load().unwrap();
        assert_eq!(journal.record_count(), 4);
        assert_eq!(state.len(), 2);
        assert!(state.get(&action("Box")).unwrap().is_confirmed());
        assert_eq!(
            state.get(&action("TransparentUpgradeableProxy")).unwrap().status,
            ActionStatus::Submitted
        );
    }

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let _first = Journal::open(config(dir.path())).unwrap();

        let err = Journal::open(config(dir.path())).unwrap_err();
        assert!(matches!(err, IgnisError::JournalLocked { .. }));
    }

    #[test]
    fn reopen_after_drop_sees_previous_records() {
        let dir = tempdir().unwrap();
        let run = RunId::new();
        {
            let journal = Journal::open(config(dir.path())).unwrap();
            journal
                .record(&JournalRecord::action_confirmed(
                    run,
                    action("Box"),
                    Value::string("0xbox"),
                    None,
                ))
                .unwrap();
        }

        let journal = Journal::open(config(dir.path())).unwrap();
        assert_eq!(journal.record_count(), 1);
        let state = journal.load().unwrap();
        assert_eq!(
            state.get(&action("Box")).unwrap().result,
            Some(Value::string("0xbox"))
        );
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let dir = tempdir().unwrap();
        let run = RunId::new();
        {
            let journal = Journal::open(config(dir.path())).unwrap();
            journal.record(&JournalRecord::run_started(run)).unwrap();
        }

        // Simulate a crash halfway through writing a confirmation.
        let log = config(dir.path()).log_path();
        let partial = JournalRecord::action_confirmed(run, action("Box"), Value::string("0xbox"), None)
            .to_bytes()
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(&log).unwrap();
        file.write_all(&partial[..partial.len() / 2]).unwrap();
        drop(file);

        let journal = Journal::open(config(dir.path())).unwrap();
        let state = journal.load().unwrap();
        assert!(state.get(&action("Box")).is_none());
        assert_eq!(journal.record_count(), 1);

        // New records append cleanly after the repaired prefix.
        journal
            .record(&JournalRecord::action_confirmed(
                run,
                action("Box"),
                Value::string("0xbox"),
                None,
            ))
            .unwrap();
        assert!(journal.load().unwrap().get(&action("Box")).unwrap().is_confirmed());
    }

    #[test]
    fn corrupt_length_mid_file_is_not_truncated() {
        let dir = tempdir().unwrap();
        let run = RunId::new();
        {
            let journal = Journal::open(config(dir.path())).unwrap();
            journal.record(&JournalRecord::run_started(run)).unwrap();
            for local in ["Box", "TransparentUpgradeableProxy"] {
                journal
                    .record(&JournalRecord::action_confirmed(
                        run,
                        action(local),
                        Value::string("0x01"),
                        None,
                    ))
                    .unwrap();
            }
        }

        let log = config(dir.path()).log_path();
        let original = std::fs::read(&log).unwrap();

        for length in [0x00FF_FFFFu32, original.len() as u32 + 1] {
            let mut damaged = original.clone();
            damaged[..4].copy_from_slice(&length.to_le_bytes());
            std::fs::write(&log, &damaged).unwrap();

            let err = Journal::open(config(dir.path())).unwrap_err();
            assert!(
                matches!(err, IgnisError::JournalCorruption { offset: 0, .. }),
                "{:?}",
                err
            );
            assert_eq!(std::fs::read(&log).unwrap(), damaged);
        }
    }
}
