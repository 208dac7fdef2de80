use crate::error::{IgnisError, Result};
use std::env;
use std::path::PathBuf;

/// Configuration for journal creation.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    /// Directory holding the journal log and its lock file.
    pub directory: PathBuf,
    /// Whether to fsync after each record.
    pub sync_on_write: bool,
    /// Buffer size for writes.
    pub buffer_size: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("/tmp/ignis/journal"),
            sync_on_write: true,
            buffer_size: 16 * 1024, // 16 KB
        }
    }
}

impl JournalConfig {
    /// A throwaway journal in a fresh temp directory.
    pub fn in_memory() -> Self {
        Self {
            directory: env::temp_dir().join(format!("ignis_journal_{}", uuid::Uuid::new_v4())),
            sync_on_write: false,
            buffer_size: 16 * 1024,
        }
    }

    /// Read configuration from the environment.
    ///
    /// - `IGNIS_JOURNAL_DIR`: journal directory
    /// - `IGNIS_JOURNAL_SYNC`: "true"/"1" or "false"/"0"
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(dir) = env::var("IGNIS_JOURNAL_DIR") {
            config.directory = PathBuf::from(dir);
        }
        if let Ok(sync) = env::var("IGNIS_JOURNAL_SYNC") {
            config.sync_on_write = parse_bool("IGNIS_JOURNAL_SYNC", &sync)?;
        }
        Ok(config)
    }

    /// Set the journal directory.
    pub fn with_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.directory = dir.into();
        self
    }

    /// Set sync on write.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_write = sync;
        self
    }

    /// Path of the append-only log.
    pub fn log_path(&self) -> PathBuf {
        self.directory.join("journal.log")
    }

    /// Path of the lock file guarding the directory.
    pub fn lock_path(&self) -> PathBuf {
        self.directory.join("journal.lock")
    }
}

/// Parse a boolean environment value.
pub fn parse_bool(field: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(IgnisError::ConfigValue {
            field: field.to_string(),
            cause: format!("expected a boolean, got '{}'", other),
        }),
    }
}
