use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// File name of the event journal inside `data_dir`.
pub const EVENT_JOURNAL_FILE: &str = "ledger.chj";

/// File name of the halt journal inside `data_dir`.
pub const HALT_JOURNAL_FILE: &str = "halt.chj";

/// Options for opening a [`Ledger`](crate::Ledger).
///
/// Deserializable so an embedding service can load it from its own config
/// file; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerOptions {
    /// Directory holding the journals; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// fsync after every journal frame (default: true).
    pub sync: bool,
    /// Verify the whole chain on open and halt if it is broken (default: true).
    pub verify_on_open: bool,
    /// Create a genesis checkpoint and periodic checkpoints automatically (default: true).
    pub auto_checkpoint: bool,
    /// Domain events between periodic checkpoints; 0 disables them (default: 1000).
    pub checkpoint_interval: u64,
    /// Truncate a torn final journal frame on open instead of failing (default: false).
    pub recover_torn_tail: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            data_dir: None,
            sync: true,
            verify_on_open: true,
            auto_checkpoint: true,
            checkpoint_interval: 1000,
            recover_torn_tail: false,
        }
    }
}

impl LedgerOptions {
    /// In-memory ledger with defaults.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Journal-backed ledger rooted at `dir`.
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Self::default()
        }
    }
}
