//! Journal-backed storage implementation.

use std::path::{Path, PathBuf};

use charter_core::Event;
use charter_journal::{FrameKind, JournalReader, JournalWriter, ReadMode, WriteOptions};
use tracing::{info, warn};

use crate::backend::StoreBackend;
use crate::error::StoreError;
use crate::record::{ControlRecord, StoreRecord};

/// Options for opening a [`JournalBackend`].
#[derive(Debug, Clone, Default)]
pub struct JournalBackendOptions {
    /// fsync after every frame.
    pub sync: bool,
    /// Truncate a partially written final frame instead of refusing to open.
    pub recover_torn_tail: bool,
}

/// Stores events and control records as frames in one journal file.
pub struct JournalBackend {
    path: PathBuf,
    writer: JournalWriter,
}

impl JournalBackend {
    /// Opens (or creates) the journal at `path`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::TornTail`] when the file ends mid-frame and
    ///   `recover_torn_tail` is off.
    /// - [`StoreError::Journal`] when the file is not a journal.
    pub fn open<P: AsRef<Path>>(path: P, options: JournalBackendOptions) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let valid_len = match std::fs::metadata(&path) {
            Ok(meta) if meta.len() > 0 => Some(scan_valid_len(&path)?),
            _ => None,
        };

        let mut writer = JournalWriter::open(
            &path,
            WriteOptions {
                sync: options.sync,
                create: true,
            },
        )?;

        if let Some((valid, trailing)) = valid_len {
            if trailing {
                if !options.recover_torn_tail {
                    return Err(StoreError::TornTail { offset: valid });
                }
                warn!(path = %path.display(), offset = valid, "truncating torn journal tail");
                writer.truncate_to(valid)?;
            }
        }

        info!(path = %path.display(), "opened ledger journal");
        Ok(Self { path, writer })
    }

    /// Location of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn scan_valid_len(path: &Path) -> Result<(u64, bool), StoreError> {
    let mut reader = JournalReader::open(path, ReadMode::Permissive)?;
    while reader.read_frame()?.is_some() {}
    Ok((reader.position(), reader.has_trailing_bytes()))
}

impl StoreBackend for JournalBackend {
    fn replay(&mut self) -> Result<Vec<StoreRecord>, StoreError> {
        let mut reader = JournalReader::open(&self.path, ReadMode::Strict)?;
        let mut records = Vec::new();
        while let Some((kind, value)) = reader.read_json()? {
            match kind {
                FrameKind::Event => records.push(StoreRecord::Event(serde_json::from_value::<Event>(value)?)),
                FrameKind::Control => {
                    records.push(StoreRecord::Control(serde_json::from_value::<ControlRecord>(value)?))
                }
                // Halt state lives in its own journal; tolerate foreign frames.
                FrameKind::HaltState | FrameKind::Unknown(_) => {}
            }
        }
        Ok(records)
    }

    fn persist(&mut self, record: &StoreRecord) -> Result<(), StoreError> {
        match record {
            StoreRecord::Event(event) => self.writer.append_json(FrameKind::Event, event)?,
            StoreRecord::Control(control) => self.writer.append_json(FrameKind::Control, control)?,
        }
        Ok(())
    }
}
