//! Durable halt channel: the source of truth that survives restarts.
//!
//! Every implementation routes writes through [`guard_transition`], so a
//! halted record can only become operational when it carries the ceremony
//! that cleared it, and a recorded halt reason is never overwritten.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use charter_canonical::Timestamp;
use charter_journal::{
    FrameKind, JournalError, JournalReader, JournalWriter, ReadMode, WriteOptions,
};
use charter_schemas::CeremonyReference;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Durable halt row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltRecord {
    /// Whether writes are fenced.
    pub is_halted: bool,
    /// Cause of the current halt.
    #[serde(default)]
    pub reason: Option<String>,
    /// When the current halt took effect.
    #[serde(default)]
    pub halted_at: Option<Timestamp>,
    /// Ceremony that performed the last clear.
    #[serde(default)]
    pub cleared_by: Option<CeremonyReference>,
}

impl HaltRecord {
    /// Initial operational state.
    pub fn operational() -> Self {
        Self {
            is_halted: false,
            reason: None,
            halted_at: None,
            cleared_by: None,
        }
    }

    /// A fresh halt.
    pub fn halted(reason: impl Into<String>, halted_at: Timestamp) -> Self {
        Self {
            is_halted: true,
            reason: Some(reason.into()),
            halted_at: Some(halted_at),
            cleared_by: None,
        }
    }

    /// Operational again, by ceremony.
    pub fn cleared(cleared_by: CeremonyReference) -> Self {
        Self {
            cleared_by: Some(cleared_by),
            ..Self::operational()
        }
    }
}

/// Durable channel failures.
#[derive(Error, Debug)]
pub enum HaltChannelError {
    /// The write would bypass the ceremony clear path or rewrite a halt.
    #[error("sticky halt violation: {0}")]
    StickyViolation(String),
    /// The channel cannot be read or written right now.
    #[error("durable halt channel unavailable: {0}")]
    Unavailable(String),
    /// Journal failure.
    #[error("halt journal: {0}")]
    Journal(#[from] JournalError),
    /// Stored record could not be decoded.
    #[error("halt record decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Storage-layer rule applied to every durable write.
pub fn guard_transition(current: &HaltRecord, next: &HaltRecord) -> Result<(), HaltChannelError> {
    if !current.is_halted {
        return Ok(());
    }
    if !next.is_halted {
        if next.cleared_by.is_none() {
            return Err(HaltChannelError::StickyViolation(
                "halted -> operational requires ceremony evidence".into(),
            ));
        }
        return Ok(());
    }
    if next.reason != current.reason {
        return Err(HaltChannelError::StickyViolation(format!(
            "halt reason {:?} is already recorded",
            current.reason
        )));
    }
    Ok(())
}

/// Slow, durable side of the dual-channel halt flag.
pub trait DurableHaltChannel: Send + Sync {
    /// Reads the current durable record.
    fn read(&self) -> Result<HaltRecord, HaltChannelError>;

    /// Writes a new record, subject to [`guard_transition`].
    fn write(&self, record: &HaltRecord) -> Result<(), HaltChannelError>;
}

impl<T: DurableHaltChannel + ?Sized> DurableHaltChannel for Arc<T> {
    fn read(&self) -> Result<HaltRecord, HaltChannelError> {
        (**self).read()
    }

    fn write(&self, record: &HaltRecord) -> Result<(), HaltChannelError> {
        (**self).write(record)
    }
}

/// In-process durable channel for tests and ephemeral ledgers.
#[derive(Debug)]
pub struct MemoryHaltChannel {
    record: Mutex<HaltRecord>,
    failing: AtomicBool,
}

impl MemoryHaltChannel {
    /// Starts operational.
    pub fn new() -> Self {
        Self {
            record: Mutex::new(HaltRecord::operational()),
            failing: AtomicBool::new(false),
        }
    }

    /// Makes reads and writes fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), HaltChannelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HaltChannelError::Unavailable("memory channel set to fail".into()));
        }
        Ok(())
    }
}

impl Default for MemoryHaltChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableHaltChannel for MemoryHaltChannel {
    fn read(&self) -> Result<HaltRecord, HaltChannelError> {
        self.check()?;
        Ok(self.record.lock().clone())
    }

    fn write(&self, record: &HaltRecord) -> Result<(), HaltChannelError> {
        self.check()?;
        let mut current = self.record.lock();
        guard_transition(&current, record)?;
        *current = record.clone();
        Ok(())
    }
}

/// Halt channel persisted as `HaltState` frames; the last frame wins.
pub struct JournalHaltChannel {
    path: PathBuf,
    writer: Mutex<JournalWriter>,
}

impl JournalHaltChannel {
    /// Opens (or creates) the halt journal at `path`.
    pub fn open<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, HaltChannelError> {
        let path = path.as_ref().to_path_buf();
        let writer = JournalWriter::open(&path, WriteOptions { sync, create: true })?;
        Ok(Self {
            path,
            writer: Mutex::new(writer),
        })
    }

    fn read_last(&self) -> Result<HaltRecord, HaltChannelError> {
        let mut reader = JournalReader::open(&self.path, ReadMode::Strict)?;
        let mut last = HaltRecord::operational();
        while let Some((kind, value)) = reader.read_json()? {
            if kind == FrameKind::HaltState {
                last = serde_json::from_value(value)?;
            }
        }
        Ok(last)
    }
}

impl DurableHaltChannel for JournalHaltChannel {
    fn read(&self) -> Result<HaltRecord, HaltChannelError> {
        let _writer = self.writer.lock();
        self.read_last()
    }

    fn write(&self, record: &HaltRecord) -> Result<(), HaltChannelError> {
        let mut writer = self.writer.lock();
        guard_transition(&self.read_last()?, record)?;
        writer.append_json(FrameKind::HaltState, record)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_canonical::PrincipalId;
    use charter_schemas::CeremonyPurpose;

    fn at() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn ceremony() -> CeremonyReference {
        CeremonyReference {
            ceremony_id: "c-1".into(),
            purpose: CeremonyPurpose::ClearHalt,
            approvers: vec![PrincipalId::parse("keeper:a").unwrap()],
        }
    }

    #[test]
    fn direct_clear_is_rejected() {
        let channel = MemoryHaltChannel::new();
        channel.write(&HaltRecord::halted("fork_detected", at())).unwrap();
        let err = channel.write(&HaltRecord::operational()).unwrap_err();
        assert!(matches!(err, HaltChannelError::StickyViolation(_)));
        assert!(channel.read().unwrap().is_halted);
        channel.write(&HaltRecord::cleared(ceremony())).unwrap();
        assert!(!channel.read().unwrap().is_halted);
    }

    #[test]
    fn first_reason_is_kept() {
        let channel = MemoryHaltChannel::new();
        channel.write(&HaltRecord::halted("fork_detected", at())).unwrap();
        assert!(channel.write(&HaltRecord::halted("manual", at())).is_err());
        assert_eq!(channel.read().unwrap().reason.as_deref(), Some("fork_detected"));
    }

    #[test]
    fn journal_channel_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("halt.chj");
        {
            let channel = JournalHaltChannel::open(&path, false).unwrap();
            assert!(!channel.read().unwrap().is_halted);
            channel.write(&HaltRecord::halted("fork_detected", at())).unwrap();
        }
        let channel = JournalHaltChannel::open(&path, false).unwrap();
        let record = channel.read().unwrap();
        assert!(record.is_halted);
        assert_eq!(record.reason.as_deref(), Some("fork_detected"));
        assert!(channel.write(&HaltRecord::operational()).is_err());
    }
}
