//! Append-only frame writer.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use serde::Serialize;
use tracing::error;

use crate::errors::JournalError;
use crate::frame::{FrameHeader, FrameKind, JournalHeader, HEADER_SIZE};

/// Options for [`JournalWriter::open`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// fsync after every frame (default: false).
    pub sync: bool,
    /// Create the file when missing (default: true).
    pub create: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sync: false,
            create: true,
        }
    }
}

/// Appends frames to a journal file.
///
/// Every frame goes out in a single `write_all` followed by a flush (and an
/// fsync when `sync` is set). A frame is therefore the unit the ledger
/// commits in. When a write or fsync fails the file is cut back to where the
/// frame began, so a failed append leaves nothing behind for later frames to
/// land after. If that cut fails too the writer is poisoned and refuses every
/// later append.
///
/// ```rust,no_run
/// use charter_journal::{FrameKind, JournalWriter, WriteOptions};
/// use serde_json::json;
///
/// let mut writer = JournalWriter::open("ledger.chj", WriteOptions::default())?;
/// writer.append_json(FrameKind::Control, &json!({"op": "head", "sequence": 4}))?;
/// writer.finish()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct JournalWriter {
    file: File,
    sync: bool,
    poisoned: bool,
    #[cfg(test)]
    faults: Faults,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    // Write only this many bytes of the next frame, then fail.
    tear_next_write: Option<usize>,
    fail_rewind: bool,
}

impl JournalWriter {
    /// Opens `path` for appending.
    ///
    /// An empty file gets a fresh header. A non-empty file must already start
    /// with a valid one; a file shorter than a header is refused.
    pub fn open<P: AsRef<Path>>(path: P, options: WriteOptions) -> Result<Self, JournalError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(options.create)
            .open(path)?;
        let mut writer = Self {
            file,
            sync: options.sync,
            poisoned: false,
            #[cfg(test)]
            faults: Faults::default(),
        };

        match writer.file.metadata()?.len() {
            0 => {
                let header = JournalHeader::current().encode();
                writer.file.write_all(&header)?;
                writer.commit()?;
            }
            len if len < HEADER_SIZE as u64 => return Err(JournalError::FileNotEmpty),
            _ => {
                let mut header = [0u8; HEADER_SIZE];
                writer.file.seek(SeekFrom::Start(0))?;
                writer.file.read_exact(&mut header)?;
                JournalHeader::decode(&header)?;
                writer.file.seek(SeekFrom::End(0))?;
            }
        }
        Ok(writer)
    }

    fn commit(&mut self) -> Result<(), JournalError> {
        self.file.flush()?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Serializes `record` to JSON and appends it as one frame.
    pub fn append_json<T: Serialize>(&mut self, kind: FrameKind, record: &T) -> Result<(), JournalError> {
        let payload = serde_json::to_vec(record)?;
        self.append_raw(kind, &payload)
    }

    /// Appends `payload` as one frame.
    ///
    /// # Errors
    ///
    /// [`JournalError::Poisoned`] once an earlier failed frame could not be
    /// cut back out of the file.
    pub fn append_raw(&mut self, kind: FrameKind, payload: &[u8]) -> Result<(), JournalError> {
        if self.poisoned {
            return Err(JournalError::Poisoned);
        }
        let header = FrameHeader::for_payload(kind, payload.len())?.encode();
        let mut frame = Vec::with_capacity(header.len() + payload.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(payload);

        let start = self.file.seek(SeekFrom::End(0))?;
        if let Err(err) = self.write_frame(&frame) {
            if let Err(undo) = self.rewind(start) {
                error!(offset = start, error = %undo, "could not cut failed frame; journal poisoned");
                self.poisoned = true;
            }
            return Err(err);
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), JournalError> {
        #[cfg(test)]
        if let Some(keep) = self.faults.tear_next_write.take() {
            self.file.write_all(&frame[..keep.min(frame.len())])?;
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected short write").into());
        }
        self.file.write_all(frame)?;
        self.commit()
    }

    fn rewind(&mut self, len: u64) -> std::io::Result<()> {
        #[cfg(test)]
        if self.faults.fail_rewind {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "injected rewind failure"));
        }
        self.file.set_len(len)?;
        self.file.seek(SeekFrom::Start(len))?;
        if self.sync {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// True once a failed frame could not be removed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Cuts the file back to `len` bytes, dropping a torn tail.
    pub fn truncate_to(&mut self, len: u64) -> Result<(), JournalError> {
        if len < HEADER_SIZE as u64 {
            return Err(JournalError::InvalidHeader(format!(
                "refusing to truncate to {} bytes, inside the header",
                len
            )));
        }
        self.file.set_len(len)?;
        self.file.seek(SeekFrom::End(0))?;
        self.commit()
    }

    /// Flushes and closes.
    pub fn finish(mut self) -> Result<(), JournalError> {
        self.commit()
    }
}

impl Drop for JournalWriter {
    fn drop(&mut self) {
        let _ = self.commit();
    }
}
