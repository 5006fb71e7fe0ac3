//! Sequential frame reader.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use serde_json::Value;

use crate::errors::JournalError;
use crate::frame::{FrameHeader, FrameKind, JournalHeader, FRAME_HEADER_SIZE, HEADER_SIZE};

/// How a frame cut short by the end of the file is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// As [`JournalError::TruncatedFrame`].
    Strict,
    /// As end-of-file; callers inspect [`JournalReader::has_trailing_bytes`].
    Permissive,
}

/// Reads frames front to back.
///
/// [`position`](Self::position) is always just past the last complete frame
/// returned, which is where a torn tail begins.
pub struct JournalReader {
    input: BufReader<File>,
    mode: ReadMode,
    position: u64,
    file_len: u64,
}

impl JournalReader {
    /// Opens `path` and validates its header.
    pub fn open<P: AsRef<Path>>(path: P, mode: ReadMode) -> Result<Self, JournalError> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut input = BufReader::new(file);

        let mut header = [0u8; HEADER_SIZE];
        input.read_exact(&mut header)?;
        JournalHeader::decode(&header)?;

        Ok(Self {
            input,
            mode,
            position: HEADER_SIZE as u64,
            file_len,
        })
    }

    /// Offset just past the last complete frame read.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// True when bytes remain after [`position`](Self::position).
    pub fn has_trailing_bytes(&self) -> bool {
        self.position < self.file_len
    }

    /// Next frame, or `None` at end-of-file.
    pub fn read_frame(&mut self) -> Result<Option<(FrameKind, Vec<u8>)>, JournalError> {
        if !self.has_trailing_bytes() {
            return Ok(None);
        }

        let mut raw = [0u8; FRAME_HEADER_SIZE];
        if let Err(e) = self.input.read_exact(&mut raw) {
            return self.cut_short(e);
        }
        let header = FrameHeader::decode(&raw, self.position)?;

        let mut payload = vec![0u8; header.len as usize];
        if let Err(e) = self.input.read_exact(&mut payload) {
            return self.cut_short(e);
        }

        self.position += header.frame_len();
        Ok(Some((header.kind, payload)))
    }

    fn cut_short<T>(&self, err: io::Error) -> Result<Option<T>, JournalError> {
        match (err.kind(), self.mode) {
            (io::ErrorKind::UnexpectedEof, ReadMode::Permissive) => Ok(None),
            (io::ErrorKind::UnexpectedEof, ReadMode::Strict) => Err(JournalError::TruncatedFrame {
                offset: self.position,
            }),
            _ => Err(err.into()),
        }
    }

    /// Next frame of a known kind, decoded as JSON; unknown kinds are skipped.
    pub fn read_json(&mut self) -> Result<Option<(FrameKind, Value)>, JournalError> {
        while let Some((kind, payload)) = self.read_frame()? {
            if let FrameKind::Unknown(_) = kind {
                continue;
            }
            let text = std::str::from_utf8(&payload)?;
            return Ok(Some((kind, serde_json::from_str(text)?)));
        }
        Ok(None)
    }
}
