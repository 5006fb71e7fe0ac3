//! On-disk layout.
//!
//! ```text
//! file   = header frame*
//! header = "CHJ1" | version: u16 LE | flags: u16 (0) | reserved: [0; 8]
//! frame  = kind: u8 | reserved: [0; 3] | len: u32 LE | payload: [u8; len]
//! ```
//!
//! All reserved bits must be zero; a reader that sees anything else refuses
//! the file rather than guessing at a newer layout.

use crate::errors::JournalError;

/// Magic bytes opening every journal.
pub const MAGIC: &[u8; 4] = b"CHJ1";

/// Layout version written and accepted.
pub const VERSION: u16 = 1;

/// Bytes in the file header.
pub const HEADER_SIZE: usize = 16;

/// Bytes in a frame header.
pub const FRAME_HEADER_SIZE: usize = 8;

/// Largest payload a single frame may carry (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

fn bad_header(reason: impl Into<String>) -> JournalError {
    JournalError::InvalidHeader(reason.into())
}

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    /// Layout version.
    pub version: u16,
}

impl JournalHeader {
    /// Header for the layout this crate writes.
    pub fn current() -> Self {
        Self { version: VERSION }
    }

    /// Encodes the header.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(MAGIC);
        out[4..6].copy_from_slice(&self.version.to_le_bytes());
        out
    }

    /// Decodes and validates a header.
    pub fn decode(bytes: &[u8]) -> Result<Self, JournalError> {
        let Some(bytes) = bytes.get(..HEADER_SIZE) else {
            return Err(bad_header(format!("{} bytes, need {}", bytes.len(), HEADER_SIZE)));
        };
        if &bytes[..4] != MAGIC {
            return Err(bad_header(format!("magic {:?} is not {:?}", &bytes[..4], MAGIC)));
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(bad_header(format!(
                "unsupported version 0x{:04x}, this build reads 0x{:04x}",
                version, VERSION
            )));
        }
        if bytes[6..].iter().any(|b| *b != 0) {
            return Err(bad_header("flags and reserved bytes must be zero"));
        }
        Ok(Self { version })
    }
}

/// What a frame's payload holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A ledger event.
    Event,
    /// A store control record (orphan marks, HEAD moves, rollbacks).
    Control,
    /// A durable halt flag record.
    HaltState,
    /// A kind this build does not know; readers skip it.
    Unknown(u8),
}

impl From<u8> for FrameKind {
    fn from(byte: u8) -> Self {
        match byte {
            0x01 => FrameKind::Event,
            0x02 => FrameKind::Control,
            0x03 => FrameKind::HaltState,
            other => FrameKind::Unknown(other),
        }
    }
}

impl From<FrameKind> for u8 {
    fn from(kind: FrameKind) -> Self {
        match kind {
            FrameKind::Event => 0x01,
            FrameKind::Control => 0x02,
            FrameKind::HaltState => 0x03,
            FrameKind::Unknown(other) => other,
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Payload kind.
    pub kind: FrameKind,
    /// Payload length.
    pub len: u32,
}

impl FrameHeader {
    /// Header for a payload of `len` bytes.
    pub fn for_payload(kind: FrameKind, len: usize) -> Result<Self, JournalError> {
        match u32::try_from(len) {
            Ok(len) if len <= MAX_PAYLOAD_SIZE => Ok(Self { kind, len }),
            _ => Err(JournalError::PayloadTooLarge {
                size: len,
                max: MAX_PAYLOAD_SIZE,
            }),
        }
    }

    /// Encodes the header.
    pub fn encode(&self) -> [u8; FRAME_HEADER_SIZE] {
        let mut out = [0u8; FRAME_HEADER_SIZE];
        out[0] = self.kind.into();
        out[4..].copy_from_slice(&self.len.to_le_bytes());
        out
    }

    /// Decodes a frame header read at file `offset`.
    pub fn decode(bytes: &[u8; FRAME_HEADER_SIZE], offset: u64) -> Result<Self, JournalError> {
        let invalid = |reason: String| JournalError::InvalidFrame { offset, reason };
        if bytes[1..4] != [0, 0, 0] {
            return Err(invalid("reserved bytes must be zero".into()));
        }
        let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if len > MAX_PAYLOAD_SIZE {
            return Err(invalid(format!(
                "declared length {} exceeds {}",
                len, MAX_PAYLOAD_SIZE
            )));
        }
        Ok(Self {
            kind: FrameKind::from(bytes[0]),
            len,
        })
    }

    /// Header plus payload bytes.
    pub fn frame_len(&self) -> u64 {
        FRAME_HEADER_SIZE as u64 + u64::from(self.len)
    }
}
