//! Append-only framed journal backing the Charter ledger.
//!
//! This crate provides:
//! - A 16-byte file header (`CHJ1`, version, reserved flags)
//! - Length-prefixed frames tagged with a kind byte (event, control, halt state)
//! - Reader/writer APIs with strict and permissive truncation handling
//!
//! The journal is deliberately ignorant of ledger semantics: it stores JSON
//! frames and never rewrites or removes a complete frame.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use charter_journal::{FrameKind, JournalReader, JournalWriter, ReadMode, WriteOptions};
//! use serde_json::json;
//!
//! let mut writer = JournalWriter::open("ledger.chj", WriteOptions::default())?;
//! writer.append_json(FrameKind::Event, &json!({"sequence": "1"}))?;
//! writer.finish()?;
//!
//! let mut reader = JournalReader::open("ledger.chj", ReadMode::Strict)?;
//! while let Some((kind, record)) = reader.read_json()? {
//!     println!("{:?}: {}", kind, record);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Error types for journal operations.
pub mod errors;
/// Frame structure and serialization.
pub mod frame;
/// Journal reader implementation.
pub mod reader;
/// Journal writer implementation.
pub mod writer;

pub use errors::JournalError;
pub use frame::{FrameHeader, FrameKind, JournalHeader};
pub use reader::{JournalReader, ReadMode};
pub use writer::{JournalWriter, WriteOptions};
