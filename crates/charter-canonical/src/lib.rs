//! Canonical data model primitives for the Charter ledger.
//!
//! Every byte that participates in hashing is produced by this crate: the
//! RFC 8785 canonicalizer, the `Digest` encoding, identifier newtypes and the
//! domain-separated hash helpers. The layouts here are versioned and fixed;
//! changing any of them changes every event hash in an existing ledger.
//!
#![deny(missing_docs)]

/// Canonicalization helpers for deterministic hashing.
pub mod canonicalizer;
/// Digest primitives.
pub mod digest;
/// Domain-separated hashing over canonical bytes.
pub mod hashing;
/// Identifier newtypes (principals, event types, timestamps, profiles).
pub mod identifiers;
/// Validation helpers used by canonical types.
pub mod validation;

pub use canonicalizer::{CanonicalizationError, Canonicalizer, CANONICAL_PROFILE_V1, MAX_DEPTH};
pub use digest::{Digest, DigestAlg, DIGEST_LEN};
pub use hashing::{compute_content_digest, hash_parts, HashError};
pub use identifiers::{EventType, PrincipalId, ProfileId, Timestamp, GOVERNANCE_PREFIX};
pub use validation::ValidationError;
