//! Domain-separated hashing.
//!
//! Content digests are computed as `sha256(domain_separator || canonical_bytes(value))`.
//! Every caller supplies its own NUL-terminated separator so that bytes hashed
//! for one purpose can never be replayed as another.

use crate::{CanonicalizationError, Canonicalizer, Digest, DIGEST_LEN};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest as Sha2Digest, Sha256};

/// Computes the content digest of a serializable value.
///
/// Fields named in `exclude` are removed from the top-level object before
/// hashing (used for self-referential identifiers). All JSON numbers are
/// stringified first so the canonical bytes never depend on float formatting.
///
/// # Example
///
/// ```rust
/// use charter_canonical::{compute_content_digest, Canonicalizer};
/// use serde_json::json;
///
/// let value = json!({"sequence": 1, "event_type": "petition.submitted"});
/// let digest = compute_content_digest(b"example:v1\0", &value, &[], &Canonicalizer::v1())?;
/// assert_eq!(digest.b64.len(), 43);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Errors
///
/// Returns [`HashError`] if serialization or canonicalization fails.
pub fn compute_content_digest<T: Serialize>(
    domain: &[u8],
    value: &T,
    exclude: &[&str],
    canonicalizer: &Canonicalizer,
) -> Result<Digest, HashError> {
    let mut value: Value =
        serde_json::to_value(value).map_err(|e| HashError::Serialization(e.to_string()))?;

    if let Value::Object(map) = &mut value {
        for field in exclude {
            map.remove(*field);
        }
    }

    stringify_numbers(&mut value);

    let bytes = canonicalizer.canonicalize(&value)?;
    Ok(Digest::from_bytes(&hash_parts(domain, &[&bytes])))
}

/// Hashes `domain || parts[0] || parts[1] ...` with SHA-256.
pub fn hash_parts(domain: &[u8], parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Error during content digest computation.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// Serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
    /// Canonicalization failed.
    #[error("canonicalization failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

/// Recursively converts all JSON numbers into strings.
fn stringify_numbers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            let s = n.to_string();
            *value = Value::String(s);
        }
        Value::Array(arr) => {
            for v in arr {
                stringify_numbers(v);
            }
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                stringify_numbers(v);
            }
        }
        _ => {}
    }
}
