use std::fmt;
use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::validation::ValidationError;

/// Length in bytes of every digest the ledger produces.
pub const DIGEST_LEN: usize = 32;

/// Supported digest algorithms for canonical identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigestAlg {
    /// SHA-256 (the only algorithm in hash layout v1).
    #[serde(rename = "sha-256")]
    Sha256,
}

/// Algorithm + bytes digest, encoded as base64url without padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest {
    /// Digest algorithm (currently always `sha-256`).
    pub alg: DigestAlg,
    /// Base64URL (no padding) digest bytes.
    #[serde(rename = "b64")]
    pub b64: String,
}

fn digest_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{43}$").expect("invalid regex"))
}

impl Digest {
    /// Constructs a validated digest from its base64url text.
    pub fn new(alg: DigestAlg, b64: impl Into<String>) -> Result<Self, ValidationError> {
        let b64 = b64.into();
        if !digest_pattern().is_match(&b64) {
            return Err(ValidationError::PatternMismatch {
                field: "digest",
                value: b64,
            });
        }
        Ok(Digest { alg, b64 })
    }

    /// Wraps raw SHA-256 output.
    pub fn from_bytes(bytes: &[u8; DIGEST_LEN]) -> Self {
        Digest {
            alg: DigestAlg::Sha256,
            b64: URL_SAFE_NO_PAD.encode(bytes),
        }
    }

    /// The all-zero digest used as the genesis event's `prev_hash`.
    pub fn zero() -> Self {
        Self::from_bytes(&[0u8; DIGEST_LEN])
    }

    /// Decodes the digest back into raw bytes.
    pub fn to_bytes(&self) -> Result<[u8; DIGEST_LEN], ValidationError> {
        let decoded =
            URL_SAFE_NO_PAD
                .decode(self.b64.as_bytes())
                .map_err(|e| ValidationError::Undecodable {
                    field: "digest",
                    reason: e.to_string(),
                })?;
        decoded
            .as_slice()
            .try_into()
            .map_err(|_| ValidationError::Undecodable {
                field: "digest",
                reason: format!("expected {} bytes, got {}", DIGEST_LEN, decoded.len()),
            })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha-256:{}", self.b64)
    }
}
