use charter_canonical::Digest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Witness signature attached to an event.
///
/// The ledger treats the bytes as opaque; algorithms and key custody belong to
/// the external signing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Signature algorithm (e.g., "ed25519", "ecdsa-p256-sha256").
    pub alg: String,
    /// Key identifier (e.g., DID, KMS key ARN, x509 thumbprint).
    pub key_id: String,
    /// Signature bytes (base64url-no-pad).
    pub sig: String,
}

/// Error reported by a signing service.
#[derive(Debug, Error)]
#[error("signer unavailable: {0}")]
pub struct SignerError(pub String);

/// Capability that witnesses an event hash at append time.
pub trait Signer: Send + Sync {
    /// Signs the event hash.
    fn sign(&self, event_hash: &Digest) -> Result<Signature, SignerError>;
}
