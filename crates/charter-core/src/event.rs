use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use charter_canonical::{compute_content_digest, Canonicalizer, Digest, EventType, Timestamp};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::witness::Signature;

/// Domain separator for event hashes: `b"charter:event:v1\0"`.
pub const EVENT_DOMAIN_SEPARATOR: &[u8] = b"charter:event:v1\0";

/// Version tag embedded in every hashed body.
pub const HASH_VERSION: &str = "1";

/// A single ledger event.
///
/// Events are created once by the event store and never mutated afterwards;
/// `is_orphaned` is the one field that may flip, and only during rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic, gap-free sequence number starting at 1.
    pub sequence: u64,
    /// Event tag.
    pub event_type: EventType,
    /// Opaque, type-specific payload.
    #[serde(with = "payload_b64")]
    pub payload: Vec<u8>,
    /// Wall-clock time of the appending process.
    pub local_timestamp: Timestamp,
    /// Time supplied by the trusted time authority; used for external ordering.
    pub authority_timestamp: Timestamp,
    /// Hash of the preceding event (all-zero for genesis).
    pub prev_hash: Digest,
    /// Hash of this event's canonical body.
    pub event_hash: Digest,
    /// Set when a rollback bypassed this event.
    #[serde(default)]
    pub is_orphaned: bool,
    /// Witness signature over `event_hash`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Signature>,
}

impl Event {
    /// Recomputes the hash from the event's own fields.
    pub fn recompute_hash(&self, canonicalizer: &Canonicalizer) -> Result<Digest, CoreError> {
        compute_event_hash(
            self.sequence,
            &self.event_type,
            &self.payload,
            &self.authority_timestamp,
            &self.prev_hash,
            canonicalizer,
        )
    }

    /// Decodes a JSON payload.
    pub fn payload_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, CoreError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

/// What a writer submits; the store fills in sequence, timestamps and hashes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Event tag.
    pub event_type: EventType,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
}

impl EventDraft {
    /// Creates a draft from raw payload bytes.
    pub fn new(event_type: EventType, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            event_type,
            payload: payload.into(),
        }
    }

    /// Creates a draft whose payload is the JSON encoding of `payload`.
    pub fn json<T: Serialize>(event_type: EventType, payload: &T) -> Result<Self, CoreError> {
        Ok(Self::new(event_type, serde_json::to_vec(payload)?))
    }
}

#[derive(Serialize)]
struct HashBody<'a> {
    hash_version: &'static str,
    sequence: u64,
    event_type: &'a EventType,
    payload: String,
    authority_timestamp: &'a Timestamp,
    prev_hash: &'a Digest,
}

/// Computes an event hash.
///
/// Formula: `sha256(b"charter:event:v1\0" || JCS(body))`, where body holds the
/// hash version, sequence, event type, base64url payload, authority timestamp
/// and previous hash. Numbers are stringified before canonicalization.
pub fn compute_event_hash(
    sequence: u64,
    event_type: &EventType,
    payload: &[u8],
    authority_timestamp: &Timestamp,
    prev_hash: &Digest,
    canonicalizer: &Canonicalizer,
) -> Result<Digest, CoreError> {
    let body = HashBody {
        hash_version: HASH_VERSION,
        sequence,
        event_type,
        payload: URL_SAFE_NO_PAD.encode(payload),
        authority_timestamp,
        prev_hash,
    };
    Ok(compute_content_digest(
        EVENT_DOMAIN_SEPARATOR,
        &body,
        &[],
        canonicalizer,
    )?)
}

mod payload_b64 {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        URL_SAFE_NO_PAD
            .decode(text.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
