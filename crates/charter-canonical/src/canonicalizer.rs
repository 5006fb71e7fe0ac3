use serde_json::Value;

use crate::identifiers::ProfileId;

/// Profile identifier of hash layout v1.
pub const CANONICAL_PROFILE_V1: &str = "charter-canonical-v1";

/// Deepest nesting accepted in hashed JSON.
pub const MAX_DEPTH: usize = 64;

/// Canonicalization failures; the payload is an RFC 6901 pointer.
#[derive(thiserror::Error, Debug)]
pub enum CanonicalizationError {
    /// Hashed values carry integers only; floats have no stable text form.
    #[error("floating-point number at {0}")]
    FloatNotAllowed(String),
    /// Nesting beyond [`MAX_DEPTH`].
    #[error("nesting deeper than {max} at {0}", max = MAX_DEPTH)]
    TooDeep(String),
    /// The RFC 8785 encoder failed.
    #[error("RFC 8785 encoding failed: {0}")]
    Encoder(String),
}

fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Rejects values whose canonical text would not be reproducible.
fn check(root: &Value) -> Result<(), CanonicalizationError> {
    let mut pending: Vec<(&Value, String, usize)> = vec![(root, String::new(), 0)];
    while let Some((value, pointer, depth)) = pending.pop() {
        if depth > MAX_DEPTH {
            return Err(CanonicalizationError::TooDeep(pointer));
        }
        match value {
            Value::Number(n) if !(n.is_i64() || n.is_u64()) => {
                return Err(CanonicalizationError::FloatNotAllowed(pointer));
            }
            Value::Object(map) => pending.extend(
                map.iter()
                    .map(|(k, v)| (v, format!("{}/{}", pointer, escape_token(k)), depth + 1)),
            ),
            Value::Array(items) => pending.extend(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (v, format!("{}/{}", pointer, i), depth + 1)),
            ),
            _ => {}
        }
    }
    Ok(())
}

/// Emits RFC 8785 (JCS) bytes for hashing.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    profile: ProfileId,
}

impl Canonicalizer {
    /// Canonicalizer tagged with `profile`.
    pub fn new(profile: ProfileId) -> Self {
        Self { profile }
    }

    /// Canonicalizer for hash layout v1.
    pub fn v1() -> Self {
        Self::new(ProfileId::new(CANONICAL_PROFILE_V1.to_string()))
    }

    /// Profile this canonicalizer was built for.
    pub fn profile(&self) -> &ProfileId {
        &self.profile
    }

    /// Canonical bytes of `value`.
    pub fn canonicalize(&self, value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
        check(value)?;
        canonical_json::to_string(value)
            .map(String::into_bytes)
            .map_err(|e| CanonicalizationError::Encoder(e.to_string()))
    }
}
