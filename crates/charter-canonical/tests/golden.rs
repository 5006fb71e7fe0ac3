use charter_canonical::{
    canonicalizer::Canonicalizer, compute_content_digest, hash_parts, Digest, DigestAlg,
    ProfileId,
};
use serde_json::json;
use sha2::{Digest as _, Sha256};

#[test]
fn digest_serializes_to_golden_json() {
    let digest = Digest::zero();

    assert_eq!(
        serde_json::to_string(&digest).unwrap(),
        r#"{"alg":"sha-256","b64":"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"}"#
    );
}

#[test]
fn canonicalizer_produces_ordered_bytes() {
    let profile = ProfileId::parse("profileid000000001").unwrap();
    let canonicalizer = Canonicalizer::new(profile);
    let value = json!({"b": 1, "a": {"nested": 2}});
    let bytes = canonicalizer.canonicalize(&value).unwrap();
    assert_eq!(bytes, br#"{"a":{"nested":2},"b":1}"#.to_vec());
}

#[test]
fn content_digest_matches_manual_sha256() {
    let canonicalizer = Canonicalizer::v1();
    let value = json!({"z": "1", "a": "2"});
    let digest = compute_content_digest(b"golden:v1\0", &value, &[], &canonicalizer).unwrap();

    let mut hasher = Sha256::new();
    hasher.update(b"golden:v1\0");
    hasher.update(br#"{"a":"2","z":"1"}"#);
    let expected: [u8; 32] = hasher.finalize().into();

    assert_eq!(digest.to_bytes().unwrap(), expected);
    assert_eq!(hex::encode(hash_parts(b"golden:v1\0", &[br#"{"a":"2","z":"1"}"#])), hex::encode(expected));
}

#[test]
fn digest_rejects_padding_and_foreign_alphabet() {
    assert!(Digest::new(DigestAlg::Sha256, "A".repeat(42) + "=").is_err());
    assert!(Digest::new(DigestAlg::Sha256, "A".repeat(42) + "+").is_err());
}
