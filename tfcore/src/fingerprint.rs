//! One-way fingerprints for secret-bearing attributes
//!
//! Sensitive values are persisted only as `sha256:<hex>` so drift can be
//! detected without keeping the secret around.

use crate::types::AttributeValue;
use sha2::{Digest, Sha256};

const PREFIX: &str = "sha256:";

pub fn fingerprint(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    format!("{}{}", PREFIX, hex::encode(hasher.finalize()))
}

pub fn is_fingerprint(value: &str) -> bool {
    value
        .strip_prefix(PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Fingerprint a plaintext value for storage or comparison against storage
pub fn seal(value: &AttributeValue) -> AttributeValue {
    match value {
        AttributeValue::String(s) => AttributeValue::String(fingerprint(s)),
        AttributeValue::List(items) => {
            AttributeValue::List(items.iter().map(|s| fingerprint(s)).collect())
        }
        AttributeValue::Bool(_) | AttributeValue::Computed => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_prefixed() {
        let a = fingerprint("abc");
        assert_eq!(
            a,
            "sha256:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(a, fingerprint("abc"));
        assert_ne!(a, fingerprint("abd"));
        assert!(is_fingerprint(&a));
    }

    #[test]
    fn seal_never_keeps_plaintext() {
        let sealed = seal(&AttributeValue::from("secret"));
        let stored = sealed.as_str().unwrap();
        assert!(!stored.contains("secret"));
        assert!(is_fingerprint(stored));
    }

    #[test]
    fn plain_strings_are_not_fingerprints() {
        assert!(!is_fingerprint("abc"));
        assert!(!is_fingerprint("sha256:xyz"));
    }
}
