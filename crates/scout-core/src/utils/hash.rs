//! Blake3 hashing utilities for request fingerprints.
//!
//! A fingerprint identifies a request by method, path and query parameters so
//! identical reads share one cache slot.

use std::collections::BTreeMap;

/// Fingerprint a request.
///
/// Parameters are taken from a `BTreeMap`, so insertion order never changes the key.
pub fn fingerprint(method: &str, path: &str, query: &BTreeMap<String, String>) -> String {
    let mut hasher = blake3::Hasher::new();
    update_field(&mut hasher, method);
    update_field(&mut hasher, path.trim_start_matches('/'));
    for (key, value) in query {
        update_field(&mut hasher, key);
        update_field(&mut hasher, value);
    }
    hasher.finalize().to_hex().to_string()
}

// Length-prefixed so field boundaries cannot be forged by the content.
fn update_field(hasher: &mut blake3::Hasher, field: &str) {
    hasher.update(&(field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_fingerprint_is_hex_digest() {
        let hash = fingerprint("GET", "platforms", &BTreeMap::new());

        assert_eq!(hash.len(), 64); // 32 bytes = 64 hex chars
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fingerprint_ignores_parameter_order() {
        let a = params(&[("q", "serde"), ("page", "2")]);
        let b = params(&[("page", "2"), ("q", "serde")]);

        assert_eq!(fingerprint("GET", "search", &a), fingerprint("GET", "search", &b));
    }

    #[test]
    fn test_fingerprint_slashes() {
        let empty = BTreeMap::new();
        // Only the leading slash is dropped when the URL is built
        assert_eq!(
            fingerprint("GET", "/platforms", &empty),
            fingerprint("GET", "platforms", &empty)
        );
        assert_ne!(
            fingerprint("GET", "npm/react/", &empty),
            fingerprint("GET", "npm/react", &empty)
        );
    }

    #[test]
    fn test_fingerprint_distinguishes_requests() {
        let empty = BTreeMap::new();
        let paged = params(&[("page", "2")]);

        assert_ne!(
            fingerprint("GET", "npm/react", &empty),
            fingerprint("GET", "npm/react", &paged)
        );
        assert_ne!(
            fingerprint("GET", "npm/react", &empty),
            fingerprint("HEAD", "npm/react", &empty)
        );
        // "a=b" + "c" must not collide with "a" + "b=c"
        assert_ne!(
            fingerprint("GET", "x", &params(&[("a", "b=c")])),
            fingerprint("GET", "x", &params(&[("a=b", "c")]))
        );
    }
}
