//! Canonical request fingerprints
//!
//! Idempotency and duplicate-insured detection both key their locks on a
//! digest of request content. The person-set variant hashes each person
//! independently and sorts the digests, so two submissions listing the same
//! people in a different order collapse to the same key.

use sha2::{Digest, Sha256};

/// Hex SHA-256 over the given parts, joined with a separator that cannot
/// occur in the inputs' canonical forms.
pub fn fingerprint<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_ref().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Order-insensitive digest of a set of person identity tuples.
///
/// Each tuple is fingerprinted on its own; the per-person digests are sorted
/// and concatenated into a final digest.
pub fn person_set_fingerprint<S: AsRef<str>>(people: &[Vec<S>]) -> String {
    let mut hashes: Vec<String> = people
        .iter()
        .map(|person| fingerprint(person.as_slice()))
        .collect();
    hashes.sort();
    fingerprint(&hashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint(&["ORD-1", "producer-a"]);
        let b = fingerprint(&["ORD-1", "producer-a"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_distinguishes_boundaries() {
        assert_ne!(fingerprint(&["ab", "c"]), fingerprint(&["a", "bc"]));
    }

    #[test]
    fn person_set_ignores_listing_order() {
        let alice = vec!["Alice", "idcard", "110101199006154213"];
        let bob = vec!["Bob", "passport", "E12345678"];
        let forward = person_set_fingerprint(&[alice.clone(), bob.clone()]);
        let reversed = person_set_fingerprint(&[bob, alice]);
        assert_eq!(forward, reversed);
    }

    #[test]
    fn person_set_detects_identity_changes() {
        let base = person_set_fingerprint(&[vec!["Alice", "idcard", "110101199006154213"]]);
        let other = person_set_fingerprint(&[vec!["Alice", "idcard", "110101198512304528"]]);
        assert_ne!(base, other);
    }
}
