//! UID digests joining instances to their definition records.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
const UID_LENGTH: usize = 16;

fn digest(values: &[&str]) -> String {
    use std::fmt::Write;

    let mut hasher = Sha256::new();
    for value in values {
        hasher.update(value.as_bytes());
    }
    let bytes = hasher.finalize();
    let mut out = String::with_capacity(UID_LENGTH);
    for byte in bytes.iter().take(UID_LENGTH / 2) {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// UID of a part definition or part instance.
pub fn part_uid(
    document_id: &str,
    document_microversion: &str,
    element_id: &str,
    part_id: &str,
    full_configuration: &str,
) -> String {
    digest(&[
        document_id,
        document_microversion,
        element_id,
        part_id,
        full_configuration,
    ])
}

/// UID of a sub-assembly definition or assembly instance (no part id).
pub fn assembly_uid(
    document_id: &str,
    document_microversion: &str,
    element_id: &str,
    full_configuration: &str,
) -> String {
    digest(&[document_id, document_microversion, element_id, full_configuration])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_16_hex_chars() {
        let uid = part_uid("d", "m", "e", "p", "cfg");
        assert_eq!(uid.len(), 16);
        assert!(uid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_concatenation_sensitive() {
        // Same joined string, same digest: the key is the concatenation.
        assert_eq!(part_uid("ab", "c", "", "", ""), part_uid("a", "bc", "", "", ""));
        assert_ne!(
            assembly_uid("doc1", "m", "e", ""),
            assembly_uid("doc2", "m", "e", "")
        );
    }

    #[test]
    fn part_and_assembly_uids_differ() {
        assert_ne!(
            part_uid("d", "m", "e", "p", "c"),
            assembly_uid("d", "m", "e", "c")
        );
    }
}
