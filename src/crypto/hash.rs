/// SHA-256 digests used to seal ledger records and to fingerprint keys.
use sha2::{Digest, Sha256};

/// Display length of a key fingerprint: 16 colon-separated octets.
pub const FINGERPRINT_LEN: usize = 47;

/// Lower-case hex SHA-256 of `bytes`, no separators.
pub fn digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Colon-hex SHA-256 of the PEM text, truncated to [`FINGERPRINT_LEN`].
///
/// The digest covers the exact PEM characters (header, line breaks and all),
/// not the decoded DER, so two PEM renderings of one key fingerprint differently.
pub fn fingerprint_of(pem_text: &str) -> String {
    let hash = Sha256::digest(pem_text.as_bytes());
    let mut out = hash
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(":");
    out.truncate(FINGERPRINT_LEN);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_digest_known_vector() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = fingerprint_of("-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----");
        assert_eq!(fp.len(), FINGERPRINT_LEN);
        assert_eq!(fp.matches(':').count(), 15, "16 octets joined by 15 colons");
        assert!(fp
            .split(':')
            .all(|octet| octet.len() == 2 && octet.chars().all(|c| c.is_ascii_hexdigit())));
    }

    #[test]
    fn test_fingerprint_is_prefix_of_colon_digest() {
        let text = "abc";
        let fp = fingerprint_of(text);
        assert!(fp.starts_with("ba:78:16:bf"), "got {}", fp);
        assert_eq!(fp.replace(':', ""), digest(text.as_bytes())[..32]);
    }

    proptest! {
        #[test]
        fn prop_digest_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(digest(&data), digest(&data));
            prop_assert_eq!(digest(&data).len(), 64);
        }

        #[test]
        fn prop_single_byte_change_changes_digest(
            data in proptest::collection::vec(any::<u8>(), 1..2048),
            idx in any::<prop::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut altered = data.clone();
            let i = idx.index(altered.len());
            altered[i] ^= flip;
            prop_assert_ne!(digest(&data), digest(&altered));
        }

        #[test]
        fn prop_fingerprint_is_stable(text in ".{0,256}") {
            prop_assert_eq!(fingerprint_of(&text), fingerprint_of(&text));
        }
    }
}
