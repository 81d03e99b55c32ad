use rsa::RsaPublicKey;

use crate::crypto::{fingerprint_of, wrap::public_key_to_pem};
use crate::error::SealResult;

/// Fingerprint of a public key as rendered by this crate's PEM encoder.
///
/// Two independently loaded copies of one key always agree, because the PEM
/// text is regenerated from the key rather than taken from the caller.
pub fn key_fingerprint(public_key: &RsaPublicKey) -> SealResult<String> {
    Ok(fingerprint_of(&public_key_to_pem(public_key)?))
}

/// First four octets of a fingerprint, for table columns.
pub fn short_fingerprint(fingerprint: &str) -> &str {
    let end = fingerprint.len().min(11);
    &fingerprint[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{key_a, key_b};

    #[test]
    fn test_key_fingerprint_stable_and_distinct() {
        let a1 = key_fingerprint(&key_a().to_public_key()).unwrap();
        let a2 = key_fingerprint(&key_a().to_public_key()).unwrap();
        let b = key_fingerprint(&key_b().to_public_key()).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn test_short_fingerprint() {
        assert_eq!(short_fingerprint("ab:cd:ef:01:23:45"), "ab:cd:ef:01");
        assert_eq!(short_fingerprint("ab:cd"), "ab:cd");
    }
}
