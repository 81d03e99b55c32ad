//! Crypto module: SHA-256 digests, AES-256-GCM bulk encryption, RSA-OAEP key
//! wrapping, and the passphrase/server-key envelope that protects stored
//! private keys.
//!
//! Every primitive is synchronous and CPU bound. Nothing here touches disk or
//! the ledger; orchestration lives in [`crate::pipeline`].

pub mod cipher;
pub mod hash;
pub mod key_envelope;
pub mod wrap;

pub use cipher::{SymmetricKey, KEY_LEN, NONCE_LEN, TAG_LEN};
pub use hash::{digest, fingerprint_of, FINGERPRINT_LEN};
pub use key_envelope::KeyProtector;
pub use wrap::{unwrap_key, wrap_key};
