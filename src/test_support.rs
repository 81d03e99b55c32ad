//! Shared fixtures for unit tests. RSA generation dominates test time, so each
//! key is generated once per test binary.

use std::sync::OnceLock;

use rsa::RsaPrivateKey;

static KEY_A: OnceLock<RsaPrivateKey> = OnceLock::new();
static KEY_B: OnceLock<RsaPrivateKey> = OnceLock::new();

fn generate() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("RSA-2048 generation")
}

pub fn key_a() -> &'static RsaPrivateKey {
    KEY_A.get_or_init(generate)
}

pub fn key_b() -> &'static RsaPrivateKey {
    KEY_B.get_or_init(generate)
}
