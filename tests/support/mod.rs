//! Fixtures shared by the integration tests.
#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, OnceLock};

use rsa::RsaPrivateKey;
use zeroize::Zeroizing;

use ledgerseal::audit::MemoryAuditLog;
use ledgerseal::config::Config;
use ledgerseal::crypto::wrap::{private_key_to_pem, public_key_to_pem};
use ledgerseal::crypto::KeyProtector;
use ledgerseal::identity::CallerId;
use ledgerseal::keys::store::KeyStore;
use ledgerseal::keys::vault::KeyVault;
use ledgerseal::ledger::MemoryLedger;
use ledgerseal::pipeline::Pipeline;

static KEY_1: OnceLock<RsaPrivateKey> = OnceLock::new();
static KEY_2: OnceLock<RsaPrivateKey> = OnceLock::new();

fn generate() -> RsaPrivateKey {
    RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).expect("RSA-2048 generation")
}

/// Recipient key pair used by most scenarios.
pub fn key_1() -> &'static RsaPrivateKey {
    KEY_1.get_or_init(generate)
}

/// Unrelated key pair.
pub fn key_2() -> &'static RsaPrivateKey {
    KEY_2.get_or_init(generate)
}

pub fn public_pem(key: &RsaPrivateKey) -> String {
    public_key_to_pem(&key.to_public_key()).expect("encode public key")
}

pub fn private_pem(key: &RsaPrivateKey) -> String {
    private_key_to_pem(key).expect("encode private key").as_str().to_string()
}

pub fn caller(id: &str) -> CallerId {
    CallerId::parse(Some(id)).expect("valid caller")
}

pub fn server_key() -> KeyProtector {
    KeyProtector::ServerKey(Zeroizing::new([11u8; 32]))
}

pub struct Harness {
    pub pipeline: Pipeline,
    pub ledger: Arc<MemoryLedger>,
    pub audit: Arc<MemoryAuditLog>,
    pub vault: Arc<KeyVault>,
}

/// Pipeline over in-memory ledger and audit log with a vault in `dir`.
/// Every content type is accepted.
pub fn harness(dir: &Path) -> Harness {
    let config = Config {
        data_dir: dir.to_path_buf(),
        allowed_content_types: vec!["*/*".to_string()],
        ..Config::default()
    };
    let ledger = Arc::new(MemoryLedger::new(config.block_height_base));
    let audit = Arc::new(MemoryAuditLog::default());
    let vault = Arc::new(KeyVault::new(KeyStore::open(config.keys_path()), audit.clone()));
    let pipeline = Pipeline::new(config, ledger.clone(), audit.clone()).with_vault(vault.clone());
    Harness {
        pipeline,
        ledger,
        audit,
        vault,
    }
}
