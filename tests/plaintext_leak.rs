/// Plaintext and key material leak detection.
///
/// Nothing persisted or returned alongside the ciphertext may contain the
/// plaintext or a private key, neither raw nor base64-encoded.
mod support;

use base64::Engine;

use ledgerseal::audit::{AuditLog, FileAuditLog};
use ledgerseal::config::Config;
use ledgerseal::keys::store::KeyStore;
use ledgerseal::keys::vault::{KeyAlgorithm, KeyVault};
use ledgerseal::ledger::FileLedger;
use ledgerseal::pipeline::{DecryptRequest, EncryptRequest, Pipeline};

use support::{caller, key_1, key_2, private_pem, public_pem, server_key};

const KNOWN: &str = "KNOWN-PLAINTEXT-abc123-MUST-NOT-APPEAR";

fn file_pipeline(config: &Config) -> Pipeline {
    let audit = std::sync::Arc::new(FileAuditLog::open(config.audit_path()));
    let ledger = std::sync::Arc::new(
        FileLedger::open(config.ledger_path(), config.block_height_base).unwrap(),
    );
    Pipeline::new(config.clone(), ledger, audit)
}

fn config_in(dir: &std::path::Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        allowed_content_types: vec!["*/*".to_string()],
        ..Config::default()
    }
}

#[test]
fn test_ciphertext_contains_no_plaintext() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = file_pipeline(&config_in(dir.path()));
    let out = pipeline
        .encrypt(
            &caller("alice"),
            EncryptRequest {
                file_name: "known.txt",
                content: KNOWN.as_bytes(),
                public_key_pem: &public_pem(key_1()),
                recipient: None,
            },
        )
        .unwrap();

    let raw = String::from_utf8_lossy(&out.encrypted);
    assert!(!raw.contains(KNOWN));
    let encoded = base64::engine::general_purpose::STANDARD.encode(&out.encrypted);
    let plain_b64 = base64::engine::general_purpose::STANDARD.encode(KNOWN);
    assert!(!encoded.contains(&plain_b64));
}

#[test]
fn test_ledger_and_audit_files_contain_no_plaintext_or_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let pipeline = file_pipeline(&config);
    let alice = caller("alice");

    let out = pipeline
        .encrypt(
            &alice,
            EncryptRequest {
                file_name: "known.txt",
                content: KNOWN.as_bytes(),
                public_key_pem: &public_pem(key_1()),
                recipient: None,
            },
        )
        .unwrap();
    pipeline
        .decrypt(
            &alice,
            DecryptRequest {
                transaction_id: &out.record.transaction_id,
                encrypted: &out.encrypted,
                private_key_pem: &private_pem(key_1()),
            },
        )
        .unwrap();
    let _ = pipeline.decrypt(
        &alice,
        DecryptRequest {
            transaction_id: &out.record.transaction_id,
            encrypted: &out.encrypted,
            private_key_pem: &private_pem(key_2()),
        },
    );

    let plain_b64 = base64::engine::general_purpose::STANDARD.encode(KNOWN);
    for path in [config.ledger_path(), config.audit_path()] {
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains(KNOWN), "{} leaks plaintext", path.display());
        assert!(!text.contains(&plain_b64), "{} leaks base64 plaintext", path.display());
        assert!(!text.contains("PRIVATE KEY"), "{} leaks a private key", path.display());
    }

    let events = FileAuditLog::open(config.audit_path()).events().unwrap();
    assert_eq!(events.len(), 6, "two entries per encrypt/decrypt attempt");
}

#[test]
fn test_key_store_holds_only_sealed_private_keys() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let audit = std::sync::Arc::new(FileAuditLog::open(config.audit_path()));
    let vault = KeyVault::new(KeyStore::open(config.keys_path()), audit);

    let pair = vault
        .generate(&caller("alice"), "leak-check", KeyAlgorithm::Rsa2048, &server_key())
        .unwrap();
    let stored = std::fs::read_to_string(config.keys_path()).unwrap();
    let pem_b64 = base64::engine::general_purpose::STANDARD.encode(pair.private_key.as_bytes());
    let body_line = pair.private_key.lines().nth(1).unwrap();

    assert!(!stored.contains("PRIVATE KEY"));
    assert!(!stored.contains(body_line));
    assert!(!stored.contains(&pem_b64[..64]));
    assert!(stored.contains(&pair.info.fingerprint));
}
