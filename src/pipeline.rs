//! Encrypt and decrypt/verify orchestration.
//!
//! Encrypt: validate, digest, seal with a fresh AES key, wrap the key for the
//! recipient, then insert a confirmed ledger record. The record insert is the
//! only persistent write and happens last, so a failure at any earlier step
//! leaves nothing behind.
//!
//! Decrypt: look the record up, require it to be confirmed, unwrap, open,
//! re-digest and compare. Plaintext is returned only when every step passes.
//!
//! Both directions write a session row and an audit entry whatever the outcome.

use std::path::Path;
use std::sync::Arc;

use base64::Engine;
use chrono::Utc;
use uuid::Uuid;

use crate::audit::{
    AuditAction, AuditEntry, AuditLog, DecryptionSession, EncryptionSession, SessionStatus,
};
use crate::config::{content_type_for, Config};
use crate::crypto::wrap::{private_key_from_pem, public_key_from_pem};
use crate::crypto::{cipher, digest, unwrap_key, wrap_key, SymmetricKey};
use crate::error::{SealError, SealResult};
use crate::identity::CallerId;
use crate::keys::fingerprint::key_fingerprint;
use crate::keys::vault::KeyVault;
use crate::ledger::LedgerStore;
use crate::record::{LedgerRecord, RecordDraft, RecordMetadata, RecordStatus};

pub struct EncryptRequest<'a> {
    pub file_name: &'a str,
    pub content: &'a [u8],
    pub public_key_pem: &'a str,
    /// Defaults to the caller.
    pub recipient: Option<&'a CallerId>,
}

#[derive(Debug)]
pub struct EncryptOutcome {
    pub record: LedgerRecord,
    /// nonce(12) || ciphertext || tag(16)
    pub encrypted: Vec<u8>,
    pub encrypted_file_name: String,
}

pub struct DecryptRequest<'a> {
    pub transaction_id: &'a str,
    pub encrypted: &'a [u8],
    pub private_key_pem: &'a str,
}

pub struct DecryptOutcome {
    pub plaintext: Vec<u8>,
    pub original_file_name: String,
    pub file_hash: String,
    pub verification_passed: bool,
}

impl std::fmt::Debug for DecryptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecryptOutcome")
            .field("plaintext", &format_args!("<{} bytes>", self.plaintext.len()))
            .field("original_file_name", &self.original_file_name)
            .field("file_hash", &self.file_hash)
            .field("verification_passed", &self.verification_passed)
            .finish()
    }
}

/// Name of the encrypted artifact: the extension is replaced by `.enc`.
pub fn encrypted_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .with_extension("enc")
        .to_string_lossy()
        .into_owned()
}

pub struct Pipeline {
    config: Config,
    ledger: Arc<dyn LedgerStore>,
    audit: Arc<dyn AuditLog>,
    vault: Option<Arc<KeyVault>>,
}

#[derive(Default)]
struct DecryptTrace {
    fingerprint: Option<String>,
    file_hash: Option<String>,
    file_name: Option<String>,
}

impl Pipeline {
    pub fn new(config: Config, ledger: Arc<dyn LedgerStore>, audit: Arc<dyn AuditLog>) -> Self {
        Pipeline {
            config,
            ledger,
            audit,
            vault: None,
        }
    }

    /// Refuse to encrypt to vault keys that are no longer active.
    pub fn with_vault(mut self, vault: Arc<KeyVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    pub fn audit_log(&self) -> &Arc<dyn AuditLog> {
        &self.audit
    }

    fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(entry) {
            tracing::error!(error = %e, "failed to append audit entry");
        }
    }

    /// Content type and size checks, run before any cryptography.
    pub fn validate_upload(&self, file_name: &str, file_size: u64) -> SealResult<()> {
        let config = &self.config;
        if file_name.trim().is_empty() {
            return Err(SealError::Validation("file name is required".into()));
        }
        if file_size > config.max_file_size {
            return Err(SealError::Validation(format!(
                "file is {} bytes, the limit is {} bytes",
                file_size, config.max_file_size
            )));
        }
        let content_type = content_type_for(file_name);
        if !config.allows_content_type(content_type) {
            return Err(SealError::Validation(format!(
                "content type {} is not accepted",
                content_type
            )));
        }
        Ok(())
    }

    pub fn encrypt(&self, caller: &CallerId, req: EncryptRequest<'_>) -> SealResult<EncryptOutcome> {
        let file_size = req.content.len() as u64;
        let mut fingerprint = None;
        let result = self.encrypt_steps(caller, &req, &mut fingerprint);

        let (status, error_message) = match &result {
            Ok(out) => {
                tracing::info!(
                    owner = %caller,
                    tx_id = %out.record.transaction_id,
                    block = out.record.block_number,
                    file_size,
                    "file encrypted"
                );
                (SessionStatus::Completed, None)
            }
            Err(e) => {
                tracing::warn!(owner = %caller, file_size, error = %e, "encryption failed");
                (SessionStatus::Failed, Some(e.to_string()))
            }
        };

        let record = result.as_ref().ok().map(|out| &out.record);
        let session = EncryptionSession {
            id: Uuid::new_v4(),
            user_id: caller.as_str().to_string(),
            transaction_id: record.map(|r| r.transaction_id.clone()),
            file_name: req.file_name.to_string(),
            file_size,
            public_key_fingerprint: fingerprint,
            file_hash: record.map(|r| r.file_hash.clone()),
            status,
            error_message: error_message.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.audit.record_encryption(session) {
            tracing::error!(error = %e, "failed to record encryption session");
        }

        let resource = record
            .map(|r| r.transaction_id.clone())
            .unwrap_or_else(|| "-".to_string());
        let mut entry = AuditEntry::new(caller, AuditAction::FileEncrypt, "file", resource)
            .details(serde_json::json!({
                "file_name": req.file_name,
                "file_size": file_size,
            }));
        if let Some(message) = error_message {
            entry = entry.failed(message);
        }
        self.audit(entry);

        result
    }

    fn encrypt_steps(
        &self,
        caller: &CallerId,
        req: &EncryptRequest<'_>,
        fingerprint_out: &mut Option<String>,
    ) -> SealResult<EncryptOutcome> {
        let file_size = req.content.len() as u64;
        self.validate_upload(req.file_name, file_size)?;

        let public_key = public_key_from_pem(req.public_key_pem)?;
        let fingerprint = key_fingerprint(&public_key)?;
        *fingerprint_out = Some(fingerprint.clone());
        if let Some(vault) = &self.vault {
            vault.ensure_usable(&fingerprint)?;
        }

        let file_hash = digest(req.content);
        let key = SymmetricKey::generate();
        let encrypted = cipher::seal(req.content, &key)?;
        let wrapped = wrap_key(&key, &public_key)?;
        tracing::debug!(%fingerprint, "symmetric key wrapped");

        let recipient = req.recipient.unwrap_or(caller);
        let draft = RecordDraft::new(
            file_hash,
            base64::engine::general_purpose::STANDARD.encode(wrapped),
            caller.as_str(),
            recipient.as_str(),
            RecordMetadata::new(req.file_name, file_size, fingerprint),
        );
        let record = self.ledger.insert(draft, RecordStatus::Confirmed)?;

        Ok(EncryptOutcome {
            encrypted_file_name: encrypted_file_name(req.file_name),
            record,
            encrypted,
        })
    }

    pub fn decrypt(&self, caller: &CallerId, req: DecryptRequest<'_>) -> SealResult<DecryptOutcome> {
        let mut trace = DecryptTrace::default();
        let result = self.decrypt_steps(&req, &mut trace);

        let (status, error_message) = match &result {
            Ok(_) => {
                tracing::info!(owner = %caller, tx_id = %req.transaction_id, "file decrypted and verified");
                (SessionStatus::Completed, None)
            }
            Err(e @ SealError::IntegrityVerification { .. }) => {
                tracing::warn!(owner = %caller, tx_id = %req.transaction_id, error = %e, "integrity verification failed");
                (SessionStatus::VerificationFailed, Some(e.to_string()))
            }
            Err(e) => {
                tracing::warn!(owner = %caller, tx_id = %req.transaction_id, error = %e, "decryption failed");
                (SessionStatus::Failed, Some(e.to_string()))
            }
        };

        let session = DecryptionSession {
            id: Uuid::new_v4(),
            user_id: caller.as_str().to_string(),
            transaction_id: req.transaction_id.to_string(),
            private_key_fingerprint: trace.fingerprint,
            file_hash: trace.file_hash.clone(),
            status,
            error_message: error_message.clone(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.audit.record_decryption(session) {
            tracing::error!(error = %e, "failed to record decryption session");
        }

        let mut entry = AuditEntry::new(caller, AuditAction::FileDecrypt, "file", req.transaction_id)
            .details(serde_json::json!({
                "file_name": trace.file_name,
                "file_hash": trace.file_hash,
            }));
        if let Some(message) = error_message {
            entry = entry.failed(message);
        }
        self.audit(entry);

        result
    }

    fn decrypt_steps(
        &self,
        req: &DecryptRequest<'_>,
        trace: &mut DecryptTrace,
    ) -> SealResult<DecryptOutcome> {
        let private_key = private_key_from_pem(req.private_key_pem)?;
        trace.fingerprint = key_fingerprint(&private_key.to_public_key()).ok();

        let record = self
            .ledger
            .get_by_id(req.transaction_id)?
            .ok_or_else(|| SealError::RecordNotFound(req.transaction_id.to_string()))?;
        trace.file_name = Some(record.metadata.file_name.clone());
        if record.status != RecordStatus::Confirmed {
            return Err(SealError::RecordNotConfirmed(record.transaction_id));
        }

        let wrapped = base64::engine::general_purpose::STANDARD
            .decode(&record.encrypted_symmetric_key)
            .map_err(|_| SealError::KeyUnwrap)?;
        let key = unwrap_key(&wrapped, &private_key)?;
        let plaintext = cipher::open(req.encrypted, &key)?;

        let actual = digest(&plaintext);
        trace.file_hash = Some(actual.clone());
        if actual != record.file_hash {
            return Err(SealError::IntegrityVerification {
                expected: record.file_hash,
                actual,
            });
        }

        Ok(DecryptOutcome {
            plaintext,
            original_file_name: record.metadata.file_name,
            file_hash: actual,
            verification_passed: true,
        })
    }
}
