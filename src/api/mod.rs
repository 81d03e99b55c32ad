//! Request/response boundary for the three external operations.
//!
//! Requests and responses use the camelCase JSON shapes callers already send.
//! Every failure leaves as an [`ApiError`] whose message comes from
//! [`SealError::public_message`], so decrypt-path failures are indistinguishable
//! from outside.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::FileAuditLog;
use crate::config::Config;
use crate::crypto::{KeyProtector, NONCE_LEN, TAG_LEN};
use crate::error::{ErrorClass, SealError};
use crate::identity::CallerId;
use crate::keys::store::{load_or_create_server_key, KeyStore};
use crate::keys::vault::{KeyAlgorithm, KeyVault};
use crate::ledger::FileLedger;
use crate::pipeline::{DecryptRequest, EncryptRequest, Pipeline};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeypairRequest {
    #[serde(default)]
    pub key_name: String,
    #[serde(default)]
    pub algorithm: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeypairResponse {
    pub success: bool,
    pub id: Uuid,
    pub name: String,
    pub algorithm: KeyAlgorithm,
    pub fingerprint: String,
    pub public_key: String,
    /// Present only in this response.
    pub private_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncryptFileRequest {
    #[serde(default)]
    pub file_name: String,
    #[serde(default, alias = "fileContent")]
    pub file_content_base64: String,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub public_key_pem: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct EncryptFileResponse {
    pub success: bool,
    pub blockchain_tx_id: String,
    pub file_hash: String,
    pub encrypted_file_base64: String,
    pub file_name: String,
    /// Fingerprint of the public key re-encoded as canonical PEM (LF line
    /// endings, no trailing newline), not of the submitted text. A PEM file
    /// ending in a newline hashes differently; compare against the vault's
    /// fingerprint or this value, never a hash of your own copy.
    pub public_key_fingerprint: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DecryptFileRequest {
    #[serde(default)]
    pub blockchain_tx_id: String,
    #[serde(default, alias = "encryptedFileContent")]
    pub encrypted_file_content_base64: String,
    #[serde(default)]
    pub private_key_pem: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DecryptFileResponse {
    pub success: bool,
    pub decrypted_file_base64: String,
    pub original_file_name: String,
    pub file_hash: String,
    pub verification_passed: bool,
}

/// Failure as seen by an external caller.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    #[serde(skip)]
    pub status: u16,
    pub error: String,
}

impl ApiError {
    /// `{"success":false,"error":...}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({ "success": false, "error": self.error })
    }
}

impl From<SealError> for ApiError {
    fn from(err: SealError) -> Self {
        let class = err.kind();
        if class == ErrorClass::Internal {
            tracing::error!(error = %err, "internal error");
        }
        ApiError {
            status: class.status(),
            error: err.public_message(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.error, self.status)
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GenerateKeypair,
    EncryptFile,
    DecryptFile,
}

impl FromStr for Operation {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "generate-keypair" => Ok(Operation::GenerateKeypair),
            "encrypt-file" => Ok(Operation::EncryptFile),
            "decrypt-file" => Ok(Operation::DecryptFile),
            other => Err(SealError::Validation(format!("unknown operation '{}'", other)).into()),
        }
    }
}

fn missing_fields(fields: &[(&str, bool)]) -> Result<(), ApiError> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }
    Err(SealError::Validation(format!("Missing required fields: {}", missing.join(", "))).into())
}

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, ApiError> {
    base64::engine::general_purpose::STANDARD
        .decode(value.trim())
        .map_err(|_| SealError::Validation(format!("{} is not valid base64", field)).into())
}

pub struct Service {
    config: Config,
    vault: Arc<KeyVault>,
    pipeline: Pipeline,
    protector: KeyProtector,
}

impl Service {
    pub fn new(config: Config, vault: Arc<KeyVault>, pipeline: Pipeline, protector: KeyProtector) -> Self {
        Service {
            config,
            vault,
            pipeline,
            protector,
        }
    }

    /// Service over the file-backed stores in `config.data_dir`. Private keys
    /// generated through it are sealed with the server key.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        config.ensure_data_dir()?;
        let audit = Arc::new(FileAuditLog::open(config.audit_path()));
        let ledger = Arc::new(
            FileLedger::open(config.ledger_path(), config.block_height_base)
                .with_context(|| format!("Failed to open ledger {}", config.ledger_path().display()))?,
        );
        let vault = Arc::new(KeyVault::new(KeyStore::open(config.keys_path()), audit.clone()));
        let protector = load_or_create_server_key(&config.server_key_path())
            .context("Failed to load server key")?;
        let pipeline = Pipeline::new(config.clone(), ledger, audit).with_vault(vault.clone());
        Ok(Service::new(config, vault, pipeline, protector))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn vault(&self) -> &KeyVault {
        &self.vault
    }

    /// Server-key protector used for keys generated through this service.
    pub fn server_protector(&self) -> &KeyProtector {
        &self.protector
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn generate_keypair(
        &self,
        caller: Option<&str>,
        req: GenerateKeypairRequest,
    ) -> Result<GenerateKeypairResponse, ApiError> {
        let caller = CallerId::parse(caller)?;
        missing_fields(&[("keyName", !req.key_name.trim().is_empty())])?;
        let algorithm = match req.algorithm.as_deref() {
            Some(a) => KeyAlgorithm::from_str(a)?,
            None => self.config.default_algorithm,
        };

        let generated = self
            .vault
            .generate(&caller, &req.key_name, algorithm, &self.protector)?;
        Ok(GenerateKeypairResponse {
            success: true,
            id: generated.info.id,
            name: generated.info.name,
            algorithm: generated.info.algorithm,
            fingerprint: generated.info.fingerprint,
            public_key: generated.info.public_key,
            private_key: generated.private_key.as_str().to_string(),
            created_at: generated.info.created_at,
        })
    }

    pub fn encrypt_file(
        &self,
        caller: Option<&str>,
        req: EncryptFileRequest,
    ) -> Result<EncryptFileResponse, ApiError> {
        let caller = CallerId::parse(caller)?;
        missing_fields(&[
            ("fileName", !req.file_name.trim().is_empty()),
            ("fileContentBase64", !req.file_content_base64.trim().is_empty()),
            ("fileSize", req.file_size.is_some()),
            ("publicKeyPem", !req.public_key_pem.trim().is_empty()),
        ])?;
        let content = decode_base64("fileContentBase64", &req.file_content_base64)?;
        let declared = req.file_size.unwrap_or_default();
        if declared != content.len() as u64 {
            return Err(SealError::Validation(format!(
                "fileSize {} does not match decoded content length {}",
                declared,
                content.len()
            ))
            .into());
        }

        let out = self.pipeline.encrypt(
            &caller,
            EncryptRequest {
                file_name: &req.file_name,
                content: &content,
                public_key_pem: &req.public_key_pem,
                recipient: None,
            },
        )?;
        Ok(EncryptFileResponse {
            success: true,
            blockchain_tx_id: out.record.transaction_id,
            file_hash: out.record.file_hash,
            encrypted_file_base64: base64::engine::general_purpose::STANDARD.encode(&out.encrypted),
            file_name: out.encrypted_file_name,
            public_key_fingerprint: out.record.metadata.public_key_fingerprint,
        })
    }

    pub fn decrypt_file(
        &self,
        caller: Option<&str>,
        req: DecryptFileRequest,
    ) -> Result<DecryptFileResponse, ApiError> {
        let caller = CallerId::parse(caller)?;
        missing_fields(&[
            ("blockchainTxId", !req.blockchain_tx_id.trim().is_empty()),
            (
                "encryptedFileContentBase64",
                !req.encrypted_file_content_base64.trim().is_empty(),
            ),
            ("privateKeyPem", !req.private_key_pem.trim().is_empty()),
        ])?;
        let encrypted = decode_base64(
            "encryptedFileContentBase64",
            &req.encrypted_file_content_base64,
        )?;
        if encrypted.len() < NONCE_LEN + TAG_LEN {
            return Err(SealError::Validation(format!(
                "encrypted content must be at least {} bytes",
                NONCE_LEN + TAG_LEN
            ))
            .into());
        }

        let out = self.pipeline.decrypt(
            &caller,
            DecryptRequest {
                transaction_id: req.blockchain_tx_id.trim(),
                encrypted: &encrypted,
                private_key_pem: &req.private_key_pem,
            },
        )?;
        Ok(DecryptFileResponse {
            success: true,
            decrypted_file_base64: base64::engine::general_purpose::STANDARD.encode(&out.plaintext),
            original_file_name: out.original_file_name,
            file_hash: out.file_hash,
            verification_passed: out.verification_passed,
        })
    }

    /// Dispatch a JSON request body to `operation`.
    pub fn handle_json(
        &self,
        operation: Operation,
        caller: Option<&str>,
        body: &str,
    ) -> Result<serde_json::Value, ApiError> {
        fn parse<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, ApiError> {
            serde_json::from_str(body)
                .map_err(|e| SealError::Validation(format!("invalid request body: {}", e)).into())
        }
        fn to_value<T: Serialize>(value: T) -> Result<serde_json::Value, ApiError> {
            serde_json::to_value(value).map_err(|e| SealError::Serialization(e).into())
        }

        match operation {
            Operation::GenerateKeypair => to_value(self.generate_keypair(caller, parse(body)?)?),
            Operation::EncryptFile => to_value(self.encrypt_file(caller, parse(body)?)?),
            Operation::DecryptFile => to_value(self.decrypt_file(caller, parse(body)?)?),
        }
    }
}
