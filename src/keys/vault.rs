//! KeyVault: RSA key pair generation, listing and lifecycle.
//!
//! A generated private key is handed to the caller exactly once. The stored
//! copy is sealed in a key envelope (see [`crate::crypto::key_envelope`]) and
//! only comes back out through [`KeyVault::export_private_key`] with the
//! matching protector.

use std::str::FromStr;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::audit::{AuditAction, AuditEntry, AuditLog};
use crate::crypto::key_envelope::{envelope_mode, open_private_key, seal_private_key};
use crate::crypto::wrap::{private_key_to_pem, public_key_to_pem};
use crate::crypto::{fingerprint_of, KeyProtector};
use crate::error::{SealError, SealResult};
use crate::identity::CallerId;
use crate::keys::store::KeyStore;

/// RSA modulus size. The public exponent is always 65537 and the OAEP hash
/// always SHA-256.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyAlgorithm {
    #[default]
    #[serde(rename = "RSA-2048")]
    Rsa2048,
    #[serde(rename = "RSA-4096")]
    Rsa4096,
}

impl KeyAlgorithm {
    pub fn bits(self) -> usize {
        match self {
            KeyAlgorithm::Rsa2048 => 2048,
            KeyAlgorithm::Rsa4096 => 4096,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa2048 => "RSA-2048",
            KeyAlgorithm::Rsa4096 => "RSA-4096",
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = SealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RSA-2048" | "RSA2048" | "2048" => Ok(KeyAlgorithm::Rsa2048),
            "RSA-4096" | "RSA4096" | "4096" => Ok(KeyAlgorithm::Rsa4096),
            other => Err(SealError::Validation(format!(
                "unsupported key algorithm '{}' (expected RSA-2048 or RSA-4096)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    Active,
    Revoked,
    Expired,
}

impl KeyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyStatus::Active => "active",
            KeyStatus::Revoked => "revoked",
            KeyStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key pair as persisted in the key store.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredKeyPair {
    pub id: Uuid,
    pub owner_id: String,
    pub name: String,
    pub algorithm: KeyAlgorithm,
    pub public_key: String,
    pub fingerprint: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    /// Base64 key envelope; never plaintext PEM.
    pub sealed_private_key: String,
}

/// Key pair metadata. Carries no private key material.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairInfo {
    pub id: Uuid,
    pub name: String,
    pub algorithm: KeyAlgorithm,
    pub public_key: String,
    pub fingerprint: String,
    pub status: KeyStatus,
    pub created_at: DateTime<Utc>,
    /// Which protector seals the stored private key.
    pub protection: String,
}

impl From<&StoredKeyPair> for KeyPairInfo {
    fn from(stored: &StoredKeyPair) -> Self {
        let protection = base64::engine::general_purpose::STANDARD
            .decode(&stored.sealed_private_key)
            .ok()
            .and_then(|blob| envelope_mode(&blob))
            .unwrap_or("unknown")
            .to_string();
        KeyPairInfo {
            id: stored.id,
            name: stored.name.clone(),
            algorithm: stored.algorithm,
            public_key: stored.public_key.clone(),
            fingerprint: stored.fingerprint.clone(),
            status: stored.status,
            created_at: stored.created_at,
            protection,
        }
    }
}

/// Result of key generation: the only value that ever carries private key PEM.
pub struct GeneratedKeyPair {
    pub info: KeyPairInfo,
    pub private_key: Zeroizing<String>,
}

impl std::fmt::Debug for GeneratedKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedKeyPair")
            .field("info", &self.info)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Freshly generated PEM key material, before persistence.
pub struct KeyMaterial {
    pub public_key_pem: String,
    pub private_key_pem: Zeroizing<String>,
    pub fingerprint: String,
}

/// Generate an RSA key pair and render it as SPKI / PKCS#8 PEM.
///
/// The fingerprint is taken over the public key PEM text, not the DER.
pub fn generate_key_material(algorithm: KeyAlgorithm) -> SealResult<KeyMaterial> {
    let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, algorithm.bits())
        .map_err(|e| SealError::KeyGeneration(e.to_string()))?;
    let public_key_pem = public_key_to_pem(&private_key.to_public_key())
        .map_err(|e| SealError::KeyGeneration(e.to_string()))?;
    let private_key_pem =
        private_key_to_pem(&private_key).map_err(|e| SealError::KeyGeneration(e.to_string()))?;
    let fingerprint = fingerprint_of(&public_key_pem);

    Ok(KeyMaterial {
        public_key_pem,
        private_key_pem,
        fingerprint,
    })
}

pub struct KeyVault {
    store: KeyStore,
    audit: Arc<dyn AuditLog>,
}

impl KeyVault {
    pub fn new(store: KeyStore, audit: Arc<dyn AuditLog>) -> Self {
        KeyVault { store, audit }
    }

    fn audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.append(entry) {
            tracing::error!(error = %e, "failed to append audit entry");
        }
    }

    /// Generate, seal and persist a key pair for `owner`.
    pub fn generate(
        &self,
        owner: &CallerId,
        name: &str,
        algorithm: KeyAlgorithm,
        protector: &KeyProtector,
    ) -> SealResult<GeneratedKeyPair> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SealError::Validation("key name is required".into()));
        }

        tracing::info!(owner = %owner, %algorithm, "generating key pair");
        let material = match generate_key_material(algorithm) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(owner = %owner, error = %e, "key generation failed");
                self.audit(
                    AuditEntry::new(owner, AuditAction::KeypairGenerate, "keypair", "-")
                        .failed(e.to_string()),
                );
                return Err(e);
            }
        };

        let sealed = seal_private_key(&material.private_key_pem, protector)?;
        let stored = StoredKeyPair {
            id: Uuid::new_v4(),
            owner_id: owner.as_str().to_string(),
            name: name.to_string(),
            algorithm,
            public_key: material.public_key_pem,
            fingerprint: material.fingerprint,
            status: KeyStatus::Active,
            created_at: Utc::now(),
            sealed_private_key: base64::engine::general_purpose::STANDARD.encode(sealed),
        };
        let info = KeyPairInfo::from(&stored);

        self.store.modify(|keys| {
            keys.push(stored);
            Ok(())
        })?;

        self.audit(
            AuditEntry::new(owner, AuditAction::KeypairGenerate, "keypair", info.id.to_string())
                .details(serde_json::json!({
                    "algorithm": algorithm.as_str(),
                    "fingerprint": info.fingerprint,
                })),
        );
        tracing::info!(owner = %owner, key_id = %info.id, fingerprint = %info.fingerprint, "key pair generated");

        Ok(GeneratedKeyPair {
            info,
            private_key: material.private_key_pem,
        })
    }

    /// All key pairs owned by `owner`, oldest first.
    pub fn list(&self, owner: &CallerId) -> SealResult<Vec<KeyPairInfo>> {
        let mut keys: Vec<KeyPairInfo> = self
            .store
            .load()?
            .iter()
            .filter(|k| k.owner_id == owner.as_str())
            .map(KeyPairInfo::from)
            .collect();
        keys.sort_by_key(|k| k.created_at);
        Ok(keys)
    }

    pub fn get(&self, owner: &CallerId, key_id: &str) -> SealResult<KeyPairInfo> {
        self.store
            .load()?
            .iter()
            .find(|k| k.owner_id == owner.as_str() && k.id.to_string() == key_id)
            .map(KeyPairInfo::from)
            .ok_or_else(|| SealError::KeyNotFound(key_id.to_string()))
    }

    pub fn find_by_fingerprint(
        &self,
        owner: &CallerId,
        fingerprint: &str,
    ) -> SealResult<Option<KeyPairInfo>> {
        Ok(self
            .store
            .load()?
            .iter()
            .find(|k| k.owner_id == owner.as_str() && k.fingerprint == fingerprint)
            .map(KeyPairInfo::from))
    }

    /// Reject a public key the vault knows to be revoked or expired.
    ///
    /// Keys the vault has never seen (external recipients) are allowed.
    pub fn ensure_usable(&self, fingerprint: &str) -> SealResult<()> {
        let keys = self.store.load()?;
        match keys.iter().find(|k| k.fingerprint == fingerprint) {
            Some(k) if k.status != KeyStatus::Active => Err(SealError::KeyNotActive {
                id: k.id.to_string(),
                status: k.status.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn transition(&self, owner: &CallerId, key_id: &str, to: KeyStatus) -> SealResult<KeyPairInfo> {
        let action = match to {
            KeyStatus::Revoked => AuditAction::KeypairRevoke,
            _ => AuditAction::KeypairExpire,
        };
        let result = self.store.modify(|keys| {
            let key = keys
                .iter_mut()
                .find(|k| k.owner_id == owner.as_str() && k.id.to_string() == key_id)
                .ok_or_else(|| SealError::KeyNotFound(key_id.to_string()))?;
            if key.status != KeyStatus::Active {
                return Err(SealError::InvalidStatusTransition {
                    from: key.status.to_string(),
                    to: to.to_string(),
                });
            }
            key.status = to;
            Ok(KeyPairInfo::from(&*key))
        });

        match &result {
            Ok(info) => {
                tracing::info!(owner = %owner, key_id = %info.id, status = %to, "key status changed");
                self.audit(AuditEntry::new(owner, action, "keypair", key_id));
            }
            Err(e) => self.audit(
                AuditEntry::new(owner, action, "keypair", key_id).failed(e.to_string()),
            ),
        }
        result
    }

    /// active -> revoked. Ledger records referencing the key are untouched.
    pub fn revoke(&self, owner: &CallerId, key_id: &str) -> SealResult<KeyPairInfo> {
        self.transition(owner, key_id, KeyStatus::Revoked)
    }

    /// active -> expired.
    pub fn expire(&self, owner: &CallerId, key_id: &str) -> SealResult<KeyPairInfo> {
        self.transition(owner, key_id, KeyStatus::Expired)
    }

    /// Remove the key pair permanently.
    pub fn delete(&self, owner: &CallerId, key_id: &str) -> SealResult<KeyPairInfo> {
        let result = self.store.modify(|keys| {
            let pos = keys
                .iter()
                .position(|k| k.owner_id == owner.as_str() && k.id.to_string() == key_id)
                .ok_or_else(|| SealError::KeyNotFound(key_id.to_string()))?;
            Ok(KeyPairInfo::from(&keys.remove(pos)))
        });
        let entry = AuditEntry::new(owner, AuditAction::KeypairDelete, "keypair", key_id);
        match &result {
            Ok(_) => self.audit(entry),
            Err(e) => self.audit(entry.failed(e.to_string())),
        }
        result
    }

    /// Recover the private key PEM for its owner.
    pub fn export_private_key(
        &self,
        owner: &CallerId,
        key_id: &str,
        protector: &KeyProtector,
    ) -> SealResult<Zeroizing<String>> {
        let result = self.open_sealed(owner, key_id, protector);
        let entry = AuditEntry::new(owner, AuditAction::KeypairExport, "keypair", key_id);
        match &result {
            Ok(_) => self.audit(entry),
            Err(e) => {
                tracing::warn!(owner = %owner, key_id, "private key export refused");
                self.audit(entry.failed(e.to_string()))
            }
        }
        result
    }

    fn open_sealed(
        &self,
        owner: &CallerId,
        key_id: &str,
        protector: &KeyProtector,
    ) -> SealResult<Zeroizing<String>> {
        let keys = self.store.load()?;
        let stored = keys
            .iter()
            .find(|k| k.owner_id == owner.as_str() && k.id.to_string() == key_id)
            .ok_or_else(|| SealError::KeyNotFound(key_id.to_string()))?;
        let blob = base64::engine::general_purpose::STANDARD
            .decode(&stored.sealed_private_key)
            .map_err(|e| SealError::KeyEnvelope(format!("stored envelope is not base64: {}", e)))?;
        open_private_key(&blob, protector)
    }
}
