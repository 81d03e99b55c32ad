//! LedgerRecord: the immutable metadata describing one encryption event.
//!
//! A record is built as a [`RecordDraft`] by the encrypt pipeline and only
//! becomes a [`LedgerRecord`] when a ledger store assigns it a block number.
//! Once confirmed, nothing about it changes; it is what a later decrypt
//! verifies against.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Bulk cipher recorded in every record's metadata.
pub const ENCRYPTION_ALGORITHM: &str = "AES-256-GCM";
/// Key wrapping scheme recorded in every record's metadata.
pub const KEY_ALGORITHM: &str = "RSA-OAEP";

/// Fixed part of a record's cost.
pub const BASE_COST: u64 = 21_000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Confirmed,
    Failed,
}

impl RecordStatus {
    /// Only a pending record may change status, and only to confirmed or failed.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::Pending, RecordStatus::Confirmed)
                | (RecordStatus::Pending, RecordStatus::Failed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Confirmed => "confirmed",
            RecordStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordMetadata {
    pub file_name: String,
    pub file_size: u64,
    pub public_key_fingerprint: String,
    pub encryption_algorithm: String,
    pub key_algorithm: String,
}

impl RecordMetadata {
    pub fn new(file_name: impl Into<String>, file_size: u64, fingerprint: impl Into<String>) -> Self {
        RecordMetadata {
            file_name: file_name.into(),
            file_size,
            public_key_fingerprint: fingerprint.into(),
            encryption_algorithm: ENCRYPTION_ALGORITHM.to_string(),
            key_algorithm: KEY_ALGORITHM.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    /// `0x` followed by 64 lower-case hex characters.
    pub transaction_id: String,
    pub block_number: u64,
    /// Lower-case hex SHA-256 of the plaintext.
    pub file_hash: String,
    /// Base64 RSA-OAEP ciphertext of the AES key.
    pub encrypted_symmetric_key: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub cost: u64,
    pub status: RecordStatus,
    pub metadata: RecordMetadata,
    pub timestamp: DateTime<Utc>,
}

/// Everything about a record except what the ledger assigns at insert time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub transaction_id: String,
    pub file_hash: String,
    pub encrypted_symmetric_key: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub cost: u64,
    pub metadata: RecordMetadata,
}

impl RecordDraft {
    /// Draft with a fresh transaction id and the cost derived from `metadata.file_size`.
    pub fn new(
        file_hash: String,
        encrypted_symmetric_key: String,
        sender_id: impl Into<String>,
        recipient_id: impl Into<String>,
        metadata: RecordMetadata,
    ) -> Self {
        RecordDraft {
            transaction_id: new_transaction_id(),
            file_hash,
            encrypted_symmetric_key,
            sender_id: sender_id.into(),
            recipient_id: recipient_id.into(),
            cost: compute_cost(metadata.file_size),
            metadata,
        }
    }

    pub fn into_record(
        self,
        block_number: u64,
        status: RecordStatus,
        timestamp: DateTime<Utc>,
    ) -> LedgerRecord {
        LedgerRecord {
            transaction_id: self.transaction_id,
            block_number,
            file_hash: self.file_hash,
            encrypted_symmetric_key: self.encrypted_symmetric_key,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            cost: self.cost,
            status,
            metadata: self.metadata,
            timestamp,
        }
    }
}

/// Random, content-independent transaction identifier.
pub fn new_transaction_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("0x{}", hex::encode(bytes))
}

/// Cost of recording `file_size` plaintext bytes.
pub fn compute_cost(file_size: u64) -> u64 {
    BASE_COST + file_size / 1000
}
