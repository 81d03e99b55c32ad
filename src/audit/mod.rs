//! Audit trail: one entry per vault or pipeline action, plus per-operation
//! encryption and decryption session records.
//!
//! Entries are built with a small builder (`AuditEntry::new(..).failed(..)`)
//! and appended through the [`AuditLog`] trait. Nothing in an entry ever
//! carries plaintext or private key material.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SealResult;
use crate::identity::CallerId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    KeypairGenerate,
    KeypairRevoke,
    KeypairExpire,
    KeypairDelete,
    KeypairExport,
    FileEncrypt,
    FileDecrypt,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::KeypairGenerate => "KEYPAIR_GENERATE",
            AuditAction::KeypairRevoke => "KEYPAIR_REVOKE",
            AuditAction::KeypairExpire => "KEYPAIR_EXPIRE",
            AuditAction::KeypairDelete => "KEYPAIR_DELETE",
            AuditAction::KeypairExport => "KEYPAIR_EXPORT",
            AuditAction::FileEncrypt => "FILE_ENCRYPT",
            AuditAction::FileDecrypt => "FILE_DECRYPT",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        user: &CallerId,
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        AuditEntry {
            user_id: user.as_str().to_string(),
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            success: true,
            error_message: None,
            details: None,
            timestamp: Utc::now(),
        }
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = Some(error_message.into());
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Completed,
    Failed,
    VerificationFailed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptionSession {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_id: Option<String>,
    pub file_name: String,
    pub file_size: u64,
    pub public_key_fingerprint: Option<String>,
    pub file_hash: Option<String>,
    pub status: SessionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DecryptionSession {
    pub id: Uuid,
    pub user_id: String,
    pub transaction_id: String,
    /// Fingerprint of the public half of the supplied private key.
    pub private_key_fingerprint: Option<String>,
    pub file_hash: Option<String>,
    pub status: SessionStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Action(AuditEntry),
    Encryption(EncryptionSession),
    Decryption(DecryptionSession),
}

impl AuditEvent {
    pub fn user_id(&self) -> &str {
        match self {
            AuditEvent::Action(e) => &e.user_id,
            AuditEvent::Encryption(s) => &s.user_id,
            AuditEvent::Decryption(s) => &s.user_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            AuditEvent::Action(e) => e.timestamp,
            AuditEvent::Encryption(s) => s.created_at,
            AuditEvent::Decryption(s) => s.created_at,
        }
    }
}

/// Append-only sink for audit events.
pub trait AuditLog: Send + Sync {
    fn record(&self, event: AuditEvent) -> SealResult<()>;

    /// Every event, oldest first.
    fn events(&self) -> SealResult<Vec<AuditEvent>>;

    fn append(&self, entry: AuditEntry) -> SealResult<()> {
        self.record(AuditEvent::Action(entry))
    }

    fn record_encryption(&self, session: EncryptionSession) -> SealResult<()> {
        self.record(AuditEvent::Encryption(session))
    }

    fn record_decryption(&self, session: DecryptionSession) -> SealResult<()> {
        self.record(AuditEvent::Decryption(session))
    }

    fn events_for(&self, user: &CallerId) -> SealResult<Vec<AuditEvent>> {
        Ok(self
            .events()?
            .into_iter()
            .filter(|e| e.user_id() == user.as_str())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditLog {
    fn snapshot(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                AuditEvent::Action(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }

    pub fn encryption_sessions(&self) -> Vec<EncryptionSession> {
        self.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                AuditEvent::Encryption(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    pub fn decryption_sessions(&self) -> Vec<DecryptionSession> {
        self.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                AuditEvent::Decryption(s) => Some(s),
                _ => None,
            })
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn record(&self, event: AuditEvent) -> SealResult<()> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
        Ok(())
    }

    fn events(&self) -> SealResult<Vec<AuditEvent>> {
        Ok(self.snapshot())
    }
}

/// JSON-lines audit file. Each event is one line, appended in place.
pub struct FileAuditLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileAuditLog {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        FileAuditLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn record(&self, event: AuditEvent) -> SealResult<()> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    fn events(&self) -> SealResult<Vec<AuditEvent>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Into::into))
            .collect()
    }
}
