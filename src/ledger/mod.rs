//! Append-only ledger of encryption records.
//!
//! The "block number" is a plain counter: each store hands out heights from a
//! mutex-guarded counter starting above a configured base, so two inserts
//! never share a height.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SealError, SealResult};
use crate::identity::CallerId;
use crate::record::{LedgerRecord, RecordDraft, RecordStatus};

pub trait LedgerStore: Send + Sync {
    /// Persist a new record, assigning its block number and timestamp.
    fn insert(&self, draft: RecordDraft, status: RecordStatus) -> SealResult<LedgerRecord>;

    fn get_by_id(&self, transaction_id: &str) -> SealResult<Option<LedgerRecord>>;

    /// Records the caller sent or received, in insertion order.
    fn list_by_owner(&self, owner: &CallerId) -> SealResult<Vec<LedgerRecord>>;

    /// Move a pending record to confirmed or failed.
    fn set_status(&self, transaction_id: &str, status: RecordStatus) -> SealResult<LedgerRecord>;
}

#[derive(Default)]
struct LedgerState {
    records: Vec<LedgerRecord>,
    index: HashMap<String, usize>,
    height: u64,
}

impl LedgerState {
    fn with_base(base: u64) -> Self {
        LedgerState {
            height: base,
            ..Default::default()
        }
    }

    fn prepare_insert(&self, draft: RecordDraft, status: RecordStatus) -> SealResult<LedgerRecord> {
        if self.index.contains_key(&draft.transaction_id) {
            return Err(SealError::DuplicateRecord(draft.transaction_id));
        }
        Ok(draft.into_record(self.height + 1, status, Utc::now()))
    }

    fn commit_insert(&mut self, record: LedgerRecord) {
        self.height = self.height.max(record.block_number);
        self.index
            .insert(record.transaction_id.clone(), self.records.len());
        self.records.push(record);
    }

    fn prepare_status(&self, transaction_id: &str, status: RecordStatus) -> SealResult<LedgerRecord> {
        let record = self
            .index
            .get(transaction_id)
            .map(|&i| &self.records[i])
            .ok_or_else(|| SealError::RecordNotFound(transaction_id.to_string()))?;
        if !record.status.can_transition_to(status) {
            return Err(SealError::InvalidStatusTransition {
                from: record.status.to_string(),
                to: status.to_string(),
            });
        }
        let mut updated = record.clone();
        updated.status = status;
        Ok(updated)
    }

    fn commit_status(&mut self, transaction_id: &str, status: RecordStatus) {
        if let Some(&i) = self.index.get(transaction_id) {
            self.records[i].status = status;
        }
    }

    /// Apply one line read back from a ledger file, under the same rules as
    /// a live insert or status change.
    fn replay(&mut self, line: usize, entry: LedgerLine) -> SealResult<()> {
        let corrupt = |e: SealError| SealError::LedgerCorrupt {
            line,
            reason: e.to_string(),
        };
        match entry {
            LedgerLine::Insert { record } => {
                if self.index.contains_key(&record.transaction_id) {
                    return Err(corrupt(SealError::DuplicateRecord(record.transaction_id)));
                }
                self.commit_insert(record);
            }
            LedgerLine::Status {
                transaction_id,
                status,
                ..
            } => {
                self.prepare_status(&transaction_id, status).map_err(corrupt)?;
                self.commit_status(&transaction_id, status);
            }
        }
        Ok(())
    }

    fn get(&self, transaction_id: &str) -> Option<LedgerRecord> {
        self.index
            .get(transaction_id)
            .map(|&i| self.records[i].clone())
    }

    fn by_owner(&self, owner: &CallerId) -> Vec<LedgerRecord> {
        self.records
            .iter()
            .filter(|r| r.sender_id == owner.as_str() || r.recipient_id == owner.as_str())
            .cloned()
            .collect()
    }
}

/// In-process ledger.
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new(block_height_base: u64) -> Self {
        MemoryLedger {
            state: Mutex::new(LedgerState::with_base(block_height_base)),
        }
    }
}

impl LedgerStore for MemoryLedger {
    fn insert(&self, draft: RecordDraft, status: RecordStatus) -> SealResult<LedgerRecord> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let record = state.prepare_insert(draft, status)?;
        state.commit_insert(record.clone());
        Ok(record)
    }

    fn get_by_id(&self, transaction_id: &str) -> SealResult<Option<LedgerRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.get(transaction_id))
    }

    fn list_by_owner(&self, owner: &CallerId) -> SealResult<Vec<LedgerRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.by_owner(owner))
    }

    fn set_status(&self, transaction_id: &str, status: RecordStatus) -> SealResult<LedgerRecord> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let updated = state.prepare_status(transaction_id, status)?;
        state.commit_status(transaction_id, status);
        Ok(updated)
    }
}

/// One line of the ledger file.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "op", rename_all = "snake_case")]
enum LedgerLine {
    Insert {
        record: LedgerRecord,
    },
    Status {
        transaction_id: String,
        status: RecordStatus,
        at: DateTime<Utc>,
    },
}

/// JSON-lines ledger file, replayed into memory on open.
///
/// Lines are only ever appended. A record is visible to readers only after its
/// line has been written. An unparseable final line with no newline is the
/// remains of an interrupted append and is truncated away on open; any other
/// bad line fails the open.
pub struct FileLedger {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

impl FileLedger {
    pub fn open(path: impl Into<PathBuf>, block_height_base: u64) -> SealResult<Self> {
        let path = path.into();
        let mut state = LedgerState::with_base(block_height_base);

        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            // Everything after the last newline is a line whose append never finished.
            let complete_len = text.rfind('\n').map_or(0, |i| i + 1);
            for (n, line) in text[..complete_len].lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let entry = serde_json::from_str::<LedgerLine>(line).map_err(|e| {
                    SealError::LedgerCorrupt {
                        line: n + 1,
                        reason: e.to_string(),
                    }
                })?;
                state.replay(n + 1, entry)?;
            }

            let tail = &text[complete_len..];
            if !tail.trim().is_empty() {
                match serde_json::from_str::<LedgerLine>(tail) {
                    Ok(entry) => {
                        state.replay(text[..complete_len].lines().count() + 1, entry)?;
                        let mut file = std::fs::OpenOptions::new().append(true).open(&path)?;
                        file.write_all(b"\n")?;
                        file.sync_data()?;
                    }
                    Err(e) => {
                        tracing::warn!(
                            bytes = tail.len(),
                            error = %e,
                            "discarding incomplete final ledger line"
                        );
                        let file = std::fs::OpenOptions::new().write(true).open(&path)?;
                        file.set_len(complete_len as u64)?;
                        file.sync_data()?;
                    }
                }
            }
            tracing::debug!(records = state.records.len(), height = state.height, "ledger replayed");
        }

        Ok(FileLedger {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &LedgerLine) -> SealResult<()> {
        let mut bytes = serde_json::to_vec(line)?;
        bytes.push(b'\n');
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
        file.write_all(&bytes)?;
        file.sync_data()?;
        Ok(())
    }
}

impl LedgerStore for FileLedger {
    fn insert(&self, draft: RecordDraft, status: RecordStatus) -> SealResult<LedgerRecord> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let record = state.prepare_insert(draft, status)?;
        self.append(&LedgerLine::Insert {
            record: record.clone(),
        })?;
        state.commit_insert(record.clone());
        Ok(record)
    }

    fn get_by_id(&self, transaction_id: &str) -> SealResult<Option<LedgerRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.get(transaction_id))
    }

    fn list_by_owner(&self, owner: &CallerId) -> SealResult<Vec<LedgerRecord>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.by_owner(owner))
    }

    fn set_status(&self, transaction_id: &str, status: RecordStatus) -> SealResult<LedgerRecord> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let updated = state.prepare_status(transaction_id, status)?;
        self.append(&LedgerLine::Status {
            transaction_id: transaction_id.to_string(),
            status,
            at: Utc::now(),
        })?;
        state.commit_status(transaction_id, status);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordMetadata;

    fn draft(owner: &str) -> RecordDraft {
        RecordDraft::new(
            "ab".repeat(32),
            "a2V5".into(),
            owner,
            owner,
            RecordMetadata::new("doc.pdf", 1000, "00:11"),
        )
    }

    fn alice() -> CallerId {
        CallerId::parse(Some("alice")).unwrap()
    }

    #[test]
    fn test_heights_increase_from_base() {
        let ledger = MemoryLedger::new(1_000_000);
        let a = ledger.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
        let b = ledger.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
        assert_eq!(a.block_number, 1_000_001);
        assert_eq!(b.block_number, 1_000_002);
    }

    #[test]
    fn test_duplicate_transaction_rejected() {
        let ledger = MemoryLedger::new(0);
        let d = draft("alice");
        ledger.insert(d.clone(), RecordStatus::Confirmed).unwrap();
        assert!(matches!(
            ledger.insert(d, RecordStatus::Confirmed),
            Err(SealError::DuplicateRecord(_))
        ));
    }

    #[test]
    fn test_confirmed_is_immutable() {
        let ledger = MemoryLedger::new(0);
        let pending = ledger.insert(draft("alice"), RecordStatus::Pending).unwrap();
        let confirmed = ledger
            .set_status(&pending.transaction_id, RecordStatus::Confirmed)
            .unwrap();
        assert_eq!(confirmed.status, RecordStatus::Confirmed);
        assert!(matches!(
            ledger.set_status(&pending.transaction_id, RecordStatus::Failed),
            Err(SealError::InvalidStatusTransition { .. })
        ));
        assert!(matches!(
            ledger.set_status("0xmissing", RecordStatus::Failed),
            Err(SealError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_list_by_owner() {
        let ledger = MemoryLedger::new(0);
        ledger.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
        ledger.insert(draft("bob"), RecordStatus::Confirmed).unwrap();
        let mine = ledger.list_by_owner(&alice()).unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].sender_id, "alice");
    }

    #[test]
    fn test_file_ledger_replays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        let (confirmed_id, pending_id) = {
            let ledger = FileLedger::open(&path, 1_000_000).unwrap();
            let a = ledger.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
            let b = ledger.insert(draft("alice"), RecordStatus::Pending).unwrap();
            ledger.set_status(&b.transaction_id, RecordStatus::Failed).unwrap();
            (a.transaction_id, b.transaction_id)
        };

        let reopened = FileLedger::open(&path, 1_000_000).unwrap();
        let a = reopened.get_by_id(&confirmed_id).unwrap().unwrap();
        assert_eq!(a.status, RecordStatus::Confirmed);
        assert_eq!(a.block_number, 1_000_001);
        let b = reopened.get_by_id(&pending_id).unwrap().unwrap();
        assert_eq!(b.status, RecordStatus::Failed);

        let c = reopened.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
        assert_eq!(c.block_number, 1_000_003, "height continues after replay");

        let lines = std::fs::read_to_string(&path).unwrap().lines().count();
        assert_eq!(lines, 4, "status change is a separate appended line");
    }

    fn append_raw(path: &Path, text: &str) {
        let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn test_torn_final_line_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let confirmed_id = {
            let ledger = FileLedger::open(&path, 1_000_000).unwrap();
            ledger
                .insert(draft("alice"), RecordStatus::Confirmed)
                .unwrap()
                .transaction_id
        };
        append_raw(&path, r#"{"op":"insert","record":{"transaction_id":"0x12"#);

        let reopened = FileLedger::open(&path, 1_000_000).unwrap();
        assert!(reopened.get_by_id(&confirmed_id).unwrap().is_some());
        let next = reopened.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
        assert_eq!(next.block_number, 1_000_002);

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2, "torn bytes were truncated");
        assert!(FileLedger::open(&path, 1_000_000).is_ok());
    }

    #[test]
    fn test_corrupt_middle_line_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = FileLedger::open(&path, 0).unwrap();
            ledger.insert(draft("alice"), RecordStatus::Confirmed).unwrap();
        }
        append_raw(&path, "{not json\n");
        assert!(matches!(
            FileLedger::open(&path, 0),
            Err(SealError::LedgerCorrupt { line: 2, .. })
        ));
    }

    #[test]
    fn test_replay_rejects_duplicate_insert_and_confirmed_rewrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let record = {
            let ledger = FileLedger::open(&path, 0).unwrap();
            ledger.insert(draft("alice"), RecordStatus::Confirmed).unwrap()
        };
        let original = std::fs::read_to_string(&path).unwrap();

        append_raw(&path, &original);
        assert!(matches!(
            FileLedger::open(&path, 0),
            Err(SealError::LedgerCorrupt { line: 2, .. })
        ));

        std::fs::write(&path, &original).unwrap();
        let status = serde_json::to_string(&LedgerLine::Status {
            transaction_id: record.transaction_id.clone(),
            status: RecordStatus::Failed,
            at: Utc::now(),
        })
        .unwrap();
        append_raw(&path, &format!("{}\n", status));
        assert!(matches!(
            FileLedger::open(&path, 0),
            Err(SealError::LedgerCorrupt { line: 2, .. })
        ));
    }

    #[test]
    fn test_concurrent_inserts_get_distinct_heights() {
        use std::sync::Arc;
        let ledger = Arc::new(MemoryLedger::new(1_000_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    (0..10)
                        .map(|_| {
                            ledger
                                .insert(draft("alice"), RecordStatus::Confirmed)
                                .unwrap()
                                .block_number
                        })
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut heights: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        heights.sort_unstable();
        heights.dedup();
        assert_eq!(heights.len(), 80);
    }
}
