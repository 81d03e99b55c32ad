use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rand::RngCore;
use zeroize::Zeroizing;

use crate::crypto::{KeyProtector, KEY_LEN};
use crate::error::{SealError, SealResult};
use crate::keys::vault::StoredKeyPair;

/// JSON file holding every key pair record, private keys sealed.
///
/// The whole file is rewritten on each change (temp file + rename) so a crash
/// never leaves a half-written store. A process-local mutex serializes
/// read-modify-write cycles.
pub struct KeyStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl KeyStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        KeyStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> SealResult<Vec<StoredKeyPair>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        check_key_permissions(&self.path)?;
        let bytes = std::fs::read(&self.path)?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_all(&self, keys: &[StoredKeyPair]) -> SealResult<()> {
        let bytes = serde_json::to_vec_pretty(keys)?;
        write_secret_atomic(&bytes, &self.path)
    }

    /// Snapshot of all stored key pairs.
    pub fn load(&self) -> SealResult<Vec<StoredKeyPair>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_all()
    }

    /// Run `f` against the stored list and persist the result if it succeeds.
    pub fn modify<T>(
        &self,
        f: impl FnOnce(&mut Vec<StoredKeyPair>) -> SealResult<T>,
    ) -> SealResult<T> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys = self.read_all()?;
        let out = f(&mut keys)?;
        self.write_all(&keys)?;
        Ok(out)
    }
}

/// Write secret bytes atomically (temp file then rename) and set 0600 permissions.
pub fn write_secret_atomic(bytes: &[u8], dest: &Path) -> SealResult<()> {
    let parent = dest.parent().ok_or_else(|| {
        SealError::Storage(std::io::Error::other("destination path has no parent directory"))
    })?;
    std::fs::create_dir_all(parent)?;

    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "secret".to_string());
    let tmp = parent.join(format!(".{}.tmp", file_name));

    std::fs::write(&tmp, bytes)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }

    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = std::fs::remove_file(&tmp);
        return Err(SealError::Storage(e));
    }

    Ok(())
}

/// Load the 32-byte server key, creating it on first use.
pub fn load_or_create_server_key(path: &Path) -> SealResult<KeyProtector> {
    if path.exists() {
        check_key_permissions(path)?;
        let bytes = Zeroizing::new(std::fs::read(path)?);
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            SealError::KeyEnvelope(format!(
                "server key {} must be exactly {} bytes",
                path.display(),
                KEY_LEN
            ))
        })?;
        return Ok(KeyProtector::ServerKey(Zeroizing::new(key)));
    }

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rngs::OsRng.fill_bytes(key.as_mut());
    write_secret_atomic(key.as_ref(), path)?;
    tracing::info!(path = %path.display(), "created server key");
    Ok(KeyProtector::ServerKey(key))
}

/// Check that a secret file has exactly 0600 permissions (Unix only).
///
/// The error names the remediation command so it can be fixed immediately.
#[cfg(unix)]
pub fn check_key_permissions(path: &Path) -> SealResult<()> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)?.permissions().mode() & 0o777;
    if mode != 0o600 {
        return Err(SealError::Storage(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            format!(
                "{} has insecure permissions {:04o} (expected 0600). Fix with: chmod 600 {}",
                path.display(),
                mode,
                path.display()
            ),
        )));
    }
    Ok(())
}

/// No-op permission check on non-Unix platforms.
#[cfg(not(unix))]
pub fn check_key_permissions(_path: &Path) -> SealResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_enforce_permissions_rejects_0644() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("keys.json");
        std::fs::write(&path, b"[]").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();
        let err = check_key_permissions(&path).expect_err("0644 must be rejected");
        let msg = match err {
            SealError::Storage(io) => io.to_string(),
            other => panic!("unexpected error: {:?}", other),
        };
        assert!(msg.contains("permissions"), "got: {}", msg);
        assert!(msg.contains("chmod 600"), "got: {}", msg);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_secret_atomic_sets_0600() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("nested").join("server.key");
        write_secret_atomic(b"secret", &path).expect("atomic write should succeed");
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "got {:04o}", mode);
        assert!(!dir.path().join("nested").join(".server.key.tmp").exists());
    }

    #[test]
    fn test_server_key_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        load_or_create_server_key(&path).expect("create");
        let first = std::fs::read(&path).unwrap();
        assert_eq!(first.len(), KEY_LEN);
        load_or_create_server_key(&path).expect("reload");
        assert_eq!(std::fs::read(&path).unwrap(), first, "existing key must be reused");
    }

    #[test]
    fn test_server_key_wrong_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server.key");
        write_secret_atomic(&[1u8; 16], &path).unwrap();
        assert!(matches!(
            load_or_create_server_key(&path),
            Err(SealError::KeyEnvelope(_))
        ));
    }

    #[test]
    fn test_missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::open(dir.path().join("keys.json"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_failed_modify_does_not_persist() {
        let dir = tempfile::tempdir().unwrap();
        let store = KeyStore::open(dir.path().join("keys.json"));
        let result: SealResult<()> =
            store.modify(|_| Err(SealError::KeyNotFound("missing".into())));
        assert!(result.is_err());
        assert!(!store.path().exists(), "nothing is written when the closure fails");
    }
}
