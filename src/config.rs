use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::keys::vault::KeyAlgorithm;

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "LEDGERSEAL_HOME";

pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;
pub const DEFAULT_BLOCK_HEIGHT_BASE: u64 = 1_000_000;

/// Content type admitting every file.
pub const ANY_CONTENT_TYPE: &str = "*/*";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub allowed_content_types: Vec<String>,
    pub max_file_size: u64,
    pub default_algorithm: KeyAlgorithm,
    pub block_height_base: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::new(),
            allowed_content_types: vec!["application/pdf".to_string()],
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            default_algorithm: KeyAlgorithm::Rsa2048,
            block_height_base: DEFAULT_BLOCK_HEIGHT_BASE,
        }
    }
}

impl Config {
    /// Load `<data_dir>/config.json`, falling back to defaults when absent.
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join("config.json");
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str::<Config>(&text)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?
        } else {
            Config::default()
        };
        config.data_dir = data_dir.to_path_buf();
        tracing::debug!(data_dir = %config.data_dir.display(), "configuration loaded");
        Ok(config)
    }

    /// Create the data directory (0700 on Unix) if it does not exist.
    pub fn ensure_data_dir(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("Failed to create {} directory", self.data_dir.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.data_dir, std::fs::Permissions::from_mode(0o700))
                .with_context(|| {
                    format!("Failed to set permissions on {}", self.data_dir.display())
                })?;
        }
        Ok(())
    }

    pub fn keys_path(&self) -> PathBuf {
        self.data_dir.join("keys.json")
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.jsonl")
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join("audit.jsonl")
    }

    pub fn server_key_path(&self) -> PathBuf {
        self.data_dir.join("server.key")
    }

    pub fn allows_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed == ANY_CONTENT_TYPE || allowed.eq_ignore_ascii_case(content_type))
    }
}

/// Resolve the data directory: explicit flag (which clap also fills from
/// `LEDGERSEAL_HOME`), otherwise `~/.ledgerseal`.
pub fn resolve_data_dir(flag: Option<&Path>) -> anyhow::Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    let home = dirs::home_dir().ok_or_else(|| {
        anyhow::anyhow!("Home directory not found; pass --data-dir or set {}", HOME_ENV)
    })?;
    Ok(home.join(".ledgerseal"))
}

/// Content type inferred from a file name's extension.
pub fn content_type_for(file_name: &str) -> &'static str {
    mime_guess::from_path(file_name)
        .first_raw()
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.block_height_base, 1_000_000);
        assert_eq!(config.default_algorithm, KeyAlgorithm::Rsa2048);
        assert!(config.allows_content_type("application/pdf"));
        assert!(!config.allows_content_type("text/plain"));
        assert_eq!(config.ledger_path(), dir.path().join("ledger.jsonl"));
    }

    #[test]
    fn test_partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"allowed_content_types":["*/*"],"default_algorithm":"RSA-4096"}"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert!(config.allows_content_type("text/plain"));
        assert_eq!(config.default_algorithm, KeyAlgorithm::Rsa4096);
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("config.json"));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("report.PDF"), "application/pdf");
        assert_eq!(content_type_for("notes.txt"), "text/plain");
        assert_eq!(
            content_type_for("budget.xlsx"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        assert_eq!(
            content_type_for("minutes.odt"),
            "application/vnd.oasis.opendocument.text"
        );
        assert_eq!(content_type_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/ls"))).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/ls"));
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_data_dir_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("home")).unwrap();
        config.ensure_data_dir().unwrap();
        let mode = std::fs::metadata(&config.data_dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o700);
    }
}
