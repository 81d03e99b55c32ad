pub mod api;
pub mod audit;
pub mod decrypt;
pub mod encrypt;
pub mod export_key;
pub mod keygen;
pub mod keys;
pub mod lifecycle;
pub mod records;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::Context;
use zeroize::Zeroizing;

use ledgerseal::api::Service;
use ledgerseal::config::{self, Config};
use ledgerseal::crypto::KeyProtector;
use ledgerseal::identity::CallerId;

/// Resolved global options shared by every command.
pub struct AppContext {
    pub config: Config,
    user: Option<String>,
}

impl AppContext {
    pub fn load(cli: &crate::cli::Cli) -> anyhow::Result<Self> {
        let data_dir = config::resolve_data_dir(cli.data_dir.as_deref())?;
        let config = Config::load(&data_dir)?;
        Ok(AppContext {
            config,
            user: cli.user.clone(),
        })
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn caller(&self) -> anyhow::Result<CallerId> {
        CallerId::parse(self.user()).context("Pass --user or set LEDGERSEAL_USER")
    }

    pub fn service(&self) -> anyhow::Result<Service> {
        Service::open(self.config.clone())
    }
}

/// Prompt for a key passphrase. With `confirm`, the passphrase must be typed
/// twice and be at least 8 characters.
pub fn prompt_passphrase(prompt: &str, confirm: bool) -> anyhow::Result<KeyProtector> {
    if !std::io::stdin().is_terminal() {
        anyhow::bail!("A passphrase prompt needs an interactive terminal");
    }
    let mut input = dialoguer::Password::new().with_prompt(prompt);
    if confirm {
        input = input.with_confirmation("Confirm passphrase", "Passphrases don't match");
    }
    let passphrase = Zeroizing::new(
        input
            .interact()
            .map_err(|e| anyhow::anyhow!("Passphrase prompt failed: {}", e))?,
    );
    if confirm && passphrase.len() < 8 {
        anyhow::bail!("Passphrase must be at least 8 characters");
    }
    Ok(KeyProtector::Passphrase(passphrase))
}

/// Protector matching how a vault key was sealed.
pub fn protector_for(service: &Service, protection: &str) -> anyhow::Result<KeyProtector> {
    match protection {
        "passphrase" => prompt_passphrase("Key passphrase", false),
        "server-key" => {
            let path = service.config().server_key_path();
            ledgerseal::keys::store::load_or_create_server_key(&path)
                .context("Failed to load server key")
        }
        other => anyhow::bail!("Unknown key protection '{}'", other),
    }
}

/// Ask before a destructive action unless `yes` is set or stdin is not a terminal.
pub fn confirm(prompt: String, yes: bool) -> anyhow::Result<bool> {
    if yes || !std::io::stdin().is_terminal() {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| anyhow::anyhow!("prompt failed: {}", e))
}

/// Write private key PEM to `out` (0600) or print it to stdout.
pub fn emit_private_key(pem: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            let mut text = Zeroizing::new(pem.to_string());
            text.push('\n');
            ledgerseal::keys::store::write_secret_atomic(text.as_bytes(), path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Private key written to {}", path.display());
        }
        None => {
            eprintln!("Private key (shown once, store it securely):");
            println!("{}", pem);
        }
    }
    Ok(())
}

pub fn read_text(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// `dir/name`, where `dir` is the parent of `sibling`.
pub fn beside(sibling: &Path, name: &str) -> PathBuf {
    let file_name = Path::new(name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("decrypted_file"));
    match sibling.parent() {
        Some(dir) => dir.join(file_name),
        None => file_name,
    }
}

/// Refuse to write `dest` when it is the input file itself, or when it
/// already exists and `force` is not set.
pub fn check_output(dest: &Path, input: &Path, force: bool) -> anyhow::Result<()> {
    if !dest.exists() {
        return Ok(());
    }
    let same_file = match (dest.canonicalize(), input.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => dest == input,
    };
    if same_file {
        anyhow::bail!("Refusing to overwrite the input file {}", input.display());
    }
    if !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", dest.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beside_strips_directories_from_name() {
        assert_eq!(
            beside(Path::new("/data/in/doc.enc"), "../../etc/doc.pdf"),
            PathBuf::from("/data/in/doc.pdf")
        );
        assert_eq!(beside(Path::new("doc.enc"), "doc.pdf"), PathBuf::from("doc.pdf"));
    }

    #[test]
    fn test_check_output_guards_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("report.enc");
        let other = dir.path().join("other.enc");
        std::fs::write(&input, b"plaintext").unwrap();
        std::fs::write(&other, b"old").unwrap();

        assert!(check_output(&dir.path().join("new.enc"), &input, false).is_ok());
        assert!(check_output(&other, &input, false).is_err());
        assert!(check_output(&other, &input, true).is_ok());
        let err = check_output(&input, &input, true).unwrap_err();
        assert!(err.to_string().contains("input file"));
    }
}
