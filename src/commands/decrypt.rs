use anyhow::Context;
use owo_colors::{OwoColorize, Stream::Stderr, Stream::Stdout};
use zeroize::Zeroizing;

use ledgerseal::error::{ErrorClass, SealError};
use ledgerseal::pipeline::DecryptRequest;

use super::AppContext;
use crate::cli::DecryptArgs;

pub fn run_decrypt(ctx: &AppContext, args: DecryptArgs) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let service = ctx.service()?;

    let private_key_pem = match (&args.private_key, &args.key_id) {
        (Some(path), _) => Zeroizing::new(super::read_text(path)?),
        (None, Some(id)) => {
            let info = service.vault().get(&caller, id)?;
            let protector = super::protector_for(&service, &info.protection)?;
            service.vault().export_private_key(&caller, id, &protector)?
        }
        (None, None) => anyhow::bail!("Pass --private-key or --key-id"),
    };
    let encrypted = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let result = service.pipeline().decrypt(
        &caller,
        DecryptRequest {
            transaction_id: args.tx_id.trim(),
            encrypted: &encrypted,
            private_key_pem: &private_key_pem,
        },
    );
    let out = match result {
        Ok(out) => out,
        Err(e) => {
            if e.kind() == ErrorClass::IntegrityFailed {
                eprintln!(
                    "{} {}",
                    "Integrity check failed:".if_supports_color(Stderr, |t| t.red()),
                    e.public_message()
                );
            }
            return Err(anyhow_from(e));
        }
    };

    let dest = args
        .out
        .unwrap_or_else(|| super::beside(&args.file, &out.original_file_name));
    super::check_output(&dest, &args.file, args.force)?;
    std::fs::write(&dest, &out.plaintext)
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    println!(
        "{}",
        "Decrypted and verified.".if_supports_color(Stdout, |t| t.green())
    );
    println!("File hash: {}", out.file_hash);
    println!("Output:    {}", dest.display());

    Ok(())
}

/// Decrypt-path failures leave the CLI with the same single message the API
/// uses; the detailed reason is in the audit trail.
fn anyhow_from(err: SealError) -> anyhow::Error {
    match err.kind() {
        ErrorClass::DecryptionFailed => anyhow::anyhow!(err.public_message()),
        _ => err.into(),
    }
}
