use anyhow::Context;
use owo_colors::{OwoColorize, Stream::Stdout};

use ledgerseal::identity::CallerId;
use ledgerseal::pipeline::{encrypted_file_name, EncryptRequest};

use super::AppContext;
use crate::cli::EncryptArgs;

pub fn run_encrypt(ctx: &AppContext, args: EncryptArgs) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let recipient = args
        .recipient
        .as_deref()
        .map(|r| CallerId::parse(Some(r)))
        .transpose()
        .context("Invalid --recipient")?;
    let service = ctx.service()?;

    let public_key_pem = match (&args.public_key, &args.key_id) {
        (Some(path), _) => super::read_text(path)?,
        (None, Some(id)) => service.vault().get(&caller, id)?.public_key,
        (None, None) => anyhow::bail!("Pass --public-key or --key-id"),
    };

    let file_name = args
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow::anyhow!("{} is not a file", args.file.display()))?;
    let dest = args
        .out
        .clone()
        .unwrap_or_else(|| super::beside(&args.file, &encrypted_file_name(&file_name)));
    super::check_output(&dest, &args.file, args.force)?;

    let content = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let out = service.pipeline().encrypt(
        &caller,
        EncryptRequest {
            file_name: &file_name,
            content: &content,
            public_key_pem: &public_key_pem,
            recipient: recipient.as_ref(),
        },
    )?;

    std::fs::write(&dest, &out.encrypted)
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    println!(
        "{}",
        "Encrypted and recorded.".if_supports_color(Stdout, |t| t.green())
    );
    println!();
    println!(
        "Transaction: {}",
        out.record
            .transaction_id
            .if_supports_color(Stdout, |t| t.cyan())
    );
    println!("Block:       {}", out.record.block_number);
    println!("Cost:        {}", out.record.cost);
    println!("File hash:   {}", out.record.file_hash);
    println!("Fingerprint: {}", out.record.metadata.public_key_fingerprint);
    println!("Output:      {}", dest.display());

    Ok(())
}
