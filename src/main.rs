mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::lifecycle::Lifecycle;
use commands::AppContext;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    ledgerseal::telemetry::init(cli.verbose);
    let ctx = AppContext::load(&cli)?;

    match cli.command {
        Commands::Keygen(args) => commands::keygen::run_keygen(&ctx, args)?,
        Commands::Keys => commands::keys::run_keys(&ctx)?,
        Commands::Revoke(args) => commands::lifecycle::run_lifecycle(&ctx, args, Lifecycle::Revoke)?,
        Commands::Expire(args) => commands::lifecycle::run_lifecycle(&ctx, args, Lifecycle::Expire)?,
        Commands::Delete(args) => commands::lifecycle::run_lifecycle(&ctx, args, Lifecycle::Delete)?,
        Commands::ExportKey(args) => commands::export_key::run_export_key(&ctx, args)?,
        Commands::Encrypt(args) => commands::encrypt::run_encrypt(&ctx, args)?,
        Commands::Decrypt(args) => commands::decrypt::run_decrypt(&ctx, args)?,
        Commands::Records => commands::records::run_records(&ctx)?,
        Commands::Audit(args) => commands::audit::run_audit(&ctx, args)?,
        Commands::Api(args) => commands::api::run_api(&ctx, args)?,
    }

    Ok(())
}
