use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "ledgerseal",
    version,
    about = "Hybrid RSA-OAEP / AES-256-GCM file encryption with an append-only ledger"
)]
pub struct Cli {
    /// Caller identity recorded on every key, ledger record and audit entry
    #[arg(long, global = true, env = "LEDGERSEAL_USER", value_name = "ID")]
    pub user: Option<String>,

    /// Data directory (default: ~/.ledgerseal)
    #[arg(long, global = true, env = "LEDGERSEAL_HOME", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate an RSA key pair
    Keygen(KeygenArgs),
    /// List your key pairs
    Keys,
    /// Revoke a key pair (it can no longer be encrypted to)
    Revoke(KeyIdArgs),
    /// Mark a key pair as expired
    Expire(KeyIdArgs),
    /// Permanently delete a key pair
    Delete(KeyIdArgs),
    /// Recover the private key of one of your key pairs
    ExportKey(ExportKeyArgs),
    /// Encrypt a file for a public key and record it on the ledger
    Encrypt(EncryptArgs),
    /// Decrypt a file and verify it against its ledger record
    Decrypt(DecryptArgs),
    /// List ledger records you sent or received
    Records,
    /// Show your audit trail
    Audit(AuditArgs),
    /// Serve one JSON request from stdin and write the JSON response to stdout
    Api(ApiArgs),
}

#[derive(Parser)]
pub struct KeygenArgs {
    /// Display name for the key pair
    #[arg(value_name = "NAME")]
    pub name: String,

    /// RSA-2048 or RSA-4096 (default from config)
    #[arg(long, short = 'a')]
    pub algorithm: Option<String>,

    /// Seal the stored private key with a passphrase instead of the server key
    #[arg(long)]
    pub passphrase: bool,

    /// Write the private key PEM to this file instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser)]
pub struct KeyIdArgs {
    /// Key pair id
    #[arg(value_name = "KEY_ID")]
    pub id: String,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(Parser)]
pub struct ExportKeyArgs {
    /// Key pair id
    #[arg(value_name = "KEY_ID")]
    pub id: String,

    /// Write the private key PEM to this file instead of stdout
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,
}

#[derive(Parser)]
pub struct EncryptArgs {
    /// File to encrypt
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Recipient public key PEM file
    #[arg(long, value_name = "PATH", conflicts_with = "key_id")]
    pub public_key: Option<PathBuf>,

    /// Encrypt to one of your own vault keys
    #[arg(long, value_name = "KEY_ID", required_unless_present = "public_key")]
    pub key_id: Option<String>,

    /// Recipient identity recorded on the ledger (defaults to you)
    #[arg(long, value_name = "ID")]
    pub recipient: Option<String>,

    /// Output path (default: input name with .enc extension)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Overwrite the output file if it exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct DecryptArgs {
    /// Ledger transaction id
    #[arg(value_name = "TX_ID")]
    pub tx_id: String,

    /// Encrypted file
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Private key PEM file
    #[arg(long, value_name = "PATH", conflicts_with = "key_id")]
    pub private_key: Option<PathBuf>,

    /// Decrypt with one of your own vault keys
    #[arg(long, value_name = "KEY_ID", required_unless_present = "private_key")]
    pub key_id: Option<String>,

    /// Output path (default: original file name next to the encrypted file)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub out: Option<PathBuf>,

    /// Overwrite the output file if it exists
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser)]
pub struct AuditArgs {
    /// Show at most this many of the most recent events
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

#[derive(Parser)]
pub struct ApiArgs {
    #[arg(value_enum)]
    pub operation: ApiOperation,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ApiOperation {
    GenerateKeypair,
    EncryptFile,
    DecryptFile,
}
