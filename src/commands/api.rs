use std::io::Read;

use anyhow::Context;

use ledgerseal::api::{ApiError, Operation};

use super::AppContext;
use crate::cli::{ApiArgs, ApiOperation};

/// Serve one request: JSON body on stdin, JSON response on stdout. Failures
/// are reported as `{"success":false,"error":...}` and a non-zero exit.
pub fn run_api(ctx: &AppContext, args: ApiArgs) -> anyhow::Result<()> {
    let operation = match args.operation {
        ApiOperation::GenerateKeypair => Operation::GenerateKeypair,
        ApiOperation::EncryptFile => Operation::EncryptFile,
        ApiOperation::DecryptFile => Operation::DecryptFile,
    };

    let mut body = String::new();
    std::io::stdin()
        .read_to_string(&mut body)
        .context("Failed to read request from stdin")?;

    let service = ctx.service()?;
    let response = service.handle_json(operation, ctx.user(), &body);
    match response {
        Ok(value) => {
            println!("{}", serde_json::to_string(&value)?);
            Ok(())
        }
        Err(err) => {
            print_error(&err)?;
            std::process::exit(1);
        }
    }
}

fn print_error(err: &ApiError) -> anyhow::Result<()> {
    tracing::debug!(status = err.status, "request failed");
    println!("{}", serde_json::to_string(&err.to_json())?);
    Ok(())
}
