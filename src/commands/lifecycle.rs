//! revoke, expire and delete for vault key pairs.
use owo_colors::{OwoColorize, Stream::Stdout};

use super::AppContext;
use crate::cli::KeyIdArgs;

#[derive(Clone, Copy)]
pub enum Lifecycle {
    Revoke,
    Expire,
    Delete,
}

impl Lifecycle {
    fn verb(self) -> &'static str {
        match self {
            Lifecycle::Revoke => "Revoke",
            Lifecycle::Expire => "Expire",
            Lifecycle::Delete => "Permanently delete",
        }
    }

    fn done(self) -> &'static str {
        match self {
            Lifecycle::Revoke => "Revoked.",
            Lifecycle::Expire => "Expired.",
            Lifecycle::Delete => "Deleted.",
        }
    }
}

pub fn run_lifecycle(ctx: &AppContext, args: KeyIdArgs, action: Lifecycle) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let service = ctx.service()?;
    let vault = service.vault();

    let key = vault.get(&caller, &args.id)?;
    let prompt = format!("{} key pair '{}' ({})?", action.verb(), key.name, key.fingerprint);
    if !super::confirm(prompt, args.yes)? {
        println!("Aborted.");
        return Ok(());
    }

    match action {
        Lifecycle::Revoke => vault.revoke(&caller, &args.id)?,
        Lifecycle::Expire => vault.expire(&caller, &args.id)?,
        Lifecycle::Delete => vault.delete(&caller, &args.id)?,
    };
    println!(
        "{} ({})",
        action.done().if_supports_color(Stdout, |t| t.green()),
        key.name
    );
    Ok(())
}
