use std::str::FromStr;

use owo_colors::{OwoColorize, Stream::Stdout};

use ledgerseal::keys::vault::KeyAlgorithm;

use super::AppContext;
use crate::cli::KeygenArgs;

pub fn run_keygen(ctx: &AppContext, args: KeygenArgs) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let algorithm = match args.algorithm.as_deref() {
        Some(a) => KeyAlgorithm::from_str(a)?,
        None => ctx.config.default_algorithm,
    };
    let service = ctx.service()?;

    let passphrase;
    let protector = if args.passphrase {
        passphrase = super::prompt_passphrase("Enter key passphrase (min 8 chars)", true)?;
        &passphrase
    } else {
        service.server_protector()
    };

    eprintln!("Generating {} key pair...", algorithm);
    let generated = service
        .vault()
        .generate(&caller, &args.name, algorithm, protector)?;

    println!(
        "{}",
        "Key pair generated.".if_supports_color(Stdout, |t| t.green())
    );
    println!();
    println!("Id:          {}", generated.info.id);
    println!("Name:        {}", generated.info.name);
    println!("Algorithm:   {}", generated.info.algorithm);
    println!(
        "Fingerprint: {}",
        generated
            .info
            .fingerprint
            .if_supports_color(Stdout, |t| t.cyan())
    );
    println!("Protection:  {}", generated.info.protection);
    println!();
    println!("{}", generated.info.public_key);
    println!();

    super::emit_private_key(&generated.private_key, args.out.as_deref())
}
