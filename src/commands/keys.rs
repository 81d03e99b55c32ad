use comfy_table::{Cell, Color, Table};
use owo_colors::{OwoColorize, Stream::Stdout};

use ledgerseal::keys::fingerprint::short_fingerprint;
use ledgerseal::keys::vault::KeyStatus;

use super::AppContext;

pub fn run_keys(ctx: &AppContext) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let service = ctx.service()?;
    let keys = service.vault().list(&caller)?;

    if keys.is_empty() {
        println!(
            "{}",
            "No key pairs. Create one with ledgerseal keygen <NAME>."
                .if_supports_color(Stdout, |t| t.yellow())
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Id",
        "Name",
        "Algorithm",
        "Fingerprint",
        "Status",
        "Protection",
        "Created",
    ]);
    for key in &keys {
        let status = Cell::new(key.status.as_str());
        table.add_row(vec![
            Cell::new(key.id),
            Cell::new(&key.name),
            Cell::new(key.algorithm.as_str()),
            Cell::new(short_fingerprint(&key.fingerprint)),
            match key.status {
                KeyStatus::Active => status.fg(Color::Green),
                KeyStatus::Revoked => status.fg(Color::Red),
                KeyStatus::Expired => status.fg(Color::Yellow),
            },
            Cell::new(&key.protection),
            Cell::new(key.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");

    Ok(())
}
