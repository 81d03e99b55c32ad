use comfy_table::{Cell, Color, Table};
use owo_colors::{OwoColorize, Stream::Stdout};

use ledgerseal::record::RecordStatus;

use super::AppContext;

pub fn run_records(ctx: &AppContext) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let service = ctx.service()?;
    let records = service.pipeline().ledger().list_by_owner(&caller)?;

    if records.is_empty() {
        println!(
            "{}",
            "No ledger records yet.".if_supports_color(Stdout, |t| t.yellow())
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Transaction",
        "Block",
        "File",
        "Size",
        "Cost",
        "Status",
        "From",
        "To",
        "Time",
    ]);
    for record in &records {
        let tx_short: String = record.transaction_id.chars().take(14).collect();
        let status = Cell::new(record.status.as_str());
        table.add_row(vec![
            Cell::new(format!("{}…", tx_short)),
            Cell::new(record.block_number),
            Cell::new(&record.metadata.file_name),
            Cell::new(record.metadata.file_size),
            Cell::new(record.cost),
            match record.status {
                RecordStatus::Confirmed => status.fg(Color::Green),
                RecordStatus::Pending => status.fg(Color::Yellow),
                RecordStatus::Failed => status.fg(Color::Red),
            },
            Cell::new(&record.sender_id),
            Cell::new(&record.recipient_id),
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }
    println!("{table}");

    Ok(())
}
