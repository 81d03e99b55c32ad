use comfy_table::{Cell, Color, Table};
use owo_colors::{OwoColorize, Stream::Stdout};

use ledgerseal::audit::{AuditEvent, SessionStatus};

use super::AppContext;
use crate::cli::AuditArgs;

fn describe(event: &AuditEvent) -> (String, String, bool, String) {
    match event {
        AuditEvent::Action(e) => (
            e.action.as_str().to_string(),
            format!("{} {}", e.resource_type, e.resource_id),
            e.success,
            e.error_message.clone().unwrap_or_default(),
        ),
        AuditEvent::Encryption(s) => (
            "encryption session".to_string(),
            s.file_name.clone(),
            s.status == SessionStatus::Completed,
            s.error_message.clone().unwrap_or_default(),
        ),
        AuditEvent::Decryption(s) => (
            "decryption session".to_string(),
            s.transaction_id.clone(),
            s.status == SessionStatus::Completed,
            s.error_message.clone().unwrap_or_default(),
        ),
    }
}

pub fn run_audit(ctx: &AppContext, args: AuditArgs) -> anyhow::Result<()> {
    let caller = ctx.caller()?;
    let service = ctx.service()?;
    let events = service.pipeline().audit_log().events_for(&caller)?;

    if events.is_empty() {
        println!(
            "{}",
            "No audit events.".if_supports_color(Stdout, |t| t.yellow())
        );
        return Ok(());
    }

    let skip = events.len().saturating_sub(args.limit);
    let mut table = Table::new();
    table.set_header(vec!["Time", "Event", "Resource", "Result", "Detail"]);
    for event in &events[skip..] {
        let (name, resource, ok, detail) = describe(event);
        table.add_row(vec![
            Cell::new(event.timestamp().format("%Y-%m-%d %H:%M:%S")),
            Cell::new(name),
            Cell::new(resource),
            if ok {
                Cell::new("ok").fg(Color::Green)
            } else {
                Cell::new("failed").fg(Color::Red)
            },
            Cell::new(detail),
        ]);
    }
    println!("{table}");

    Ok(())
}
