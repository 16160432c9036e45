//! History command - recent ledger entries for the current account

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::Cell;
use kointap_core::{OperationResult, Transaction};

use super::get_context;
use crate::output;

pub fn run(limit: i64, export: Option<&Path>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    let account = match ctx.auth_service.require_account() {
        Ok(account) => account,
        Err(e) => {
            if json {
                output::exit_operation_error(e)
            } else {
                return Err(e.into());
            }
        }
    };

    let limit = if limit <= 0 { None } else { Some(limit) };
    let entries = ctx.ledger_service.history(&account.id, limit)?;

    if let Some(path) = export {
        export_csv(&entries, path)?;
        output::success(&format!(
            "Exported {} entries to {}",
            entries.len(),
            path.display()
        ));
        return Ok(());
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&OperationResult::ok(&entries))?
        );
        return Ok(());
    }

    if entries.is_empty() {
        output::info("No entries yet. Run 'ktc play' to earn your first KTC.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Date", "Kind", "Amount", "Counterparty", "Description"]);
    for entry in &entries {
        let amount = entry.signed_amount();
        let amount_cell = if amount.is_sign_negative() {
            Cell::new(output::format_ktc(&amount)).fg(comfy_table::Color::Red)
        } else {
            Cell::new(format!("+{}", output::format_ktc(&amount)))
                .fg(comfy_table::Color::Green)
        };
        table.add_row(vec![
            Cell::new(entry.created_at.format("%Y-%m-%d %H:%M").to_string()),
            Cell::new(entry.kind.as_str()),
            amount_cell,
            Cell::new(entry.counterparty_handle.as_deref().unwrap_or("-")),
            Cell::new(entry.description.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn export_csv(entries: &[Transaction], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    writer.write_record([
        "date",
        "kind",
        "amount",
        "counterparty",
        "description",
        "transfer_id",
    ])?;
    for entry in entries {
        writer.write_record([
            entry.created_at.to_rfc3339(),
            entry.kind.as_str().to_string(),
            entry.signed_amount().to_string(),
            entry.counterparty_handle.clone().unwrap_or_default(),
            entry.description.clone().unwrap_or_default(),
            entry
                .transfer_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
