//! Status command - show ledger status and summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Kointap Ledger Status".bold());
    if ctx.config.demo_mode {
        println!("{}", "(demo mode)".yellow());
    }
    println!();

    // Summary as vertical key-value pairs
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Accounts", &status.total_accounts.to_string()]);
    table.add_row(vec!["Identities", &status.total_identities.to_string()]);
    table.add_row(vec!["Entries", &status.total_entries.to_string()]);
    table.add_row(vec!["Total supply", &output::format_ktc(&status.total_supply)]);
    table.add_row(vec!["Database size", &output::format_size(status.db_size_bytes)]);

    println!("{}", table);
    println!();

    if let (Some(earliest), Some(latest)) = (&status.date_range.earliest, &status.date_range.latest)
    {
        println!("Entry range: {} to {}", earliest, latest);
        println!();
    }

    if !status.accounts.is_empty() {
        println!("{}", "Accounts".bold());
        let mut accounts_table = output::create_table();
        accounts_table.set_header(vec!["Name", "Code", "Balance"]);
        for account in &status.accounts {
            accounts_table.add_row(vec![
                account.display_name.clone(),
                account.referral_code.clone(),
                output::format_ktc(&account.balance),
            ]);
        }
        println!("{}", accounts_table);
    }

    Ok(())
}
