//! Shop commands - catalog, purchases, and owned boosts

use anyhow::Result;
use clap::Subcommand;
use kointap_core::{LogEvent, OperationResult};

use super::{get_context, get_logger, log_event};
use crate::output;

#[derive(Subcommand)]
pub enum ShopCommands {
    /// List the boost catalog
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Buy one unit of a boost
    Buy {
        /// Item id, e.g. 'double-tap'
        item: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show boosts you own
    Owned {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: ShopCommands) -> Result<()> {
    match command {
        ShopCommands::List { json } => list(json),
        ShopCommands::Buy { item, json } => buy(&item, json),
        ShopCommands::Owned { json } => owned(json),
    }
}

fn list(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let catalog = ctx.shop_service.catalog();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&OperationResult::ok(&catalog))?
        );
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Id", "Name", "Effect", "Price"]);
    for item in &catalog {
        table.add_row(vec![
            item.id.clone(),
            item.name.clone(),
            format!("x{} for {} taps", item.factor, item.charges),
            output::format_ktc(&item.price),
        ]);
    }
    println!("{table}");
    println!("Buy with 'ktc shop buy <id>', arm with 'ktc play --boost <id>'.");
    Ok(())
}

fn buy(item_id: &str, json: bool) -> Result<()> {
    let logger = get_logger();
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

    match ctx.shop_service.buy(&account.id, item_id) {
        Ok(receipt) => {
            log_event(
                &logger,
                LogEvent::new("purchase_completed")
                    .with_operation("shop_buy")
                    .with_command("shop buy"),
            );
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(&receipt))?
                );
            } else {
                output::success(&format!(
                    "Bought {} for {}",
                    receipt.item.name,
                    output::format_ktc(&receipt.item.price)
                ));
                println!("  New balance: {}", output::format_ktc(&receipt.balance));
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("purchase_failed")
                    .with_operation("shop_buy")
                    .with_command("shop buy")
                    .with_error(e.class()),
            );
            if json {
                output::exit_operation_error(e)
            } else {
                Err(e.into())
            }
        }
    }
}

fn owned(json: bool) -> Result<()> {
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

    let owned = ctx.shop_service.owned(&account.id)?;

    if json {
        let rows: Vec<_> = owned
            .iter()
            .map(|(item, o)| {
                serde_json::json!({
                    "item": item,
                    "quantity": o.quantity,
                    "acquired_at": o.acquired_at,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&OperationResult::ok(rows))?
        );
        return Ok(());
    }

    if owned.is_empty() {
        output::info("No boosts owned. Browse the catalog with 'ktc shop list'.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Id", "Name", "Effect", "Quantity"]);
    for (item, o) in &owned {
        table.add_row(vec![
            item.id.clone(),
            item.name.clone(),
            format!("x{} for {} taps", item.factor, item.charges),
            o.quantity.to_string(),
        ]);
    }
    println!("{table}");
    Ok(())
}
