//! Transfer command - move KTC to another account

use anyhow::Result;
use dialoguer::Confirm;
use kointap_core::{LogEvent, OperationResult};

use super::{get_context, get_logger, log_event, parse_amount};
use crate::output;

pub fn run(
    recipient: &str,
    amount: &str,
    description: Option<&str>,
    yes: bool,
    json: bool,
) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let amount = parse_amount(amount)?;

    let sender = match ctx.auth_service.require_account() {
        Ok(account) => account,
        Err(e) => {
            if json {
                output::exit_operation_error(e)
            } else {
                return Err(e.into());
            }
        }
    };

    if !yes && !json {
        let prompt = format!(
            "Send {} to '{}'?",
            output::format_ktc(&amount),
            recipient
        );
        if !Confirm::new().with_prompt(prompt).interact()? {
            output::info("Transfer cancelled");
            return Ok(());
        }
    }

    match ctx
        .ledger_service
        .transfer(&sender, recipient, amount, description)
    {
        Ok(receipt) => {
            log_event(
                &logger,
                LogEvent::new("transfer_completed")
                    .with_operation("transfer")
                    .with_command("transfer"),
            );
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(receipt))?
                );
            } else {
                output::success(&format!(
                    "Sent {} to {} ({})",
                    output::format_ktc(&receipt.amount),
                    receipt.recipient_name,
                    receipt.recipient_code
                ));
                println!(
                    "  New balance: {}",
                    output::format_ktc(&receipt.sender_balance)
                );
                println!("  Transfer id: {}", receipt.transfer_id);
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("transfer_failed")
                    .with_operation("transfer")
                    .with_command("transfer")
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
