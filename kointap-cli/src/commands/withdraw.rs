//! Withdraw command - funds-checked debit against the current account

use anyhow::Result;
use dialoguer::Confirm;
use kointap_core::{LogEvent, OperationResult};

use super::{get_context, get_logger, log_event, parse_amount};
use crate::output;

pub fn run(amount: &str, description: Option<&str>, yes: bool, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let amount = parse_amount(amount)?;

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

    if !yes && !json {
        let prompt = format!("Withdraw {}?", output::format_ktc(&amount));
        if !Confirm::new().with_prompt(prompt).interact()? {
            output::info("Withdrawal cancelled");
            return Ok(());
        }
    }

    match ctx.ledger_service.withdraw(&account.id, amount, description) {
        Ok(updated) => {
            log_event(
                &logger,
                LogEvent::new("withdraw_completed")
                    .with_operation("withdraw")
                    .with_command("withdraw"),
            );
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(&updated))?
                );
            } else {
                output::success(&format!("Withdrew {}", output::format_ktc(&amount)));
                println!("  New balance: {}", output::format_ktc(&updated.balance));
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("withdraw_failed")
                    .with_operation("withdraw")
                    .with_command("withdraw")
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
