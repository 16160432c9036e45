//! Deposit command - credit the current account (demo mode only)

use anyhow::Result;
use kointap_core::{LogEvent, OperationResult};

use super::{get_context, get_logger, log_event, parse_amount};
use crate::output;

pub fn run(amount: &str, description: Option<&str>, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;
    let amount = parse_amount(amount)?;

    // Real deployments fund accounts through gameplay and referrals; the
    // faucet only exists against the throwaway demo ledger.
    if !ctx.config.demo_mode {
        anyhow::bail!("deposit is only available in demo mode, run 'ktc demo on' first");
    }

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

    match ctx
        .ledger_service
        .deposit(&account.id, amount, description.or(Some("Demo deposit")))
    {
        Ok(updated) => {
            log_event(
                &logger,
                LogEvent::new("deposit_completed")
                    .with_operation("deposit")
                    .with_command("deposit"),
            );
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(&updated))?
                );
            } else {
                output::success(&format!("Deposited {}", output::format_ktc(&amount)));
                println!("  New balance: {}", output::format_ktc(&updated.balance));
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("deposit_failed")
                    .with_operation("deposit")
                    .with_command("deposit")
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
