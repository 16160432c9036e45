//! Balance command - show the current account's balance

use anyhow::Result;
use kointap_core::OperationResult;
use serde_json::json;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;

    match ctx.auth_service.require_account() {
        Ok(account) => {
            // Balance may have moved since login, read it fresh
            let account = ctx.ledger_service.balance(&account.id)?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(json!({
                        "balance": account.balance,
                        "referral_code": account.referral_code,
                    })))?
                );
            } else {
                println!("{}", output::format_ktc(&account.balance));
            }
            Ok(())
        }
        Err(e) => {
            if json {
                output::exit_operation_error(e)
            } else {
                Err(e.into())
            }
        }
    }
}
