//! Whoami command - show the session-holder's account

use anyhow::Result;
use kointap_core::OperationResult;
use serde_json::json;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;

    let account = match ctx.auth_service.current_account()? {
        Some(account) => account,
        None => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(json!({
                        "logged_in": false
                    })))?
                );
            } else {
                output::info("Not logged in. Run 'ktc login' or 'ktc signup' first.");
            }
            return Ok(());
        }
    };

    let email = ctx
        .store
        .get_identity_by_id(&account.identity_id)?
        .map(|i| i.email)
        .unwrap_or_default();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&OperationResult::ok(json!({
                "logged_in": true,
                "email": email,
                "account": account,
            })))?
        );
    } else {
        println!("Name:           {}", account.display_name);
        println!("Email:          {}", email);
        println!("Referral code:  {}", account.referral_code);
        println!("Wallet:         {}", account.wallet_address);
        println!("Balance:        {}", output::format_ktc(&account.balance));
        println!(
            "Email verified: {}",
            if account.email_verified { "yes" } else { "no" }
        );
        println!(
            "KYC verified:   {}",
            if account.kyc_verified { "yes" } else { "no" }
        );
    }
    Ok(())
}
