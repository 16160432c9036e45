//! Signup command - create an identity and its account

use anyhow::Result;
use dialoguer::{Input, Password};
use kointap_core::{LogEvent, OperationResult};
use rust_decimal::Decimal;

use super::{get_context, get_logger, log_event};
use crate::output;

/// Get password from --password flag, KOINTAP_PASSWORD env var, or prompt
/// with confirmation
fn get_password_or_prompt(password_flag: Option<String>) -> Result<String> {
    if let Some(p) = password_flag {
        return Ok(p);
    }
    if let Ok(p) = std::env::var("KOINTAP_PASSWORD") {
        return Ok(p);
    }

    let p1 = Password::new().with_prompt("Password").interact()?;
    let p2 = Password::new().with_prompt("Confirm password").interact()?;
    if p1 != p2 {
        anyhow::bail!("Passwords do not match");
    }
    Ok(p1)
}

pub fn run(
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    referral: Option<String>,
    json: bool,
) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let password = get_password_or_prompt(password)?;

    match ctx
        .auth_service
        .signup(&email, &password, name.as_deref(), referral.as_deref())
    {
        Ok(receipt) => {
            log_event(
                &logger,
                LogEvent::new("signup_completed")
                    .with_operation("signup")
                    .with_command("signup"),
            );

            // Open a session right away so the first play is one command away
            ctx.auth_service.login(&email, &password)?;

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(receipt))?
                );
            } else {
                output::success("Account created");
                println!("  Name:          {}", receipt.account.display_name);
                println!("  Referral code: {}", receipt.account.referral_code);
                println!("  Wallet:        {}", receipt.account.wallet_address);
                if receipt.welcome_bonus > Decimal::ZERO {
                    println!(
                        "  Welcome bonus: {}",
                        output::format_ktc(&receipt.welcome_bonus)
                    );
                }
                if let Some(code) = &receipt.referrer_code {
                    println!("  Referred by:   {}", code);
                }
                println!();
                println!("You are logged in. Run 'ktc play' to start earning.");
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("signup_failed")
                    .with_operation("signup")
                    .with_command("signup")
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
