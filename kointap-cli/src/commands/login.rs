//! Login command - authenticate and open a session

use anyhow::Result;
use dialoguer::{Input, Password};
use kointap_core::{LogEvent, OperationResult};

use super::{get_context, get_logger, log_event};
use crate::output;

fn get_password_or_prompt(password_flag: Option<String>) -> Result<String> {
    if let Some(p) = password_flag {
        return Ok(p);
    }
    if let Ok(p) = std::env::var("KOINTAP_PASSWORD") {
        return Ok(p);
    }
    Ok(Password::new().with_prompt("Password").interact()?)
}

pub fn run(email: Option<String>, password: Option<String>, json: bool) -> Result<()> {
    let logger = get_logger();
    let ctx = get_context()?;

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("Email").interact_text()?,
    };
    let password = get_password_or_prompt(password)?;

    match ctx.auth_service.login(&email, &password) {
        Ok(account) => {
            log_event(
                &logger,
                LogEvent::new("login_completed")
                    .with_operation("login")
                    .with_command("login"),
            );
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&OperationResult::ok(&account))?
                );
            } else {
                output::success(&format!("Logged in as {}", account.display_name));
                println!("  Balance: {}", output::format_ktc(&account.balance));
            }
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("login_failed")
                    .with_operation("login")
                    .with_command("login")
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
