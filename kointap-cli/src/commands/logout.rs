//! Logout command - discard the local session

use anyhow::Result;
use kointap_core::OperationResult;
use serde_json::json;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let was_logged_in = ctx.auth_service.logout()?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&OperationResult::ok(json!({
                "was_logged_in": was_logged_in
            })))?
        );
    } else if was_logged_in {
        output::success("Logged out");
    } else {
        output::info("No active session");
    }
    Ok(())
}
