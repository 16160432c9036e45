//! CLI command implementations

pub mod backup;
pub mod balance;
pub mod compact;
pub mod demo;
pub mod deposit;
pub mod doctor;
pub mod history;
pub mod login;
pub mod logout;
pub mod logs;
pub mod play;
pub mod query;
pub mod shop;
pub mod signup;
pub mod status;
pub mod transfer;
pub mod whoami;
pub mod withdraw;

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use kointap_core::{EntryPoint, KointapContext, LogEvent, LoggingService};
use rust_decimal::Decimal;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    get_logger_for(EntryPoint::Cli)
}

pub fn get_logger_for(entry_point: EntryPoint) -> Option<LoggingService> {
    let data_dir = get_data_dir();
    // Ensure directory exists
    std::fs::create_dir_all(&data_dir).ok()?;
    LoggingService::new(&data_dir, entry_point, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the kointap directory from environment or default
pub fn get_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("KOINTAP_DIR") {
        PathBuf::from(dir)
    } else {
        dirs::home_dir()
            .expect("Could not find home directory")
            .join(".kointap")
    }
}

/// Get or create kointap context
pub fn get_context() -> Result<KointapContext> {
    let data_dir = get_data_dir();

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create kointap directory: {:?}", data_dir))?;

    KointapContext::new(&data_dir).context("Failed to initialize kointap context")
}

/// Parse a CLI amount argument
pub fn parse_amount(input: &str) -> Result<Decimal> {
    Decimal::from_str(input.trim())
        .with_context(|| format!("'{}' is not a valid KTC amount", input))
}
