//! Demo command - manage demo mode

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use kointap_core::services::{DemoService, DEMO_PASSWORD};

use super::get_data_dir;

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Enable demo mode
    #[command(name = "on")]
    On,
    /// Disable demo mode
    #[command(name = "off")]
    Off,
    /// Show demo mode status
    Status,
}

pub fn run(command: Option<DemoCommands>) -> Result<()> {
    let data_dir = get_data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let demo_service = DemoService::new(&data_dir);

    match command {
        Some(DemoCommands::On) => {
            demo_service.enable()?;
            println!("{}", "Demo mode enabled".green());
            println!("A throwaway ledger with seeded accounts is now active.");
            println!(
                "Log in as faucet@demo.kointap (password '{}') and run 'ktc status'.",
                DEMO_PASSWORD
            );
            Ok(())
        }
        Some(DemoCommands::Off) => {
            demo_service.disable(false)?; // Keep the demo ledger around by default
            println!("{}", "Demo mode disabled".yellow());
            Ok(())
        }
        Some(DemoCommands::Status) | None => {
            if demo_service.is_enabled()? {
                println!("Demo mode is {}", "ON".green());
            } else {
                println!("Demo mode is {}", "OFF".yellow());
            }
            Ok(())
        }
    }
}
