//! Kointap CLI - the KTC tap-to-earn wallet in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{
    backup, balance, compact, demo, deposit, doctor, history, login, logout, logs, play, query,
    shop, signup, status, transfer, whoami, withdraw,
};

/// Kointap - tap, earn, and send KTC from your terminal
#[derive(Parser)]
#[command(name = "ktc", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Signup {
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Password (or set KOINTAP_PASSWORD)
        #[arg(long)]
        password: Option<String>,
        /// Display name (defaults to the email's local part)
        #[arg(long)]
        name: Option<String>,
        /// Referral code of the account that invited you
        #[arg(long)]
        referral: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in and open a session
    Login {
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Password (or set KOINTAP_PASSWORD)
        #[arg(long)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Close the current session
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the logged-in account
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show your KTC balance
    Balance {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send KTC to another account
    Transfer {
        /// Recipient referral code (KTC-XXXXXX) or wallet address (0x...)
        recipient: String,
        /// Amount of KTC to send
        amount: String,
        /// Optional note attached to both entries
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Credit KTC from the faucet (demo mode only)
    Deposit {
        /// Amount of KTC to credit
        amount: String,
        /// Optional note
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Withdraw KTC from your account
    Withdraw {
        /// Amount of KTC to withdraw
        amount: String,
        /// Optional note
        #[arg(long, short = 'd')]
        description: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show your entry history
    History {
        /// Number of entries to show
        #[arg(short, long, default_value = "25")]
        limit: i64,
        /// Export full history as CSV to a file
        #[arg(long)]
        export: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Play a tap round
    Play {
        /// Arm a boost item before the round starts
        #[arg(long)]
        boost: Option<String>,
        /// Simulate a round with this many taps instead of playing live
        #[arg(long)]
        taps: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Browse and buy boost items
    Shop {
        #[command(subcommand)]
        command: shop::ShopCommands,
    },

    /// Show ledger status and summary
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run ledger health checks
    Doctor {
        /// Show verbose output
        #[arg(long, short)]
        verbose: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage demo mode
    Demo {
        #[command(subcommand)]
        command: Option<demo::DemoCommands>,
    },

    /// Manage backups
    Backup {
        #[command(subcommand)]
        command: backup::BackupCommands,
    },

    /// View and manage application logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Execute a read-only SQL query against the ledger
    Query {
        /// SQL query to execute
        sql: Option<String>,
        /// Read SQL from file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: String,
        /// Output as JSON (shorthand for --format json)
        #[arg(long)]
        json: bool,
    },

    /// Compact the database
    Compact {
        /// Skip creating safety backup
        #[arg(long)]
        skip_backup: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Signup {
            email,
            password,
            name,
            referral,
            json,
        } => signup::run(email, password, name, referral, json),
        Commands::Login {
            email,
            password,
            json,
        } => login::run(email, password, json),
        Commands::Logout { json } => logout::run(json),
        Commands::Whoami { json } => whoami::run(json),
        Commands::Balance { json } => balance::run(json),
        Commands::Transfer {
            recipient,
            amount,
            description,
            yes,
            json,
        } => transfer::run(&recipient, &amount, description.as_deref(), yes, json),
        Commands::Deposit {
            amount,
            description,
            json,
        } => deposit::run(&amount, description.as_deref(), json),
        Commands::Withdraw {
            amount,
            description,
            yes,
            json,
        } => withdraw::run(&amount, description.as_deref(), yes, json),
        Commands::History {
            limit,
            export,
            json,
        } => history::run(limit, export.as_deref(), json),
        Commands::Play { boost, taps, json } => play::run(boost.as_deref(), taps, json),
        Commands::Shop { command } => shop::run(command),
        Commands::Status { json } => status::run(json),
        Commands::Doctor { verbose, json } => doctor::run(verbose, json),
        Commands::Demo { command } => demo::run(command),
        Commands::Backup { command } => backup::run(command),
        Commands::Logs { command } => logs::run(command),
        Commands::Query {
            sql,
            file,
            format,
            json,
        } => {
            let fmt = if json { "json".to_string() } else { format };
            query::run(sql.as_deref(), file.as_deref(), &fmt)
        }
        Commands::Compact { skip_backup, json } => compact::run(skip_backup, json),
    }
}
