//! Ledgerline CLI - a banking ledger in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{account, entries, init, log_event, login, logs, transfer, user, whoami};
use ledgerline_core::services::LogEvent;

/// Ledgerline - accounts, transfers and access tokens
#[derive(Parser)]
#[command(name = "lgl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory, settings and database
    Init {
        /// Replace the token signing key, invalidating issued tokens
        #[arg(long)]
        rotate_key: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register and manage users
    User {
        #[command(subcommand)]
        command: user::UserCommands,
    },

    /// Log in and print an access token
    Login {
        /// Username
        username: String,
        /// Password (prompted if omitted)
        #[arg(long, env = "LEDGERLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show who an access token belongs to
    Whoami {
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Open and inspect accounts
    Account {
        #[command(subcommand)]
        command: account::AccountCommands,
    },

    /// Transfer money from one of your accounts
    Transfer {
        /// Source account ID (must be yours)
        #[arg(long)]
        from: i64,
        /// Destination account ID
        #[arg(long)]
        to: i64,
        /// Amount in integer currency units
        #[arg(long)]
        amount: i64,
        /// Currency of both accounts
        #[arg(long)]
        currency: String,
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List transfers into or out of one of your accounts
    Transfers {
        /// Account ID
        account_id: i64,
        /// Page size
        #[arg(long, default_value = "20")]
        limit: i64,
        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List ledger entries of one of your accounts
    Entries {
        /// Account ID
        account_id: i64,
        /// Page size
        #[arg(long, default_value = "20")]
        limit: i64,
        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: i64,
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    /// Name recorded in the event log; never includes arguments
    fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::User { command } => match command {
                user::UserCommands::New { .. } => "user new",
                user::UserCommands::Show { .. } => "user show",
                user::UserCommands::Update { .. } => "user update",
            },
            Commands::Login { .. } => "login",
            Commands::Whoami { .. } => "whoami",
            Commands::Account { command } => match command {
                account::AccountCommands::New { .. } => "account new",
                account::AccountCommands::Show { .. } => "account show",
                account::AccountCommands::List { .. } => "account list",
                account::AccountCommands::Fund { .. } => "account fund",
                account::AccountCommands::Delete { .. } => "account delete",
            },
            Commands::Transfer { .. } => "transfer",
            Commands::Transfers { .. } => "transfers",
            Commands::Entries { .. } => "entries",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Error name safe to persist: the core error kind, or a generic label
fn error_kind(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<ledgerline_core::Error>()
        .map(ledgerline_core::Error::kind)
        .unwrap_or("cli_error")
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let logger = commands::get_logger();
    let name = cli.command.name();
    log_event(&logger, LogEvent::new("command_executed").with_command(name));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("command_failed")
                    .with_command(name)
                    .with_error(error_kind(&e)),
            );
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { rotate_key, json } => init::run(rotate_key, json).await,
        Commands::User { command } => user::run(command).await,
        Commands::Login {
            username,
            password,
            json,
        } => login::run(&username, password, json).await,
        Commands::Whoami { token, json } => whoami::run(&token, json).await,
        Commands::Account { command } => account::run(command).await,
        Commands::Transfer {
            from,
            to,
            amount,
            currency,
            token,
            json,
        } => transfer::run(from, to, amount, &currency, &token, json).await,
        Commands::Transfers {
            account_id,
            limit,
            offset,
            token,
            json,
        } => transfer::run_list(account_id, limit, offset, &token, json).await,
        Commands::Entries {
            account_id,
            limit,
            offset,
            token,
            json,
        } => entries::run(account_id, limit, offset, &token, json).await,
        Commands::Logs { command } => logs::run(command),
    }
}
