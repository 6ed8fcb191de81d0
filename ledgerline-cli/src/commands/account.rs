//! Account command - open, inspect and fund accounts

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::{authenticate, get_context};
use crate::output;
use ledgerline_core::domain::SUPPORTED_CURRENCIES;
use ledgerline_core::Account;

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open an account in a currency (USD, EUR, CAD)
    New {
        /// Currency code
        currency: String,
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one of your accounts
    Show {
        /// Account ID
        id: i64,
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List your accounts
    List {
        /// Page size
        #[arg(long, default_value = "10")]
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
    /// Set an account balance directly (operator action, writes no entries)
    Fund {
        /// Account ID
        id: i64,
        /// New balance
        #[arg(long)]
        balance: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Close one of your accounts
    Delete {
        /// Account ID
        id: i64,
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },
}

pub async fn run(command: AccountCommands) -> Result<()> {
    let ctx = get_context().await?;

    match command {
        AccountCommands::New {
            currency,
            token,
            json,
        } => {
            let payload = authenticate(&ctx, &token)?;
            let account = ctx
                .account_service
                .create_account(&payload.username, &currency)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                output::success(&format!(
                    "Opened {} account {}",
                    account.currency, account.id
                ));
            }
        }
        AccountCommands::Show { id, token, json } => {
            let payload = authenticate(&ctx, &token)?;
            let account = ctx.account_service.get_account(&payload.username, id).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                print_accounts(&[account]);
            }
        }
        AccountCommands::List {
            limit,
            offset,
            token,
            json,
        } => {
            let payload = authenticate(&ctx, &token)?;
            let accounts = ctx
                .account_service
                .list_accounts(&payload.username, limit, offset)
                .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else if accounts.is_empty() {
                println!(
                    "No accounts yet. Open one with `lgl account new <{}>`",
                    SUPPORTED_CURRENCIES.join("|")
                );
            } else {
                print_accounts(&accounts);
            }
        }
        AccountCommands::Fund { id, balance, json } => {
            let account = ctx.account_service.set_balance(id, balance).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                output::success(&format!(
                    "Account {} balance set to {}",
                    account.id,
                    output::format_amount(account.balance, &account.currency)
                ));
            }
        }
        AccountCommands::Delete { id, token, force } => {
            let payload = authenticate(&ctx, &token)?;
            let account = ctx.account_service.get_account(&payload.username, id).await?;

            if !force
                && !Confirm::new()
                    .with_prompt(format!(
                        "Close {} account {} with balance {}?",
                        account.currency,
                        account.id,
                        output::format_amount(account.balance, &account.currency)
                    ))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            ctx.account_service
                .delete_account(&payload.username, id)
                .await?;
            output::success(&format!("Closed account {}", id));
        }
    }

    Ok(())
}

fn print_accounts(accounts: &[Account]) {
    let mut table = output::create_table();
    table.set_header(vec!["ID", "Currency", "Balance", "Opened"]);
    for account in accounts {
        table.add_row(vec![
            account.id.to_string(),
            account.currency.clone(),
            account.balance.to_string(),
            output::format_time(&account.created_at),
        ]);
    }
    println!("{}", "Accounts".bold());
    println!("{}", table);
}
