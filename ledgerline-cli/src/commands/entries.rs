//! Entries command - the ledger lines of one account

use anyhow::Result;
use colored::Colorize;

use super::{authenticate, get_context};
use crate::output;

pub async fn run(account_id: i64, limit: i64, offset: i64, token: &str, json: bool) -> Result<()> {
    let ctx = get_context().await?;
    let payload = authenticate(&ctx, token)?;
    let entries = ctx
        .account_service
        .list_entries(&payload.username, account_id, limit, offset)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Time", "Amount"]);
    for entry in entries {
        let amount = if entry.is_debit() {
            entry.amount.to_string().red().to_string()
        } else {
            format!("+{}", entry.amount).green().to_string()
        };
        table.add_row(vec![
            entry.id.to_string(),
            output::format_time(&entry.created_at),
            amount,
        ]);
    }
    println!("{}", table);
    Ok(())
}
