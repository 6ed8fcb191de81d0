//! Transfer command - move money between accounts

use anyhow::Result;
use colored::Colorize;

use super::{authenticate, get_context};
use crate::output;
use ledgerline_core::services::TransferRequest;

pub async fn run(
    from: i64,
    to: i64,
    amount: i64,
    currency: &str,
    token: &str,
    json: bool,
) -> Result<()> {
    let ctx = get_context().await?;
    let payload = authenticate(&ctx, token)?;

    let result = ctx
        .transfer_service
        .create_transfer(
            &payload.username,
            TransferRequest {
                from_account_id: from,
                to_account_id: to,
                amount,
                currency: currency.to_string(),
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    output::success(&format!(
        "Transferred {} from account {} to account {}",
        output::format_amount(amount, &result.from_account.currency),
        from,
        to
    ));
    println!("  {} {}", "Transfer ID:".bold(), result.transfer.id);
    println!(
        "  {} {}",
        "Your new balance:".bold(),
        output::format_amount(result.from_account.balance, &result.from_account.currency)
    );
    Ok(())
}

/// Transfer history of one of the caller's accounts
pub async fn run_list(
    account_id: i64,
    limit: i64,
    offset: i64,
    token: &str,
    json: bool,
) -> Result<()> {
    let ctx = get_context().await?;
    let payload = authenticate(&ctx, token)?;
    let transfers = ctx
        .transfer_service
        .list_transfers(&payload.username, account_id, limit, offset)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&transfers)?);
        return Ok(());
    }

    if transfers.is_empty() {
        println!("No transfers found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Time", "From", "To", "Amount"]);
    for transfer in transfers {
        let amount = if transfer.from_account_id == account_id {
            format!("-{}", transfer.amount).red().to_string()
        } else {
            format!("+{}", transfer.amount).green().to_string()
        };
        table.add_row(vec![
            transfer.id.to_string(),
            output::format_time(&transfer.created_at),
            transfer.from_account_id.to_string(),
            transfer.to_account_id.to_string(),
            amount,
        ]);
    }
    println!("{}", table);
    Ok(())
}
