//! Whoami command - show who a token was issued to

use anyhow::Result;
use colored::Colorize;

use super::{authenticate, get_context};
use crate::output;

pub async fn run(token: &str, json: bool) -> Result<()> {
    let ctx = get_context().await?;
    let payload = authenticate(&ctx, token)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{}", payload.username.bold());
    println!("  Token ID: {}", payload.id);
    println!("  Issued:   {}", output::format_time(&payload.issued_at));
    println!("  Expires:  {}", output::format_time(&payload.expired_at));
    Ok(())
}
