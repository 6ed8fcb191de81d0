//! Login command - exchange credentials for an access token

use anyhow::Result;
use colored::Colorize;
use dialoguer::Password;

use super::get_context;
use crate::output;

pub async fn run(username: &str, password: Option<String>, json: bool) -> Result<()> {
    let password = match password {
        Some(p) => p,
        None => Password::new().with_prompt("Password").interact()?,
    };

    let ctx = get_context().await?;
    let login = ctx.user_service.login_user(username, &password).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&login)?);
        return Ok(());
    }

    output::success(&format!("Logged in as {}", login.user.username));
    println!(
        "  {} {}",
        "Expires:".bold(),
        output::format_time(&login.access_token_expires_at)
    );
    println!();
    println!("{}", login.access_token);
    println!();
    output::info("Pass it with --token or export LEDGERLINE_TOKEN");
    Ok(())
}
