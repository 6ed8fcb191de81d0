//! Init command - create the data directory, settings and schema

use anyhow::Result;
use colored::Colorize;

use super::{get_context, get_data_dir};
use ledgerline_core::config::Config;

pub async fn run(rotate_key: bool, json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let mut config = Config::load_file(&data_dir)?;
    let generated = rotate_key || config.token_symmetric_key.is_none();
    if generated {
        config.token_symmetric_key = Some(Config::generate_token_key());
        config.save(&data_dir)?;
    }

    let ctx = get_context().await?;
    let db_path = data_dir.join(&ctx.config.db_filename);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "data_dir": data_dir.to_string_lossy(),
                "database": db_path.to_string_lossy(),
                "environment": ctx.config.environment,
                "token_key_generated": generated,
            })
        );
        return Ok(());
    }

    println!("{}", "Ledger ready".green());
    println!("  Data directory: {}", data_dir.display());
    println!("  Database: {}", db_path.display());
    println!("  Environment: {}", ctx.config.environment);
    if generated {
        println!("  {}", "Generated a new token signing key".yellow());
        if rotate_key {
            println!("  Tokens issued with the old key are no longer valid.");
        }
    }

    Ok(())
}
