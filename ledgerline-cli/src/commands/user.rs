//! User command - register and manage users

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::{Input, Password};

use super::{authenticate, get_context};
use crate::output;
use ledgerline_core::services::{CreateUserRequest, UpdateUserRequest};
use ledgerline_core::UserProfile;

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    New {
        /// Username (lowercase letters, digits, underscore)
        #[arg(long)]
        username: Option<String>,
        /// Full name
        #[arg(long)]
        full_name: Option<String>,
        /// Email address
        #[arg(long)]
        email: Option<String>,
        /// Password (prompted if omitted)
        #[arg(long, env = "LEDGERLINE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the logged-in user's profile
    Show {
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update the logged-in user's profile
    Update {
        /// Access token from `lgl login`
        #[arg(long, env = "LEDGERLINE_TOKEN", hide_env_values = true)]
        token: String,
        /// New full name
        #[arg(long)]
        full_name: Option<String>,
        /// New email address
        #[arg(long)]
        email: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        change_password: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(command: UserCommands) -> Result<()> {
    match command {
        UserCommands::New {
            username,
            full_name,
            email,
            password,
            json,
        } => run_new(username, full_name, email, password, json).await,
        UserCommands::Show { token, json } => run_show(&token, json).await,
        UserCommands::Update {
            token,
            full_name,
            email,
            change_password,
            json,
        } => run_update(&token, full_name, email, change_password, json).await,
    }
}

fn prompt_if_missing(value: Option<String>, prompt: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::new().with_prompt(prompt).interact_text()?),
    }
}

async fn run_new(
    username: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    json: bool,
) -> Result<()> {
    let username = prompt_if_missing(username, "Username")?;
    let full_name = prompt_if_missing(full_name, "Full name")?;
    let email = prompt_if_missing(email, "Email")?;
    let password = match password {
        Some(p) => p,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()?,
    };

    let ctx = get_context().await?;
    let user = ctx
        .user_service
        .create_user(CreateUserRequest {
            username,
            password,
            full_name,
            email,
        })
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        output::success(&format!("Created user {}", user.username));
        print_profile(&user);
    }
    Ok(())
}

async fn run_show(token: &str, json: bool) -> Result<()> {
    let ctx = get_context().await?;
    let payload = authenticate(&ctx, token)?;
    let user = ctx.user_service.get_user(&payload.username).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        print_profile(&user);
    }
    Ok(())
}

async fn run_update(
    token: &str,
    full_name: Option<String>,
    email: Option<String>,
    change_password: bool,
    json: bool,
) -> Result<()> {
    let ctx = get_context().await?;
    let payload = authenticate(&ctx, token)?;

    let password = if change_password {
        Some(
            Password::new()
                .with_prompt("New password")
                .with_confirmation("Confirm password", "Passwords don't match")
                .interact()?,
        )
    } else {
        None
    };
    if full_name.is_none() && email.is_none() && password.is_none() {
        output::warning("Nothing to update");
        return Ok(());
    }

    let user = ctx
        .user_service
        .update_user(
            &payload.username,
            UpdateUserRequest {
                username: payload.username.clone(),
                password,
                full_name,
                email,
            },
        )
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&user)?);
    } else {
        output::success("Profile updated");
        print_profile(&user);
    }
    Ok(())
}

fn print_profile(user: &UserProfile) {
    println!("  {} {}", "Username:".bold(), user.username);
    println!("  {} {}", "Full name:".bold(), user.full_name);
    println!("  {} {}", "Email:".bold(), user.email);
    println!(
        "  {} {}",
        "Created:".bold(),
        output::format_time(&user.created_at)
    );
    if let Some(changed) = &user.password_changed_at {
        println!(
            "  {} {}",
            "Password changed:".bold(),
            output::format_time(changed)
        );
    }
}
