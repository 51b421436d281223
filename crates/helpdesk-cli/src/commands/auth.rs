//! Authentication commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use helpdesk_api_client::RegisterRequest;
use std::io::{self, Write};

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn required(value: Option<String>, label: &str) -> Result<String> {
    let value = match value {
        Some(value) => value,
        None => prompt(label)?,
    };
    if value.is_empty() {
        anyhow::bail!("{} is required", label);
    }
    Ok(value)
}

fn read_password() -> Result<String> {
    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password is required");
    }
    Ok(password)
}

/// Sign in with username and password.
pub async fn login(ctx: &Context, username: Option<String>) -> Result<()> {
    let username = required(username, "Username")?;
    let password = read_password()?;

    let profile = ctx.session.login(&username, &password).await?;

    let message = match &profile {
        Some(profile) => format!("Logged in as {} ({})", profile.username, profile.role),
        None => format!("Logged in as {}", username),
    };
    output::print_success(&message, &ctx.format);
    Ok(())
}

/// Create an account and sign in with it.
pub async fn register(
    ctx: &Context,
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
) -> Result<()> {
    let account = RegisterRequest {
        username: required(username, "Username")?,
        email: required(email, "Email")?,
        first_name: first_name.unwrap_or_default(),
        last_name: last_name.unwrap_or_default(),
        password: read_password()?,
    };

    ctx.session.register(&account).await?;
    output::print_success(
        &format!("Registered and logged in as {}", account.username),
        &ctx.format,
    );
    Ok(())
}

/// Erase the stored session.
pub async fn logout(ctx: &Context) -> Result<()> {
    ctx.session.logout()?;
    output::print_success("Logged out", &ctx.format);
    Ok(())
}

/// Show the stored session, optionally probing the backend.
pub async fn status(ctx: &Context, check: bool) -> Result<()> {
    let valid = if check {
        Some(ctx.session.validate_session().await?)
    } else {
        None
    };
    let snapshot = ctx.session.status()?;

    match ctx.format {
        OutputFormat::Text => {
            output::print_heading("Session");
            output::print_row("Backend", ctx.client().base_url().as_str());
            output::print_row(
                "Logged in",
                if snapshot.signed_in { "yes" } else { "no" },
            );
            if let Some(profile) = &snapshot.profile {
                output::print_row("User", &profile.username);
                output::print_row("Role", &profile.role.to_string());
                output::print_row("Email", profile.email.as_deref().unwrap_or("-"));
            }
            if let Some(expires_at) = snapshot.access_expires_at {
                let expires = if snapshot.access_expired {
                    format!("{} (expired)", expires_at.to_rfc3339())
                } else {
                    expires_at.to_rfc3339()
                };
                output::print_row("Access expires", &expires);
            }
            if let Some(valid) = valid {
                output::print_row("Backend check", if valid { "ok" } else { "session expired" });
            }
        }
        OutputFormat::Json => {
            let mut value = serde_json::to_value(&snapshot)?;
            if let Some(valid) = valid {
                value["valid"] = serde_json::Value::Bool(valid);
            }
            output::print_json(&value)?;
        }
    }
    Ok(())
}
