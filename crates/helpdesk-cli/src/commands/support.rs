//! Chatbot and ticket conversation commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;

/// Ask the support chatbot.
pub async fn chat(ctx: &Context, message: &str) -> Result<()> {
    let reply = ctx.api.chat(message).await?;

    match ctx.format {
        OutputFormat::Text => {
            println!("{}", output::first_field(&reply, &["reply", "response", "message"]));
        }
        OutputFormat::Json => output::print_json(&reply)?,
    }
    Ok(())
}

/// Reply on a ticket's comment thread.
pub async fn comment(ctx: &Context, ticket_id: i64, text: &str) -> Result<()> {
    let posted = ctx.api.post_comment(ticket_id, text).await?;

    match ctx.format {
        OutputFormat::Text => println!("Comment posted on ticket #{}", ticket_id),
        OutputFormat::Json => output::print_json(&posted)?,
    }
    Ok(())
}
