//! Ticket commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use helpdesk_api_client::Resource;
use serde_json::{json, Map, Value};

/// List tickets visible to the signed-in user.
pub async fn tickets_list(ctx: &Context) -> Result<()> {
    let tickets = ctx.api.list(Resource::Tickets).await?;

    match ctx.format {
        OutputFormat::Text => {
            let rows = output::items(&tickets);
            if rows.is_empty() {
                println!("No tickets found");
                return Ok(());
            }
            println!("{:<8} {:<40} {:<14} {}", "ID", "Subject", "Status", "Priority");
            println!("{}", "-".repeat(80));
            for ticket in rows {
                println!(
                    "{:<8} {:<40} {:<14} {}",
                    output::field(ticket, "id"),
                    output::cell(&output::first_field(ticket, &["subject", "title"]), 40),
                    output::first_field(ticket, &["status_label", "status"]),
                    output::first_field(ticket, &["priority_label", "priority"]),
                );
            }
        }
        OutputFormat::Json => output::print_json(&tickets)?,
    }
    Ok(())
}

/// Show one ticket.
pub async fn tickets_show(ctx: &Context, id: i64) -> Result<()> {
    let ticket = ctx.api.get(Resource::Tickets, id).await?;

    match ctx.format {
        OutputFormat::Text => {
            output::print_heading(&format!("Ticket #{}", id));
            output::print_row("Subject", &output::first_field(&ticket, &["subject", "title"]));
            output::print_row("Status", &output::first_field(&ticket, &["status_label", "status"]));
            output::print_row(
                "Priority",
                &output::first_field(&ticket, &["priority_label", "priority"]),
            );
            output::print_row("Queue", &output::first_field(&ticket, &["queue_name", "queue"]));
            output::print_row("Created", &output::field(&ticket, "created_at"));
            output::print_row("Thread", &output::field(&ticket, "thread_id"));
            println!();
            println!("{}", output::field(&ticket, "description"));
        }
        OutputFormat::Json => output::print_json(&ticket)?,
    }
    Ok(())
}

/// Open a new ticket.
pub async fn tickets_create(
    ctx: &Context,
    subject: String,
    description: String,
    queue: Option<i64>,
    priority: Option<i64>,
) -> Result<()> {
    let mut body = Map::new();
    body.insert("subject".to_string(), json!(subject));
    body.insert("description".to_string(), json!(description));
    if let Some(queue) = queue {
        body.insert("queue".to_string(), json!(queue));
    }
    if let Some(priority) = priority {
        body.insert("priority_id".to_string(), json!(priority));
    }

    let ticket = ctx.api.create(Resource::Tickets, &Value::Object(body)).await?;

    match ctx.format {
        OutputFormat::Text => println!("Created ticket #{}", output::field(&ticket, "id")),
        OutputFormat::Json => output::print_json(&ticket)?,
    }
    Ok(())
}

/// Mark a ticket closed.
pub async fn tickets_close(ctx: &Context, id: i64) -> Result<()> {
    ctx.api.close_ticket(id).await?;
    output::print_success(&format!("Closed ticket #{}", id), &ctx.format);
    Ok(())
}

/// Delete a ticket.
pub async fn tickets_delete(ctx: &Context, id: i64) -> Result<()> {
    ctx.api.remove(Resource::Tickets, id).await?;
    output::print_success(&format!("Deleted ticket #{}", id), &ctx.format);
    Ok(())
}
