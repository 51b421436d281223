//! Knowledge base commands.

use super::Context;
use crate::output::{self, OutputFormat};
use anyhow::Result;
use serde_json::Value;

fn print_articles(articles: &Value, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            let rows = output::items(articles);
            if rows.is_empty() {
                println!("No articles found");
                return Ok(());
            }
            for article in rows {
                println!(
                    "{:<6} {}",
                    output::field(article, "id"),
                    output::first_field(article, &["title", "question"])
                );
            }
        }
        OutputFormat::Json => output::print_json(articles)?,
    }
    Ok(())
}

/// Full-text search.
pub async fn kb_search(ctx: &Context, query: &str) -> Result<()> {
    let articles = ctx.api.search_knowledge_base(query).await?;
    print_articles(&articles, &ctx.format)
}

/// Title suggestions for a partial query.
pub async fn kb_suggest(ctx: &Context, query: &str) -> Result<()> {
    let articles = ctx.api.suggest_articles(query).await?;
    print_articles(&articles, &ctx.format)
}
