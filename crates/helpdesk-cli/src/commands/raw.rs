//! Arbitrary authenticated request.

use super::Context;
use crate::output;
use anyhow::{Context as _, Result};
use helpdesk_api_client::{ApiRequest, Method};
use serde_json::Value;

pub async fn raw_request(ctx: &Context, method: &str, path: &str, body: Option<&str>) -> Result<()> {
    let method = method
        .to_ascii_uppercase()
        .parse::<Method>()
        .with_context(|| format!("invalid HTTP method: {}", method))?;

    let mut request = ApiRequest::new(method, path);
    if let Some(body) = body {
        let body: Value = serde_json::from_str(body).context("--body is not valid JSON")?;
        request = request.with_body(body);
    }

    let response = ctx.client().request(request).await?;

    // Non-JSON bodies are printed as received.
    match serde_json::from_str::<Value>(&response.body) {
        Ok(value) => output::print_json(&value)?,
        Err(_) => println!("{}", response.body),
    }
    Ok(())
}
