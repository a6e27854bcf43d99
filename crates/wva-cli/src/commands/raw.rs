//! Raw web services access

use anyhow::{Context, Result};
use std::path::Path;
use wva_client::WvaClient;

use crate::output::OutputContext;

/// GET a web services path
pub async fn get(client: &WvaClient, path: &str, ctx: &OutputContext) -> Result<()> {
    let doc = client.get(path).await?;
    ctx.print_document(&doc);
    Ok(())
}

/// DELETE a web services path
pub async fn delete(client: &WvaClient, path: &str, ctx: &OutputContext) -> Result<()> {
    let doc = client.delete(path).await?;
    ctx.print_document(&doc);
    Ok(())
}

/// PUT the contents of `file` to a web services path
pub async fn put(client: &WvaClient, path: &str, file: &Path, ctx: &OutputContext) -> Result<()> {
    let body = read_body(file)?;
    let doc = client.put(path, body).await?;
    ctx.print_document(&doc);
    Ok(())
}

/// POST the contents of `file` to a web services path
pub async fn post(client: &WvaClient, path: &str, file: &Path, ctx: &OutputContext) -> Result<()> {
    let body = read_body(file)?;
    let doc = client.post(path, body).await?;
    ctx.print_document(&doc);
    Ok(())
}

fn read_body(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}
