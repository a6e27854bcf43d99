//! Subscription management commands

use anyhow::{Context, Result};
use wva_client::Wva;

use crate::output::{OutputContext, SubscriptionRow};

/// List subscriptions with their settings
pub async fn subscriptions(wva: &Wva, ctx: &OutputContext) -> Result<()> {
    let handles = wva.subscriptions().await?;

    let mut rows = Vec::with_capacity(handles.len());
    for handle in handles {
        let meta = handle
            .metadata()
            .await
            .with_context(|| format!("Failed to read subscription {}", handle.short_name()))?;
        rows.push(SubscriptionRow {
            short_name: handle.short_name().to_string(),
            uri: meta.uri,
            buffer: meta.buffer,
            interval: meta.interval,
        });
    }

    ctx.print(&rows);
    Ok(())
}

/// Create or replace a subscription
pub async fn subscribe(
    wva: &Wva,
    short_name: &str,
    uri: &str,
    interval: u32,
    buffer: &str,
    ctx: &OutputContext,
) -> Result<()> {
    wva.subscription(short_name)
        .create(uri, buffer, interval)
        .await?;
    ctx.success(&format!(
        "Subscribed {} to {} every {}s",
        short_name, uri, interval
    ));
    Ok(())
}

/// Delete a subscription
pub async fn unsubscribe(wva: &Wva, short_name: &str, ctx: &OutputContext) -> Result<()> {
    wva.subscription(short_name).delete().await?;
    ctx.success(&format!("Deleted subscription {}", short_name));
    Ok(())
}
