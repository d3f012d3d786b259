//! Ping command - connectivity and credential check

use anyhow::{Context, Result};
use dentiq_client::DentiqClient;

use crate::output::OutputContext;

/// Probe the partner API with the configured credentials
pub async fn ping(client: &DentiqClient, ctx: &OutputContext) -> Result<()> {
    client
        .check_connection()
        .await
        .context("Partner API connection failed")?;

    ctx.success(&format!("Partner API reachable at {}", client.base_url()));
    Ok(())
}
