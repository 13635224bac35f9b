//! Rendezvous probe: dial, announce the role and run the version handshake.
//!
//! Run with: cargo run --bin punch_probe
//!
//! Settings come from the transhift config file, a local `.env`, and the
//! `TRANSHIFT_HOST` / `TRANSHIFT_PORT` / `TRANSHIFT_ROLE` overrides.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use transhift_core::{AppConfig, Negotiator};
use transhift_punch::Puncher;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .init();

    let mut config = AppConfig::load();
    config.apply_env_overrides()?;

    let known: Vec<&str> = config.compatibility.versions().collect();
    info!(
        "Probing as {} (expecting a {} peer), known versions {:?}",
        config.role,
        config.role.counterpart(),
        known
    );

    let mut puncher = Puncher::from_config(&config).context("Failed to prepare rendezvous dial")?;
    let mut channel = puncher
        .connect()
        .await
        .with_context(|| format!("Failed to reach rendezvous {}", puncher.addr()))?;

    let mut negotiator = Negotiator::new(Arc::new(config.compatibility.clone()));
    if let Some(limit) = config.handshake_timeout() {
        negotiator = negotiator.with_timeout(limit);
    }

    let negotiation = negotiator
        .negotiate(&mut channel)
        .await
        .context("Version handshake failed")?;

    println!(
        "Connected to {} as {}: local {} / remote {}",
        puncher.addr(),
        puncher.role(),
        negotiator.local_version(),
        negotiation.remote_version
    );
    Ok(())
}
