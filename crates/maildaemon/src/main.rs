//! `maildaemon` - polls mail accounts and applies filter rules.
//!
//! Reads connections and filters from a JSON configuration, then runs the
//! daemon group for the requested number of iterations.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod credentials;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use maildaemon_core::{Config, DaemonGroup};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use credentials::{OAuthDataTokens, PromptCredentials};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `maildaemon` prefixes every workspace crate's target
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("maildaemon={}", cli.log_level()).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    let connections = config
        .connection_group(Arc::new(PromptCredentials), Some(Arc::new(OAuthDataTokens)))
        .context("Invalid connection configuration")?;
    let filters = config
        .message_filters(&connections)
        .context("Invalid filter configuration")?;

    info!(
        config = %cli.config.display(),
        connections = connections.len(),
        filters = filters.len(),
        "Starting maildaemon"
    );

    let iterations = DaemonGroup::new(connections, filters)
        .run(cli.max_iterations(), cli.interval())
        .await
        .context("Daemon group stopped on a failed action")?;

    info!(iterations, "maildaemon finished");
    Ok(())
}
