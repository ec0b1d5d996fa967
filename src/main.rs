//! photomigrate: one-way migration of Trovebox photo albums to a gallery
//! service.
//!
//! Each source album is mirrored into a destination album of the same name,
//! photos without an album land in "Loose Photos". Photos already present
//! (matched by `<id>-<filename>` title) are skipped, so interrupted runs can
//! simply be restarted. Downloads and uploads retry transient failures with
//! exponential backoff.

#![warn(clippy::all)]

mod cli;
mod config;
mod retry;
mod shutdown;
mod store;
mod sync;
mod types;

use std::io::IsTerminal;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use store::gallery::GalleryStore;
use store::trovebox::TroveboxStore;
use sync::{SyncEngine, SyncOutcome};

/// Token for the destination, prompting for it on a terminal when missing.
fn destination_token(configured: Option<String>) -> Option<String> {
    if configured.is_some() || !std::io::stdin().is_terminal() {
        return configured;
    }
    tokio::task::block_in_place(|| rpassword::prompt_password("Gallery access token: ").ok())
        .filter(|t| !t.is_empty())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let config = config::Config::from_cli(cli)?;
    tracing::debug!(?config, "configuration");
    tracing::info!(
        source = %config.source.host,
        destination = %config.dest_url,
        visibility = %config.visibility,
        dry_run = config.dry_run,
        "Starting photomigrate"
    );

    if config.source.oauth.is_none() {
        tracing::warn!("No Trovebox OAuth credentials configured, only public photos are visible");
    }
    let source = TroveboxStore::new(
        &config.source.host,
        config.source.oauth.clone(),
        config.timeout(),
    )?;
    let destination = GalleryStore::new(
        &config.dest_url,
        destination_token(config.dest_token.clone()),
        config.timeout(),
    )?;
    let sync_config = config.sync_config();

    let shutdown_token = shutdown::install_signal_handler()?;

    match SyncEngine::new(&source, &destination, &sync_config)
        .run(shutdown_token)
        .await?
    {
        SyncOutcome::Done(summary) => {
            if summary.failed > 0 {
                tracing::warn!("{} photos could not be transferred", summary.failed);
            }
            Ok(())
        }
        SyncOutcome::Interrupted(_) => anyhow::bail!("Sync interrupted before completion"),
    }
}
