//! Signal handling for a clean stop between photos.
//!
//! The first SIGINT / SIGTERM / SIGHUP cancels the returned token; the sync
//! engine checks it before each photo, so the transfer in flight finishes
//! (and its staging file is removed) before the run stops. A second signal
//! exits immediately with status 130.

use anyhow::Context;
use tokio_util::sync::CancellationToken;

#[cfg(unix)]
struct Signals {
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn register() -> anyhow::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?,
            hangup: signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?,
        })
    }

    async fn recv(&mut self) {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = self.terminate.recv() => {}
            _ = self.hangup.recv() => {}
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn register() -> anyhow::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl+C listener failed: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// Install signal handlers and return the token they cancel.
///
/// Must be called from within a tokio runtime.
pub(crate) fn install_signal_handler() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut signals = Signals::register()?;

    let handler_token = token.clone();
    tokio::spawn(async move {
        signals.recv().await;
        tracing::info!("Received shutdown signal, finishing the current transfer...");
        tracing::info!("Press Ctrl+C again to force exit");
        handler_token.cancel();

        signals.recv().await;
        tracing::warn!("Force exit requested");
        std::process::exit(130);
    });

    Ok(token)
}
