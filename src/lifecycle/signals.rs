//! OS signal handling.
//!
//! - SIGTERM / SIGINT (Ctrl+C) → graceful shutdown
//! - SIGHUP → immediate configuration refresh

use std::io;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;
use crate::refresh::RefreshHandle;

/// What an incoming OS signal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Shutdown,
    Refresh,
}

#[cfg(unix)]
async fn next_signal() -> io::Result<SignalAction> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    let mut hup = signal(SignalKind::hangup())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| SignalAction::Shutdown),
        _ = term.recv() => Ok(SignalAction::Shutdown),
        _ = hup.recv() => Ok(SignalAction::Refresh),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> io::Result<SignalAction> {
    tokio::signal::ctrl_c().await.map(|_| SignalAction::Shutdown)
}

/// Translate OS signals into shutdown and refresh requests until shutdown.
pub fn spawn_signal_handler(shutdown: Arc<Shutdown>, refresh: RefreshHandle) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match next_signal().await {
                Ok(SignalAction::Refresh) => {
                    tracing::info!("SIGHUP received, refreshing configuration");
                    refresh.trigger();
                }
                Ok(SignalAction::Shutdown) => {
                    tracing::info!("Shutdown signal received");
                    shutdown.trigger();
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install signal handlers; shutting down");
                    shutdown.trigger();
                    break;
                }
            }
        }
    })
}
