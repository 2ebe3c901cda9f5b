//! config-client
//!
//! Keeps a process's configuration in sync with a remote configuration
//! service and live-refreshes bound properties.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        CONFIG CLIENT                         │
//!   │                                                              │
//!   │  ┌───────────┐   fetch    ┌──────────┐   GET    ┌─────────┐  │
//!   │  │ refresh   │──────────▶│  fetch   │────────▶│ config  │  │
//!   │  │ scheduler │◀──────────│  (http)  │◀────────│ service │  │
//!   │  └─────┬─────┘  snapshot  └──────────┘  JSON    └─────────┘  │
//!   │        │ swap                                                │
//!   │        ▼                                                     │
//!   │  ┌───────────┐  notify   ┌──────────────────┐                │
//!   │  │  store    │─────────▶│ property bindings │──▶ host code   │
//!   │  │(arc-swap) │           └──────────────────┘                │
//!   │  └───────────┘                                               │
//!   │                                                              │
//!   │  config · observability · lifecycle · admin API              │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use config_client::config::resolve_config;
use config_client::lifecycle::{self, signals::spawn_signal_handler, ConfigClient, Shutdown};
use config_client::observability::{logging::init_logging, metrics::init_metrics};
use config_client::PropertyBinding;

#[derive(Parser)]
#[command(name = "config-client", version)]
#[command(about = "Dynamic configuration client", long_about = None)]
struct Cli {
    /// Path to the client's TOML configuration file.
    #[arg(short, long, env = "CONFIG_CLIENT_CONFIG")]
    config: Option<PathBuf>,

    /// Prefix of the example properties to bind.
    #[arg(long, default_value = "example")]
    prefix: String,
}

/// Refresh-scoped properties under `<prefix>.*`.
struct ExampleProperties {
    message: PropertyBinding<String>,
}

impl ExampleProperties {
    fn bind(client: &ConfigClient, prefix: &str) -> Self {
        Self {
            message: client.bind(format!("{}.message", prefix), String::new()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref())?;

    init_logging(&config.observability);

    tracing::info!("config-client v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        base_url = %config.service.base_url,
        interval_secs = config.refresh.interval_secs,
        request_timeout_ms = config.refresh.request_timeout_ms,
        max_backoff_ms = config.refresh.max_backoff_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let client = lifecycle::start(&config, &shutdown).await?;
    let signals = spawn_signal_handler(shutdown.clone(), client.refresh_handle());

    let properties = ExampleProperties::bind(&client, &cli.prefix);
    tracing::info!(
        key = %properties.message.key(),
        message = %properties.message.get(),
        "Bound example properties"
    );
    properties.message.on_change(|message| {
        tracing::info!(message = %message, "Message changed");
    });

    client.join().await;
    let _ = signals.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
