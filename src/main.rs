//! Transforming reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌───────────────────────────────────────────────────────┐
//!                              │                  REWRITE PROXY                         │
//!     Client Request           │  ┌─────────┐    ┌──────────┐    ┌──────────────┐      │
//!     ─────────────────────────┼─▶│  http   │───▶│ pipeline │───▶│    sites     │      │
//!                              │  │ server  │    │          │    │ registry +   │      │
//!                              │  └─────────┘    └────┬─────┘    │ route cache  │      │
//!                              │                      │          └──────────────┘      │
//!                              │                      ▼                                │
//!     Client Response          │  ┌─────────┐    ┌──────────┐    ┌──────────────┐      │
//!     ◀────────────────────────┼──│encoding │◀───│ rewrite  │◀───│   egress     │◀─────┼──── Upstream
//!                              │  │negotiate│    │          │    │ pool (503 ↻) │      │     Origin
//!                              │  └─────────┘    └──────────┘    └──────────────┘      │
//!                              │                                                       │
//!                              │  ┌─────────────────────────────────────────────────┐  │
//!                              │  │ config + watcher │ observability │ lifecycle   │  │
//!                              │  └─────────────────────────────────────────────────┘  │
//!                              └───────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use rewrite_proxy::config::watcher::{apply_changes, SiteWatcher};
use rewrite_proxy::config::{load_config, ProxyConfig};
use rewrite_proxy::lifecycle::{bootstrap, signals, Shutdown};
use rewrite_proxy::observability::{logging, metrics};
use rewrite_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "rewrite-proxy")]
#[command(about = "Transforming reverse proxy with per-site rewriting and caching", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("rewrite-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        site_root = %config.sites.root_dir,
        max_attempts = config.egress.max_attempts,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let ready = bootstrap(&config)?;
    let shutdown = Arc::new(Shutdown::new());

    // The watcher stops when dropped.
    let _watcher = if config.sites.watch {
        let (watcher, updates) = SiteWatcher::new(ready.registry.root());
        let handle = watcher.run()?;
        tokio::spawn(apply_changes(
            ready.registry.clone(),
            updates,
            Duration::from_millis(config.sites.watch_debounce_ms),
            shutdown.subscribe(),
        ));
        Some(handle)
    } else {
        None
    };

    tokio::spawn(signals::wait_for_shutdown(shutdown.clone()));
    tokio::spawn(signals::reload_on_hangup(ready.registry.clone(), shutdown.clone()));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config, ready.registry, ready.egress);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
