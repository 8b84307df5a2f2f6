//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP reloads every site bundle, not shutdown

use std::sync::Arc;

use crate::lifecycle::shutdown::Shutdown;
use crate::sites::SiteRegistry;

/// Wait for Ctrl+C or SIGTERM, then trigger shutdown.
pub async fn wait_for_shutdown(shutdown: Arc<Shutdown>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
    shutdown.trigger();
}

/// Reload all bundles on every SIGHUP until shutdown.
#[cfg(unix)]
pub async fn reload_on_hangup(registry: Arc<SiteRegistry>, shutdown: Arc<Shutdown>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install SIGHUP handler");
            return;
        }
    };
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                tracing::info!("Received SIGHUP, reloading all sites");
                let registry = registry.clone();
                match tokio::task::spawn_blocking(move || registry.load_all()).await {
                    Ok(Ok(())) => tracing::info!("All configs reloaded"),
                    Ok(Err(e)) => tracing::error!(error = %e, "Config reload failed"),
                    Err(e) => tracing::error!(error = %e, "Config reload task failed"),
                }
            }
            _ = stop.recv() => break,
        }
    }
}

#[cfg(not(unix))]
pub async fn reload_on_hangup(_registry: Arc<SiteRegistry>, _shutdown: Arc<Shutdown>) {}
