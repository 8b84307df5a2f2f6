//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the egress client pool from the proxy list
//! - Load every site bundle into the registry
//!
//! # Design Decisions
//! - Fail fast: an unreadable site root or an unbuildable client is fatal
//! - A broken bundle is logged and skipped; the others still serve traffic
//! - Listeners start last (traffic only when ready)

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::egress::{load_proxy_list, EgressError, EgressPool};
use crate::sites::{LoadAllError, SiteConfigError, SiteRegistry};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot read proxy list {path}: {source}")]
    ProxyList {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Egress(#[from] EgressError),

    #[error(transparent)]
    Sites(#[from] SiteConfigError),
}

/// Subsystems the server needs before it can accept traffic.
pub struct Bootstrapped {
    pub registry: Arc<SiteRegistry>,
    pub egress: Arc<EgressPool>,
}

pub fn build_egress(config: &ProxyConfig) -> Result<EgressPool, StartupError> {
    let path = &config.egress.proxy_list_path;
    let proxies = load_proxy_list(Path::new(path)).map_err(|source| StartupError::ProxyList {
        path: path.clone(),
        source,
    })?;

    let pool = EgressPool::from_config(&config.egress, &proxies)?;
    tracing::info!(
        proxies = proxies.len(),
        clients = pool.len(),
        "Egress pool ready"
    );
    Ok(pool)
}

pub fn load_sites(config: &ProxyConfig) -> Result<SiteRegistry, StartupError> {
    let registry = SiteRegistry::with_cache_ttl(
        &config.sites.root_dir,
        Duration::from_secs(config.sites.cache_ttl_secs),
    );

    match registry.load_all() {
        Ok(()) => {}
        Err(LoadAllError::Fatal(e)) => return Err(e.into()),
        Err(e @ LoadAllError::Bundles(_)) => {
            tracing::error!(error = %e, "Some sites failed to load, continuing without them");
        }
    }

    tracing::info!(
        bundles = registry.bundle_names().len(),
        routes = registry.route_count(),
        "Sites loaded"
    );
    Ok(registry)
}

/// Initialize subsystems in dependency order.
pub fn bootstrap(config: &ProxyConfig) -> Result<Bootstrapped, StartupError> {
    let egress = build_egress(config)?;
    let registry = load_sites(config)?;
    Ok(Bootstrapped {
        registry: Arc::new(registry),
        egress: Arc::new(egress),
    })
}
