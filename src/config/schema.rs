//! Configuration schema definitions.
//!
//! This module defines the process-level configuration of the proxy. Site
//! bundles (domains, replacements) live in their own directory tree and are
//! described in [`crate::sites`].
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Site tree location and serving defaults.
    pub sites: SitesConfig,

    /// Outbound client pool.
    pub egress: EgressConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Administrative reload endpoints.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:6688").
    pub bind_address: String,

    /// Largest inbound request body buffered for forwarding.
    pub max_body_bytes: usize,

    /// Overall deadline for handling one inbound request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:6688".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
            request_timeout_secs: 120,
        }
    }
}

/// Site tree configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SitesConfig {
    /// Directory holding one subdirectory per bundle.
    pub root_dir: String,

    /// Redirect target for unknown or deactivated hosts.
    pub fallback_url: String,

    /// Lifetime of cached responses in seconds.
    pub cache_ttl_secs: u64,

    /// Reload bundles when files under `root_dir` change.
    pub watch: bool,

    /// Quiet period before a burst of file events triggers a reload.
    pub watch_debounce_ms: u64,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            root_dir: "configs_v2".to_string(),
            fallback_url: "https://www.godaddy.com/websites/website-builder".to_string(),
            cache_ttl_secs: 120 * 60,
            watch: false,
            watch_debounce_ms: 500,
        }
    }
}

/// Outbound HTTP client pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EgressConfig {
    /// Newline-delimited proxy list; a missing file means direct connections.
    pub proxy_list_path: String,

    /// Idle connections kept per upstream host, per client.
    pub max_idle_per_host: usize,

    /// Idle connection timeout in seconds.
    pub idle_timeout_secs: u64,

    /// Connection establishment (TCP + TLS) timeout in seconds.
    pub handshake_timeout_secs: u64,

    /// Total time for one upstream request/response in seconds.
    pub request_timeout_secs: u64,

    /// Upstream attempts per request when the origin answers 503.
    pub max_attempts: u32,
}

impl Default for EgressConfig {
    fn default() -> Self {
        Self {
            proxy_list_path: "proxies.txt".to_string(),
            max_idle_per_host: 20,
            idle_timeout_secs: 30,
            handshake_timeout_secs: 5,
            request_timeout_secs: 40,
            max_attempts: 4,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Administrative endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Serve `/reload_all_configs`, `/reload_specific_config` and the
    /// per-site `/reload_config` path.
    pub enabled: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
