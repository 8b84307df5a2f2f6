//! Egress client pool.
//!
//! # Responsibilities
//! - Build one HTTP client per outbound proxy exit, or one direct client
//! - Hand out clients round-robin
//!
//! # Design Decisions
//! - Every client carries idle, handshake and total timeouts so one wedged
//!   upstream cannot pin the pool
//! - Clients never decompress; bodies arrive exactly as the origin sent them
//! - The direct client ignores proxy environment variables

use std::time::Duration;

use reqwest::{Client, Proxy};
use thiserror::Error;

use crate::config::EgressConfig;
use crate::egress::round_robin::RoundRobin;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("invalid proxy '{proxy}': {source}")]
    InvalidProxy {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

/// One outbound client and the exit it is bound to.
#[derive(Debug, Clone)]
pub struct EgressClient {
    pub client: Client,
    /// Proxy URL, `None` for a direct client.
    pub proxy: Option<String>,
}

impl EgressClient {
    pub fn label(&self) -> &str {
        self.proxy.as_deref().unwrap_or("direct")
    }
}

/// Fixed set of egress clients selected round-robin.
#[derive(Debug)]
pub struct EgressPool {
    clients: Vec<EgressClient>,
    selector: RoundRobin,
}

fn builder(config: &EgressConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .pool_max_idle_per_host(config.max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_timeout(Duration::from_secs(config.handshake_timeout_secs))
        .timeout(Duration::from_secs(config.request_timeout_secs))
}

impl EgressPool {
    /// Wrap prebuilt clients. An empty list gets no clients at all; use
    /// [`EgressPool::from_config`] for the direct fallback.
    pub fn new(clients: Vec<EgressClient>) -> Self {
        Self {
            clients,
            selector: RoundRobin::new(),
        }
    }

    /// One client per proxy, or a single direct client when `proxies` is empty.
    pub fn from_config(config: &EgressConfig, proxies: &[String]) -> Result<Self, EgressError> {
        if proxies.is_empty() {
            return Ok(Self::new(vec![Self::direct_client(config)?]));
        }

        let clients = proxies
            .iter()
            .map(|proxy| {
                let exit = Proxy::all(proxy.as_str()).map_err(|source| EgressError::InvalidProxy {
                    proxy: proxy.clone(),
                    source,
                })?;
                let client = builder(config).proxy(exit).build().map_err(EgressError::Build)?;
                Ok(EgressClient {
                    client,
                    proxy: Some(proxy.clone()),
                })
            })
            .collect::<Result<Vec<_>, EgressError>>()?;

        Ok(Self::new(clients))
    }

    pub fn direct(config: &EgressConfig) -> Result<Self, EgressError> {
        Self::from_config(config, &[])
    }

    fn direct_client(config: &EgressConfig) -> Result<EgressClient, EgressError> {
        let client = builder(config).no_proxy().build().map_err(EgressError::Build)?;
        Ok(EgressClient { client, proxy: None })
    }

    /// Next client in rotation.
    pub fn next(&self) -> Option<&EgressClient> {
        self.selector
            .next_index(self.clients.len())
            .and_then(|i| self.clients.get(i))
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
