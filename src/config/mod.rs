//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! proxy.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → handed to startup, server and egress pool
//!
//! Site tree (sites.root_dir):
//!     watcher.rs detects change under <root>/<bundle>/
//!     → debounce
//!     → SiteRegistry reloads that bundle
//!     → new routes swapped in, warm caches carried over
//! ```
//!
//! # Design Decisions
//! - Process config is immutable once loaded; only site bundles hot-reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{AdminConfig, EgressConfig, ListenerConfig, LogFormat, ObservabilityConfig, ProxyConfig, SitesConfig};
