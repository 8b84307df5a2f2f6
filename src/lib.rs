//! Transforming reverse proxy library.
//!
//! Serves configured front domains by fetching the mapped upstream origin,
//! rewriting response bodies per site, and caching successful responses.

pub mod admin;
pub mod config;
pub mod egress;
pub mod encoding;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod sites;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use sites::SiteRegistry;
