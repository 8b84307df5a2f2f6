//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (bundle, front_host, path, status) on every event
//! - Request ID flows from the inbound request into logs
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
