//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream attempt:
//!     → egress client timeouts (handshake / total) bound every call
//!     → 503: retries.rs allows another attempt on the next egress client
//!     → cap reached or transport error: request fails with 500
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - The 503 failover loop is the only retry logic in the system

pub mod retries;

pub use retries::RetryPolicy;
