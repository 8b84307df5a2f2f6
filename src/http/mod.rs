//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, admin routes)
//!     → pipeline.rs (route lookup, cache, upstream fetch, rewrite)
//!         → request.rs (request ID, client address, outbound headers)
//!         → response.rs (no-cache marking, error mapping)
//!     → Send to client
//! ```

pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ProxyError;
pub use server::{AppState, HttpServer};
