//! Outbound connectivity subsystem.
//!
//! # Data Flow
//! ```text
//! proxies.txt
//!     → proxy_list.rs (one exit per line, short lines dropped)
//!     → pool.rs (one reqwest client per exit, or one direct client)
//!
//! Per upstream attempt:
//!     pool.next() → round_robin.rs (atomic counter mod pool size)
//! ```

pub mod pool;
pub mod proxy_list;
pub mod round_robin;

pub use pool::{EgressClient, EgressError, EgressPool};
pub use proxy_list::load_proxy_list;
