//! Site configuration subsystem.
//!
//! # Data Flow
//! ```text
//! <root>/<bundle>/config.json          vars + upstream -> front template map
//!     → format.rs (resolve ${var:formatter} tokens)
//! <root>/<bundle>/<upstream>.json      route settings + replacements
//!     → replacement.rs (format + compile patterns)
//!     → site.rs (Bundle owning Routes, each with its own cache.rs)
//!     → registry.rs (carry warm caches, swap into the host table)
//!
//! Per request:
//!     registry.lookup(host) → Route
//!     → Route::probe_cache / Route::rewrite / Route::maybe_store
//! ```

pub mod cache;
pub mod error;
pub mod format;
pub mod registry;
pub mod replacement;
pub mod site;

pub use cache::{CacheEntry, PageCache};
pub use error::{FormatError, LoadAllError, SiteConfigError};
pub use registry::SiteRegistry;
pub use replacement::{ReplaceKind, Replacement};
pub use site::{Bundle, Route};
