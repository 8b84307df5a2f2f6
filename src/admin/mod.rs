//! Administrative reload endpoints.
//!
//! All reloads run on the blocking pool and the calling request waits for
//! them to finish.

pub mod handlers;

use axum::{routing::any, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router() -> Router<AppState> {
    Router::new()
        .route("/reload_all_configs", any(reload_all))
        .route("/reload_specific_config", any(reload_specific))
}
