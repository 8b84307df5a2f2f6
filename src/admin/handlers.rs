use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::sites::{LoadAllError, SiteRegistry};

#[derive(Debug, Serialize)]
pub struct ReloadSummary {
    pub status: &'static str,
    pub bundles: Vec<String>,
    pub routes: usize,
}

#[derive(Debug, Deserialize)]
pub struct ReloadParams {
    pub config_name: Option<String>,
}

fn error_body(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn summary(registry: &SiteRegistry, bundles: Vec<String>) -> Response {
    Json(ReloadSummary {
        status: "ok",
        bundles,
        routes: registry.route_count(),
    })
    .into_response()
}

/// Drop and reload every bundle under the site root.
pub async fn reload_all(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let result = tokio::task::spawn_blocking(move || registry.load_all()).await;

    match result {
        Ok(Ok(())) => {
            tracing::info!("All configs reloaded");
            summary(&state.registry, state.registry.bundle_names())
        }
        Ok(Err(e @ LoadAllError::Bundles(_))) => {
            tracing::error!(error = %e, "Some configs failed to reload");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Config reload failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!(error = %e, "Config reload task failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "reload task failed".to_string())
        }
    }
}

/// Reload one bundle named by `?config_name=`.
pub async fn reload_specific(State(state): State<AppState>, Query(params): Query<ReloadParams>) -> Response {
    let Some(name) = params.config_name.filter(|n| !n.is_empty()) else {
        tracing::warn!("Config name is empty");
        return error_body(StatusCode::BAD_REQUEST, "config_name is required".to_string());
    };
    if state.registry.lookup_bundle(&name).is_none() {
        tracing::warn!(config_name = %name, "Config not found");
        return error_body(StatusCode::NOT_FOUND, format!("config '{name}' not found"));
    }
    reload_bundle(state.registry.clone(), name).await
}

/// Reload bundle `name` and report the outcome.
pub async fn reload_bundle(registry: Arc<SiteRegistry>, name: String) -> Response {
    let task_registry = registry.clone();
    let task_name = name.clone();
    let result = tokio::task::spawn_blocking(move || task_registry.load_bundle(&task_name)).await;

    match result {
        Ok(Ok(bundle)) => {
            tracing::info!(config_name = %name, routes = bundle.routes.len(), "Config reloaded");
            summary(&registry, vec![name])
        }
        Ok(Err(e)) => {
            tracing::error!(config_name = %name, error = %e, "Error reloading config");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            tracing::error!(config_name = %name, error = %e, "Config reload task failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, "reload task failed".to_string())
        }
    }
}
