//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the admin routes and the proxy pipeline
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and stop on the shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::ProxyConfig;
use crate::egress::EgressPool;
use crate::http::pipeline::proxy_handler;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID};
use crate::resilience::RetryPolicy;
use crate::sites::SiteRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SiteRegistry>,
    pub egress: Arc<EgressPool>,
    pub config: Arc<ProxyConfig>,
    pub retry: RetryPolicy,
}

/// HTTP server for the rewriting proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over an already loaded registry and egress pool.
    pub fn new(config: ProxyConfig, registry: Arc<SiteRegistry>, egress: Arc<EgressPool>) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            registry,
            egress,
            retry: RetryPolicy::new(config.egress.max_attempts),
            config: config.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        let mut router = Router::new();
        if config.admin.enabled {
            router = router.merge(setup_admin_router());
        }

        router
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
                    .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs))),
            )
    }

    /// Run the server until `shutdown` fires, accepting connections on the
    /// given listener.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
