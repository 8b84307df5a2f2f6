//! Request-serving pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → resolve route by Host (unknown / deactivated → 302 fallback)
//!     → block list (→ 403), per-route /reload_config
//!     → cache probe (hit → rewrite, negotiate encoding, respond)
//!     → buffer body, fetch upstream with 503 failover across egress clients
//!     → decode, rewrite, re-encode with the upstream's coding
//!     → filter headers, apply overrides, populate cache
//!     → respond
//! ```

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Method, Request, StatusCode},
    response::{IntoResponse, Response},
};

use crate::encoding;
use crate::http::request::{client_address, filter_headers, inbound_host, request_id, strip_port, upstream_headers};
use crate::http::response::{
    build_response, mark_no_cache, redirect, set_content_encoding, strip_cache_headers, ProxyError,
};
use crate::http::server::AppState;
use crate::observability::metrics::{self, ResponseSource};
use crate::sites::{CacheEntry, Route};

/// Per-route reload path, evaluated after route resolution.
const RELOAD_ROUTE_PATH: &str = "/reload_config";

/// Entry point for every request not claimed by an admin route.
pub async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();

    match serve(&state, peer, request).await {
        Ok((source, response)) => {
            metrics::record_request(source, response.status().as_u16(), start);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Request failed");
            metrics::record_request(ResponseSource::Error, e.status().as_u16(), start);
            e.into_response()
        }
    }
}

async fn serve(
    state: &AppState,
    peer: SocketAddr,
    mut request: Request<Body>,
) -> Result<(ResponseSource, Response), ProxyError> {
    let host = inbound_host(&request).ok_or_else(|| {
        tracing::warn!("Host is empty");
        ProxyError::InvalidRequest("Host is empty")
    })?;
    let path = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    tracing::info!(method = %request.method(), host = %host, path = %path, "Received request");

    let route = state
        .registry
        .lookup(&host)
        .or_else(|| state.registry.lookup(strip_port(&host)))
        .filter(|route| route.is_active());
    let Some(route) = route else {
        tracing::warn!(host = %host, "Website not found");
        return Ok((ResponseSource::Fallback, redirect(&state.config.sites.fallback_url)));
    };

    let remote_addr = client_address(peer, request.headers());

    if route.should_block(&path) {
        tracing::warn!(
            bundle = %route.bundle_name,
            front_host = %route.front_host,
            path = %path,
            remote_addr = %remote_addr,
            "Blocked"
        );
        return Ok((ResponseSource::Blocked, StatusCode::FORBIDDEN.into_response()));
    }

    if path == RELOAD_ROUTE_PATH {
        let response = crate::admin::handlers::reload_bundle(state.registry.clone(), route.bundle_name.clone()).await;
        return Ok((ResponseSource::Admin, response));
    }

    let started_at = Instant::now();
    if request
        .headers()
        .get(header::CONTENT_ENCODING)
        .is_some_and(|v| v == "identity")
    {
        request.headers_mut().remove(header::CONTENT_ENCODING);
    }

    // Only GET responses are cached; HEAD and POST answers must not stand in for the page.
    let cached = if *request.method() == Method::GET {
        route.probe_cache(&path)
    } else {
        None
    };
    let result = match cached {
        Some(entry) => {
            metrics::record_cache_lookup(true);
            serve_cached(&route, &entry, request.headers()).map(|r| (ResponseSource::Cache, r))
        }
        None => {
            metrics::record_cache_lookup(false);
            fetch_upstream(state, &route, &host, &path, request)
                .await
                .map(|r| (ResponseSource::Upstream, r))
        }
    };

    tracing::info!(
        bundle = %route.bundle_name,
        front_host = %route.front_host,
        path = %path,
        remote_addr = %remote_addr,
        duration = ?started_at.elapsed(),
        "Request finished"
    );
    result
}

fn accept_encoding(headers: &HeaderMap) -> &str {
    headers
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Answer from a cached entry: rewrite with the current rules, then encode
/// for the client.
fn serve_cached(route: &Route, entry: &CacheEntry, inbound: &HeaderMap) -> Result<Response, ProxyError> {
    let mut headers = entry.headers.clone();
    for (name, value) in &route.response_overrides {
        headers.insert(name.clone(), value.clone());
    }
    headers.remove(header::CONTENT_LENGTH);

    let rewritten = route.rewrite(&entry.body);
    let was_replaced = rewritten.as_slice() != &*entry.body;

    let (body, coding) = encoding::negotiate(rewritten, accept_encoding(inbound))?;
    set_content_encoding(&mut headers, &coding);

    if was_replaced {
        strip_cache_headers(&mut headers);
        mark_no_cache(&mut headers);
    }
    Ok(build_response(entry.status, headers, body))
}

/// Responses whose body is empty by definition are passed through without
/// decoding: a declared Content-Encoding still applies to the headers only.
fn carries_no_body(method: &Method, status: StatusCode, raw: &[u8]) -> bool {
    raw.is_empty()
        || *method == Method::HEAD
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

async fn fetch_upstream(
    state: &AppState,
    route: &Route,
    inbound_host: &str,
    path: &str,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, state.config.listener.max_body_bytes)
        .await
        .map_err(ProxyError::RequestBody)?;

    let url = route.upstream_url(path);
    let headers = upstream_headers(&parts.headers, inbound_host, path, route);
    tracing::debug!(
        method = %parts.method,
        url = %url,
        headers = ?headers,
        "Outgoing request"
    );

    let mut attempt = 0;
    let upstream = loop {
        attempt += 1;
        let client = state.egress.next().ok_or(ProxyError::NoEgressClient)?;

        let response = client
            .client
            .request(parts.method.clone(), &url)
            .headers(headers.clone())
            .body(body.clone())
            .send()
            .await
            .inspect_err(|e| {
                tracing::error!(
                    bundle = %route.bundle_name,
                    path = %path,
                    attempt,
                    egress = %client.label(),
                    error = %e,
                    "Error getting page"
                )
            })?;

        if !state.retry.is_retryable(response.status()) {
            break response;
        }
        tracing::warn!(
            bundle = %route.bundle_name,
            path = %path,
            attempt,
            egress = %client.label(),
            "503, retrying"
        );
        if !state.retry.allows(attempt + 1) {
            tracing::error!(bundle = %route.bundle_name, path = %path, attempts = attempt, "Too many retries");
            return Err(ProxyError::Overloaded { attempts: attempt });
        }
        metrics::record_upstream_retry();
    };

    let status = upstream.status();
    let upstream_headers = upstream.headers().clone();
    let raw = upstream.bytes().await?;

    let coding = upstream_headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let (decoded, body, was_replaced) = if carries_no_body(&parts.method, status, &raw) {
        (raw.to_vec(), raw.to_vec(), false)
    } else {
        let decoded = encoding::decode(&raw, &coding)?;
        let rewritten = route.rewrite(&decoded);
        let was_replaced = rewritten != decoded;
        let body = encoding::encode(&rewritten, &coding)?;
        (decoded, body, was_replaced)
    };

    let filtered = filter_headers(&upstream_headers, path);
    let mut headers = filtered.clone();
    for (name, value) in &route.response_overrides {
        headers.insert(name.clone(), value.clone());
    }

    if status.is_client_error() || status.is_server_error() {
        tracing::warn!(
            bundle = %route.bundle_name,
            path = %path,
            status = status.as_u16(),
            headers = ?headers,
            "Upstream error response"
        );
    }

    if parts.method == Method::GET && status.as_u16() < 300 {
        route.maybe_store(path, &decoded, &filtered, status);
    }

    if was_replaced {
        strip_cache_headers(&mut headers);
    }
    if was_replaced || status.is_server_error() {
        mark_no_cache(&mut headers);
    }
    Ok(build_response(status, headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carries_no_body() {
        assert!(carries_no_body(&Method::HEAD, StatusCode::OK, b"x"));
        assert!(carries_no_body(&Method::GET, StatusCode::NOT_MODIFIED, b"x"));
        assert!(carries_no_body(&Method::GET, StatusCode::NO_CONTENT, b""));
        assert!(carries_no_body(&Method::GET, StatusCode::OK, b""));
        assert!(!carries_no_body(&Method::GET, StatusCode::OK, b"page"));
        assert!(!carries_no_body(&Method::POST, StatusCode::OK, b"page"));
    }
}
