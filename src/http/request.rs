//! Inbound request inspection and outbound request building.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for every inbound request
//! - Resolve the inbound host and client address
//! - Build the header set forwarded to the upstream origin
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - CDN and forwarding headers are stripped so the origin sees a plain client,
//!   except for static assets which pass through untouched
//! - Route request overrides are applied last and win over everything

use std::net::SocketAddr;

use axum::http::{
    header::{self, HeaderName},
    HeaderMap, HeaderValue, Request,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::sites::Route;

pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// CDN and forwarding headers removed between legs.
pub const STRIP_HEADERS: [&str; 8] = [
    "cdn-loop",
    "cf-connecting-ip",
    "cf-ipcountry",
    "cf-ray",
    "cf-visitor",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-real-ip",
];

/// Paths with these suffixes keep their headers in both directions.
const STATIC_ASSET_SUFFIXES: [&str; 5] = [".png", ".jpg", ".svg", ".css", ".ico"];

/// Connection-scoped and framing headers, never copied between legs.
pub const HOP_BY_HOP_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Request ID set by the request-id layer, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Inbound host as sent by the client (may carry a port).
pub fn inbound_host<B>(request: &Request<B>) -> Option<String> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .filter(|host| !host.is_empty())
}

/// Host with any `:port` suffix removed.
pub fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.ends_with(']') && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn is_local_peer(addr: &str) -> bool {
    ["127.", "192.168.", "10.", "localhost"]
        .iter()
        .any(|prefix| addr.starts_with(prefix))
}

/// Address to log for the client: the peer, or `X-Real-IP` when the peer is
/// a local forwarder.
pub fn client_address(peer: SocketAddr, headers: &HeaderMap) -> String {
    let peer = peer.to_string();
    match headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        Some(real_ip) if !real_ip.is_empty() && is_local_peer(&peer) => real_ip.to_string(),
        _ => peer,
    }
}

pub fn is_static_asset(path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path);
    STATIC_ASSET_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

fn is_stripped(name: &HeaderName, strip_cdn: bool) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
        || *name == header::CONTENT_LENGTH
        || (strip_cdn && STRIP_HEADERS.contains(&name.as_str()))
}

/// Copy `headers` without hop-by-hop headers and, unless `path` is a static
/// asset, without the CDN strip list.
pub fn filter_headers(headers: &HeaderMap, path: &str) -> HeaderMap {
    let strip_cdn = !is_static_asset(path);
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_stripped(name, strip_cdn) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Replace the first occurrence of the inbound host in an Origin/Referer
/// value with the upstream host.
fn retarget(value: &HeaderValue, inbound_host: &str, target_host: &str) -> Option<HeaderValue> {
    let value = value.to_str().ok()?;
    HeaderValue::from_str(&value.replacen(inbound_host, target_host, 1)).ok()
}

/// Header set for the upstream request.
pub fn upstream_headers(inbound: &HeaderMap, inbound_host: &str, path: &str, route: &Route) -> HeaderMap {
    let mut headers = filter_headers(inbound, path);
    headers.remove(header::HOST);
    headers.remove(header::ORIGIN);
    headers.remove(header::REFERER);

    for name in [header::ORIGIN, header::REFERER] {
        if let Some(value) = inbound
            .get(&name)
            .and_then(|v| retarget(v, inbound_host, &route.target_host))
        {
            headers.insert(name, value);
        }
    }

    if let Ok(host) = HeaderValue::from_str(&route.target_host) {
        headers.insert(header::HOST, host);
    }
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));

    for (name, value) in &route.request_overrides {
        headers.insert(name.clone(), value.clone());
    }
    headers
}
