//! Response assembly and error mapping.
//!
//! # Responsibilities
//! - Map pipeline failures to client-facing status codes
//! - Mark rewritten responses as uncacheable downstream
//! - Assemble the final response from status, headers and body
//!
//! # Design Decisions
//! - Internal failures return a generic 500 body; the detail is only logged
//! - Content-Length is never copied, the body length is set on write

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use thiserror::Error;

use crate::encoding::EncodingError;

/// Freshness headers dropped when the body was rewritten.
pub const CACHE_RELATED_HEADERS: [HeaderName; 8] = [
    header::AGE,
    header::DATE,
    header::CACHE_CONTROL,
    header::ETAG,
    header::EXPIRES,
    header::LAST_MODIFIED,
    header::PRAGMA,
    header::STRICT_TRANSPORT_SECURITY,
];

pub static X_REPLACED: HeaderName = HeaderName::from_static("x-replaced");

/// Errors raised while serving a proxied request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream still unavailable after {attempts} attempts")]
    Overloaded { attempts: u32 },

    #[error("no egress client available")]
    NoEgressClient,

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("{0}")]
    InvalidRequest(&'static str),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match self {
            ProxyError::InvalidRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to load").into_response(),
        }
    }
}

/// Current time as an RFC 7231 HTTP-date.
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn strip_cache_headers(headers: &mut HeaderMap) {
    for name in &CACHE_RELATED_HEADERS {
        headers.remove(name);
    }
}

/// Tell clients and intermediaries not to cache this response.
pub fn mark_no_cache(headers: &mut HeaderMap) {
    headers.insert(X_REPLACED.clone(), HeaderValue::from_static("1"));
    if let Ok(date) = HeaderValue::from_str(&http_date()) {
        headers.insert(header::DATE, date);
    }
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
}

/// Set `Content-Encoding` to `token`, or remove it for identity.
pub fn set_content_encoding(headers: &mut HeaderMap, token: &str) {
    match HeaderValue::from_str(token) {
        Ok(value) if !token.is_empty() => {
            headers.insert(header::CONTENT_ENCODING, value);
        }
        _ => {
            headers.remove(header::CONTENT_ENCODING);
        }
    }
}

pub fn build_response(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// `302 Found` to `location`.
pub fn redirect(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => StatusCode::FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_no_cache() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=600"));
        strip_cache_headers(&mut headers);
        mark_no_cache(&mut headers);

        assert!(headers.get(header::ETAG).is_none());
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::PRAGMA], "no-cache");
        assert_eq!(headers["x-replaced"], "1");
        assert!(headers[header::DATE].to_str().unwrap().ends_with(" GMT"));
    }

    #[test]
    fn test_http_date_shape() {
        let date = http_date();
        // e.g. "Sun, 06 Nov 1994 08:49:37 GMT"
        assert_eq!(date.len(), 29);
        assert_eq!(&date[3..5], ", ");
    }

    #[test]
    fn test_errors_hide_detail() {
        let response = ProxyError::Overloaded { attempts: 4 }.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ProxyError::InvalidRequest("Host is empty").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_set_content_encoding() {
        let mut headers = HeaderMap::new();
        set_content_encoding(&mut headers, "gzip");
        assert_eq!(headers[header::CONTENT_ENCODING], "gzip");
        set_content_encoding(&mut headers, "");
        assert!(headers.get(header::CONTENT_ENCODING).is_none());
    }
}
