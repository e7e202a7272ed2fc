/// Middleware for the request-processing pipeline
///
/// - `waf`: pattern-based threat filter, first stage of the pipeline
/// - `rate_limit`: sliding-window per-client throttle backed by Redis
/// - `security`: security response headers, applied to every response
///
/// CORS, request tracing, and the panic boundary come from tower-http and
/// are assembled alongside these in `crate::app`.

pub mod rate_limit;
pub mod security;
pub mod waf;

use axum::extract::ConnectInfo;
use axum::extract::Request;
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use std::net::SocketAddr;

/// Resolves the client address for rate limiting and threat logging.
///
/// Only the trusted edge-provided header is consulted, never
/// client-controlled forwarding headers, which are trivially spoofed. When
/// the header is absent (direct connections in development) the socket peer
/// address is used instead.
pub fn client_addr(request: &Request, trusted_header: &str) -> String {
    if let Some(value) = request
        .headers()
        .get(trusted_header)
        .and_then(|v| v.to_str().ok())
    {
        return value.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rewrites answered CORS preflights to `204 No Content`.
///
/// `CorsLayer` answers preflights with an empty-body 200; the contract for
/// the surface is a no-body 204. Must sit outside the CORS layer so it
/// sees the preflight response. Non-preflight OPTIONS requests and
/// preflights the CORS layer rejected pass through untouched.
pub async fn preflight_no_content(request: Request, next: Next) -> Response {
    let is_preflight = request.method() == Method::OPTIONS
        && request.headers().contains_key(header::ORIGIN)
        && request
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);

    let mut response = next.run(request).await;

    if is_preflight && response.status() == StatusCode::OK {
        *response.status_mut() = StatusCode::NO_CONTENT;
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_client_addr_prefers_trusted_header() {
        let request = Request::builder()
            .uri("/")
            .header("cf-connecting-ip", "203.0.113.9")
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_addr(&request, "cf-connecting-ip"), "203.0.113.9");
    }

    #[test]
    fn test_client_addr_ignores_forwarding_headers() {
        let request = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "198.51.100.1")
            .body(Body::empty())
            .unwrap();

        // Spoofable headers never count as identity
        assert_eq!(client_addr(&request, "cf-connecting-ip"), "unknown");
    }

    #[test]
    fn test_client_addr_falls_back_to_socket_peer() {
        let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 4], 51000))));

        assert_eq!(client_addr(&request, "cf-connecting-ip"), "192.0.2.4");
    }
}
