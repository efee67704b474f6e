use axum::{
    extract::{Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;

/// Whether the client reached us over TLS, directly or through a proxy that
/// sets `X-Forwarded-Proto`.
fn arrived_over_https(req: &Request) -> bool {
    req.uri().scheme_str() == Some("https")
        || req
            .headers()
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

/// Permanently redirect plain-HTTP requests to their `https://` equivalent.
///
/// A no-op unless `enabled`.
pub async fn https_redirect_middleware(
    State(enabled): State<bool>,
    req: Request,
    next: Next,
) -> Response {
    if !enabled || arrived_over_https(&req) {
        return next.run(req).await;
    }

    let Some(host) = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
    else {
        return AppError::BadRequest(anyhow::anyhow!("Host header is required")).into_response();
    };

    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    match HeaderValue::from_str(&format!("https://{}{}", host, path)) {
        Ok(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        Err(_) => AppError::BadRequest(anyhow::anyhow!("Invalid Host header")).into_response(),
    }
}
