pub mod auth;
pub mod clients;
pub mod cookies;
pub mod health;
pub mod jwt;
pub mod members;
pub mod metrics;
pub mod oauth;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

/// Redirect with a validated `Location` header.
///
/// `axum::response::Redirect` panics on bytes that are not a legal header
/// value; targets built from request data go through here instead.
pub fn redirect(status: StatusCode, target: &str) -> Response {
    match HeaderValue::from_str(target) {
        Ok(location) => (status, [(header::LOCATION, location)]).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Refusing to redirect to an invalid Location");
            AppError::InternalError(anyhow::anyhow!("Invalid redirect target")).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_sets_location() {
        let res = redirect(StatusCode::SEE_OTHER, "/auth/login?redirect_uri=%2F");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers()[header::LOCATION], "/auth/login?redirect_uri=%2F");
    }

    #[test]
    fn test_redirect_to_invalid_header_value_is_an_error_not_a_panic() {
        let res = redirect(StatusCode::TEMPORARY_REDIRECT, "/a\nb");
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.headers().get(header::LOCATION).is_none());
    }
}
