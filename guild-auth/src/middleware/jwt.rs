use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::dtos::ErrorResponse;
use crate::services::JwtClaims;
use crate::AppState;

/// Claims of the verified first-party JWT, inserted by [`jwt_auth_middleware`].
#[derive(Debug, Clone)]
pub struct JwtUser(pub JwtClaims);

pub(crate) fn unauthorized(code: &str, description: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse::new(code, description))).into_response()
}

/// Token from `Authorization: Bearer <jwt>`, or the 401 to send instead.
pub(crate) fn bearer_jwt(headers: &HeaderMap) -> Result<&str, Response> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| unauthorized("missing_token", "Authorization header is required"))?;

    match value.strip_prefix("Bearer ").map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(unauthorized(
            "invalid_token_format",
            "Authorization header must be in 'Bearer <token>' format",
        )),
    }
}

/// Require a first-party JWT signed by this server.
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let claims = match bearer_jwt(req.headers()) {
        Ok(token) => state.jwt_service.verify(token),
        Err(res) => return res,
    };

    match claims {
        Ok(claims) => {
            req.extensions_mut().insert(JwtUser(claims));
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected JWT");
            unauthorized("invalid_token", "Token is invalid or expired")
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for JwtUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JwtUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!("JWT claims missing from request extensions"))
            })
    }
}
