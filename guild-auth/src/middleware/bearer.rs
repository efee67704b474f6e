use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use service_core::error::AppError;

use crate::dtos::oauth::OAuthError;
use crate::models::User;
use crate::AppState;

/// User owning the presented OAuth2 access token.
#[derive(Debug, Clone)]
pub struct BearerUser(pub User);

/// Require `Authorization: Bearer <access token>` issued by this server.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match header_value {
        None => return OAuthError::invalid_token("Authorization header is required").into_response(),
        Some(value) => match value.strip_prefix("Bearer ").map(str::trim) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                return OAuthError::invalid_token(
                    "Authorization header must be in 'Bearer <token>' format",
                )
                .into_response()
            }
        },
    };

    match state.oauth2_service.resolve_access_token(&token).await {
        Ok(user) => {
            req.extensions_mut().insert(BearerUser(user));
            next.run(req).await
        }
        Err(e) => OAuthError::from(e).into_response(),
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for BearerUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<BearerUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!("Bearer user missing from request extensions"))
            })
    }
}
