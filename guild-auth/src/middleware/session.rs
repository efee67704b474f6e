use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::ErrorResponse;
use crate::handlers::redirect;
use crate::models::User;
use crate::services::ServiceError;
use crate::AppState;

/// User resolved from the session cookie, inserted by [`session_auth_middleware`].
#[derive(Debug, Clone)]
pub struct SessionUser(pub User);

/// Require a live first-party session.
///
/// JSON callers and `DELETE` requests get a 401; browsers are sent to the
/// login page and brought back to the requested path afterwards.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let token = jar
        .get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());

    let resolved = match token {
        Some(token) => state.session_service.resolve(&token).await,
        None => Err(ServiceError::SessionNotFound),
    };

    match resolved {
        Ok(user) => {
            req.extensions_mut().insert(SessionUser(user));
            next.run(req).await
        }
        Err(
            ServiceError::SessionNotFound | ServiceError::SessionExpired | ServiceError::UserNotFound,
        ) => unauthenticated(&req),
        Err(e) => AppError::from(e).into_response(),
    }
}

fn wants_json(req: &Request) -> bool {
    let mentions_json = |name: header::HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"))
    };
    req.method() == Method::DELETE || mentions_json(header::ACCEPT) || mentions_json(header::CONTENT_TYPE)
}

fn unauthenticated(req: &Request) -> Response {
    if wants_json(req) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::new("unauthorized", "Authentication required")),
        )
            .into_response();
    }

    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .filter(|p| p.starts_with('/') && !p.starts_with("//"))
        .unwrap_or("/");

    redirect(
        StatusCode::SEE_OTHER,
        &format!("/auth/login?redirect_uri={}", urlencoding::encode(target)),
    )
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionUser>()
            .cloned()
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!("Session user missing from request extensions"))
            })
    }
}
