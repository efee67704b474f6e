//! First-party JWT issuance for signed-in members and the JWT-protected API.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::dtos::jwt::{JwtResponse, VerifyResponse};
use crate::dtos::member::UserWithProfile;
use crate::dtos::ErrorResponse;
use crate::middleware::jwt::{bearer_jwt, unauthorized};
use crate::middleware::JwtUser;
use crate::models::User;
use crate::services::ServiceError;
use crate::AppState;

fn sign(state: &AppState, user: &User) -> Result<Json<JwtResponse>, AppError> {
    let token = state.jwt_service.issue(user).map_err(AppError::InternalError)?;
    Ok(Json(JwtResponse::bearer(token, state.jwt_service.expires_in())))
}

/// Exchange the session cookie for a signed JWT
#[utoipa::path(
    post,
    path = "/token",
    responses(
        (status = 200, description = "JWT issued", body = JwtResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn issue_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let Some(token) = jar
        .get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
    else {
        return unauthorized("unauthorized", "No session found");
    };

    let user = match state.session_service.resolve(&token).await {
        Ok(user) => user,
        Err(
            ServiceError::SessionNotFound | ServiceError::SessionExpired | ServiceError::UserNotFound,
        ) => return unauthorized("invalid_session", "Session is invalid or expired"),
        Err(e) => return AppError::from(e).into_response(),
    };

    tracing::info!(user_id = %user.id, "Issued JWT from session");
    sign(&state, &user).into_response()
}

/// Trade a still-valid JWT for a fresh one
#[utoipa::path(
    post,
    path = "/token/refresh",
    responses(
        (status = 200, description = "JWT refreshed", body = JwtResponse),
        (status = 401, description = "Missing, malformed or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn refresh_token(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let claims = match bearer_jwt(&headers) {
        Ok(token) => state.jwt_service.verify(token),
        Err(res) => return res,
    };
    let Ok(claims) = claims else {
        return unauthorized("invalid_token", "Token is invalid or expired");
    };

    // Re-read the user so renamed or deleted accounts are reflected
    let user = match state.member_service.get(claims.sub).await {
        Ok(member) => member.user,
        Err(ServiceError::UserNotFound) => {
            return unauthorized("invalid_token", "Token subject no longer exists")
        }
        Err(e) => return AppError::from(e).into_response(),
    };

    sign(&state, &user).into_response()
}

/// Check a JWT and echo its identity claims
#[utoipa::path(
    get,
    path = "/api/verify",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn verify(JwtUser(claims): JwtUser) -> Json<VerifyResponse> {
    Json(VerifyResponse {
        valid: true,
        user_id: claims.sub,
        discord_id: claims.discord_id,
        username: claims.username,
    })
}

/// The JWT holder's user record and profile
#[utoipa::path(
    get,
    path = "/api/user",
    responses(
        (status = 200, description = "Current user", body = UserWithProfile),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn user(
    State(state): State<AppState>,
    JwtUser(claims): JwtUser,
) -> Result<Json<UserWithProfile>, AppError> {
    let member = state.member_service.get(claims.sub).await?;
    Ok(Json(member.into()))
}
