//! Discord login handshake, logout and the current-user endpoint.

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;
use subtle::ConstantTimeEq;
use time::Duration;

use crate::dtos::auth::{CallbackQuery, LoginQuery};
use crate::dtos::member::UserWithProfile;
use crate::dtos::ErrorResponse;
use crate::handlers::cookies::{
    http_only, is_https, removal, OAUTH_STATE_COOKIE, POST_LOGIN_REDIRECT_COOKIE,
    TRANSIENT_COOKIE_TTL,
};
use crate::handlers::redirect;
use crate::middleware::SessionUser;
use crate::services::ServiceError;
use crate::utils::generate_secure_token;
use crate::utils::redirect::safe_post_login_redirect;
use crate::AppState;

fn error(status: StatusCode, code: &str, description: &str) -> Response {
    (status, Json(ErrorResponse::new(code, description))).into_response()
}

/// Start the Discord login.
///
/// The post-login destination comes from `redirect_uri`, or from a pending
/// authorize request's cookie, and must pass the redirect allow-list.
#[utoipa::path(
    get,
    path = "/auth/login",
    params(LoginQuery),
    responses(
        (status = 307, description = "Redirect to Discord's authorization page")
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> (CookieJar, Response) {
    let security = &state.config.security;
    let requested = query
        .redirect_uri
        .or_else(|| jar.get(POST_LOGIN_REDIRECT_COOKIE).map(|c| c.value().to_string()));

    let target = requested
        .as_deref()
        .and_then(|r| safe_post_login_redirect(r, &security.allowed_origins))
        .unwrap_or_else(|| {
            if requested.is_some() {
                tracing::warn!("Rejected post-login redirect outside the allow-list");
            }
            security.default_redirect_url.clone()
        });

    let oauth_state = generate_secure_token();
    let secure = is_https(&state.config, &headers);
    let jar = jar
        .add(http_only(OAUTH_STATE_COOKIE, oauth_state.clone(), TRANSIENT_COOKIE_TTL, secure))
        .add(http_only(POST_LOGIN_REDIRECT_COOKIE, target, TRANSIENT_COOKIE_TTL, secure));

    let url = state.auth_service.discord().authorize_url(&oauth_state);
    (jar, redirect(StatusCode::TEMPORARY_REDIRECT, &url))
}

/// Finish the Discord login and establish a session.
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackQuery),
    responses(
        (status = 307, description = "Session created; redirect to the stored destination"),
        (status = 400, description = "Missing code, or state mismatch", body = ErrorResponse),
        (status = 403, description = "Not a member of the guild", body = ErrorResponse),
        (status = 502, description = "Discord request failed")
    ),
    tag = "Authentication"
)]
#[tracing::instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let expected_state = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    let stored_redirect = jar.get(POST_LOGIN_REDIRECT_COOKIE).map(|c| c.value().to_string());

    // The handshake cookies are single-use whatever the outcome
    let jar = jar
        .remove(removal(OAUTH_STATE_COOKIE))
        .remove(removal(POST_LOGIN_REDIRECT_COOKIE));

    if let Some(upstream_error) = query.error {
        tracing::warn!(error = %upstream_error, "Discord returned an authorization error");
        return (
            jar,
            error(StatusCode::BAD_REQUEST, "access_denied", "Discord authorization was denied"),
        )
            .into_response();
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        return (
            jar,
            error(StatusCode::BAD_REQUEST, "missing_code", "Authorization code is required"),
        )
            .into_response();
    };
    let Some(returned_state) = query.state.filter(|s| !s.is_empty()) else {
        return (
            jar,
            error(StatusCode::BAD_REQUEST, "missing_state", "State parameter is required"),
        )
            .into_response();
    };
    let Some(expected_state) = expected_state else {
        return (
            jar,
            error(StatusCode::BAD_REQUEST, "invalid_state", "State cookie not found"),
        )
            .into_response();
    };
    if !bool::from(returned_state.as_bytes().ct_eq(expected_state.as_bytes())) {
        tracing::warn!("OAuth state mismatch on Discord callback");
        return (
            jar,
            error(StatusCode::BAD_REQUEST, "state_mismatch", "State parameter does not match"),
        )
            .into_response();
    }

    let outcome = match state.auth_service.complete_login(&code).await {
        Ok(outcome) => outcome,
        Err(ServiceError::NotGuildMember) => {
            return (
                jar,
                error(
                    StatusCode::FORBIDDEN,
                    "not_guild_member",
                    "You are not a member of the guild",
                ),
            )
                .into_response()
        }
        Err(e) => return (jar, AppError::from(e)).into_response(),
    };

    let target = stored_redirect
        .as_deref()
        .and_then(|r| safe_post_login_redirect(r, &state.config.security.allowed_origins))
        .unwrap_or_else(|| state.config.security.default_redirect_url.clone());

    let secure = is_https(&state.config, &headers);
    let session_max_age = Duration::seconds(state.session_service.ttl().num_seconds());
    let jar = jar.add(http_only(
        &state.config.session.cookie_name,
        outcome.session.token,
        session_max_age,
        secure,
    ));

    tracing::info!(user_id = %outcome.user.id, "Login completed");
    (jar, redirect(StatusCode::TEMPORARY_REDIRECT, &target)).into_response()
}

/// End the current session. Succeeds without a session too.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out")
    ),
    tag = "Authentication"
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AppError> {
    let cookie_name = state.config.session.cookie_name.clone();
    if let Some(token) = jar.get(&cookie_name).map(|c| c.value().to_string()) {
        state.auth_service.logout(&token).await?;
    }

    Ok((
        jar.remove(removal(&cookie_name)),
        Json(serde_json::json!({
            "success": true,
            "message": "Logout successful"
        })),
    ))
}

/// Profile of the signed-in member
#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = UserWithProfile),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "User"
)]
pub async fn me(
    State(state): State<AppState>,
    SessionUser(user): SessionUser,
) -> Result<Json<UserWithProfile>, AppError> {
    let member = state.member_service.with_profile(user).await?;
    Ok(Json(member.into()))
}
