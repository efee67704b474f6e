//! OAuth2 authorization server endpoints and bearer-protected resources.

use axum::{
    extract::{rejection::FormRejection, OriginalUri, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use reqwest::Url;
use uuid::Uuid;

use crate::dtos::member::{MembersQuery, MembersResponse, UserWithProfile};
use crate::dtos::oauth::{AuthorizeQuery, OAuthError, RevokeForm, TokenForm, TokenResponse};
use crate::dtos::ErrorResponse;
use crate::handlers::cookies::{http_only, is_https, POST_LOGIN_REDIRECT_COOKIE, TRANSIENT_COOKIE_TTL};
use crate::handlers::redirect;
use crate::middleware::BearerUser;
use crate::services::{AuthorizeRequest, ServiceError, TokenRequest};
use crate::utils::ClientSecret;
use crate::AppState;

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Authorization endpoint.
///
/// Browsers without a session are sent through the Discord login and land
/// back here afterwards.
#[utoipa::path(
    get,
    path = "/oauth/authorize",
    params(AuthorizeQuery),
    responses(
        (status = 303, description = "Redirect to the client with `code` and `state`, or to login"),
        (status = 400, description = "Invalid authorization request", body = ErrorResponse)
    ),
    tag = "OAuth2"
)]
#[tracing::instrument(skip_all)]
pub async fn authorize(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    jar: CookieJar,
    Query(query): Query<AuthorizeQuery>,
) -> Response {
    let (Some(client_id), Some(redirect_uri), Some(response_type)) = (
        required(query.client_id),
        required(query.redirect_uri),
        required(query.response_type),
    ) else {
        return OAuthError::invalid_request("Missing required parameters").into_response();
    };

    let session_token = jar
        .get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string());
    let user = match session_token {
        Some(token) => state.session_service.resolve(&token).await,
        None => Err(ServiceError::SessionNotFound),
    };
    let user = match user {
        Ok(user) => user,
        Err(
            ServiceError::SessionNotFound | ServiceError::SessionExpired | ServiceError::UserNotFound,
        ) => {
            let resume = uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/oauth/authorize".to_string());
            let secure = is_https(&state.config, &headers);
            let jar = jar.add(http_only(POST_LOGIN_REDIRECT_COOKIE, resume, TRANSIENT_COOKIE_TTL, secure));
            return (jar, redirect(StatusCode::SEE_OTHER, "/auth/login")).into_response();
        }
        Err(e) => return OAuthError::from(e).into_response(),
    };

    let granted = state
        .oauth2_service
        .authorize(AuthorizeRequest {
            client_id,
            redirect_uri,
            response_type,
            user_id: user.id,
            state: required(query.state),
        })
        .await;

    let granted = match granted {
        Ok(granted) => granted,
        Err(e @ (ServiceError::UnsupportedResponseType | ServiceError::Store(_) | ServiceError::Internal(_))) => {
            return OAuthError::from(e).into_response()
        }
        Err(e) => return OAuthError::invalid_request(e.to_string()).into_response(),
    };

    let Ok(mut target) = Url::parse(&granted.redirect_uri) else {
        tracing::error!(redirect_uri = %granted.redirect_uri, "Registered redirect URI is not a URL");
        return OAuthError::server_error().into_response();
    };
    {
        let mut pairs = target.query_pairs_mut();
        pairs.append_pair("code", &granted.code);
        if let Some(client_state) = &granted.state {
            pairs.append_pair("state", client_state);
        }
    }

    redirect(StatusCode::SEE_OTHER, target.as_str())
}

/// Token endpoint (authorization_code grant)
#[utoipa::path(
    post,
    path = "/oauth/token",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "invalid_request, invalid_grant or unsupported_grant_type", body = ErrorResponse),
        (status = 401, description = "invalid_client", body = ErrorResponse),
        (status = 429, description = "Too many requests")
    ),
    tag = "OAuth2"
)]
pub async fn token(
    State(state): State<AppState>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<impl IntoResponse, OAuthError> {
    let Form(form) = form.map_err(|e| OAuthError::invalid_request(e.body_text()))?;

    let (Some(grant_type), Some(code), Some(client_id), Some(client_secret)) = (
        required(form.grant_type),
        required(form.code),
        required(form.client_id),
        required(form.client_secret),
    ) else {
        return Err(OAuthError::invalid_request("Missing required parameters"));
    };

    let issued = state
        .oauth2_service
        .exchange_token(TokenRequest {
            grant_type,
            code,
            client_id,
            client_secret: ClientSecret::new(client_secret),
            redirect_uri: form.redirect_uri.unwrap_or_default(),
        })
        .await?;

    Ok((
        [(header::CACHE_CONTROL, "no-store"), (header::PRAGMA, "no-cache")],
        Json(TokenResponse {
            access_token: issued.access_token,
            token_type: issued.token_type.to_string(),
            expires_in: issued.expires_in,
            refresh_token: issued.refresh_token,
        }),
    ))
}

/// Token revocation (RFC 7009). Unknown tokens are accepted silently.
#[utoipa::path(
    post,
    path = "/oauth/revoke",
    request_body(content = RevokeForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Token revoked or unknown"),
        (status = 400, description = "invalid_request", body = ErrorResponse),
        (status = 401, description = "invalid_client", body = ErrorResponse)
    ),
    tag = "OAuth2"
)]
pub async fn revoke(
    State(state): State<AppState>,
    form: Result<Form<RevokeForm>, FormRejection>,
) -> Result<StatusCode, OAuthError> {
    let Form(form) = form.map_err(|e| OAuthError::invalid_request(e.body_text()))?;

    let (Some(token), Some(client_id), Some(client_secret)) = (
        required(form.token),
        required(form.client_id),
        required(form.client_secret),
    ) else {
        return Err(OAuthError::invalid_request("Missing required parameters"));
    };

    state
        .oauth2_service
        .revoke_token(&token, &client_id, &ClientSecret::new(client_secret))
        .await?;
    Ok(StatusCode::OK)
}

/// Identity of the access token's owner
#[utoipa::path(
    get,
    path = "/oauth/userinfo",
    responses(
        (status = 200, description = "Token owner", body = UserWithProfile),
        (status = 401, description = "invalid_token", body = ErrorResponse)
    ),
    tag = "OAuth2",
    security(("bearer_auth" = []))
)]
pub async fn userinfo(
    State(state): State<AppState>,
    BearerUser(user): BearerUser,
) -> Result<Json<UserWithProfile>, OAuthError> {
    let member = state.member_service.with_profile(user).await?;
    Ok(Json(member.into()))
}

/// Any member by id
#[utoipa::path(
    get,
    path = "/oauth/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "Member", body = UserWithProfile),
        (status = 401, description = "invalid_token", body = ErrorResponse),
        (status = 404, description = "No such user", body = ErrorResponse)
    ),
    tag = "OAuth2",
    security(("bearer_auth" = []))
)]
pub async fn user_by_id(
    State(state): State<AppState>,
    _caller: BearerUser,
    Path(id): Path<String>,
) -> Response {
    let not_found = || {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("user_not_found", "User not found")),
        )
            .into_response()
    };

    let Ok(user_id) = Uuid::parse_str(&id) else {
        return not_found();
    };
    match state.member_service.get(user_id).await {
        Ok(member) => Json(UserWithProfile::from(member)).into_response(),
        Err(ServiceError::UserNotFound) => not_found(),
        Err(e) => OAuthError::from(e).into_response(),
    }
}

/// Member directory for OAuth2 clients
#[utoipa::path(
    get,
    path = "/oauth/members",
    params(MembersQuery),
    responses(
        (status = 200, description = "One page of members", body = MembersResponse),
        (status = 401, description = "invalid_token", body = ErrorResponse)
    ),
    tag = "OAuth2",
    security(("bearer_auth" = []))
)]
pub async fn members(
    State(state): State<AppState>,
    _caller: BearerUser,
    Query(query): Query<MembersQuery>,
) -> Result<Json<MembersResponse>, OAuthError> {
    let (limit, offset) = (query.limit(), query.offset());
    let members = state.member_service.list(limit, offset).await?;
    Ok(Json(MembersResponse::page(members, limit, offset)))
}
