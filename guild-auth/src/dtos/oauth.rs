use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dtos::ErrorResponse;
use crate::services::ServiceError;

/// `GET /oauth/authorize` parameters. Everything is optional at the
/// extractor so missing fields surface as OAuth2 errors, not rejections.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
pub struct AuthorizeQuery {
    #[param(example = "code")]
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    #[param(example = "https://app.example.com/callback")]
    pub redirect_uri: Option<String>,
    pub state: Option<String>,
    pub scope: Option<String>,
}

/// `application/x-www-form-urlencoded` body of `POST /oauth/token`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenForm {
    #[schema(example = "authorization_code")]
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 3600)]
    pub expires_in: i64,
    pub refresh_token: String,
}

/// RFC 7009 revocation request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeForm {
    pub token: Option<String>,
    pub token_type_hint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// RFC 6749 error response with its HTTP status.
#[derive(Debug)]
pub struct OAuthError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl OAuthError {
    fn new(status: StatusCode, error: &str, description: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse::new(error, description),
        }
    }

    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", description)
    }

    pub fn invalid_client() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_client", "Client authentication failed")
    }

    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_grant", description)
    }

    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "invalid_token", description)
    }

    pub fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "Internal server error")
    }
}

impl From<ServiceError> for OAuthError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidClient | ServiceError::InvalidClientSecret => Self::invalid_client(),
            ServiceError::UnsupportedGrantType => Self::new(
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                err.to_string(),
            ),
            ServiceError::UnsupportedResponseType => Self::new(
                StatusCode::BAD_REQUEST,
                "unsupported_response_type",
                err.to_string(),
            ),
            ServiceError::InvalidAuthorizationCode
            | ServiceError::AuthorizationCodeAlreadyUsed
            | ServiceError::AuthorizationCodeExpired
            | ServiceError::ClientMismatch
            | ServiceError::RedirectUriMismatch => Self::invalid_grant(err.to_string()),
            ServiceError::TokenNotFound
            | ServiceError::WrongTokenType
            | ServiceError::TokenExpiredOrRevoked
            | ServiceError::UserNotFound => Self::invalid_token("Token is invalid or expired"),
            ServiceError::InvalidRedirectUri | ServiceError::InvalidUser => {
                Self::invalid_request(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "OAuth2 request failed");
                Self::server_error()
            }
        }
    }
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let challenge = match self.body.error.as_str() {
            _ if self.status != StatusCode::UNAUTHORIZED => None,
            "invalid_client" => Some("Basic"),
            _ => Some("Bearer error=\"invalid_token\""),
        };

        let mut res = (self.status, Json(self.body)).into_response();
        let headers = res.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if let Some(challenge) = challenge {
            headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
        }
        res
    }
}
