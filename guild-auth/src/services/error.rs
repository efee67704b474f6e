use service_core::error::AppError;
use thiserror::Error;

use crate::services::discord::DiscordError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Discord code exchange failed: {0}")]
    UpstreamExchangeFailed(#[source] DiscordError),

    #[error("Discord profile fetch failed: {0}")]
    UpstreamProfileFetchFailed(#[source] DiscordError),

    #[error("Discord guild membership check failed: {0}")]
    UpstreamMembershipCheckFailed(#[source] DiscordError),

    #[error("User is not a member of the guild")]
    NotGuildMember,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("User not found")]
    UserNotFound,

    #[error("Client ID already exists")]
    ClientIdAlreadyExists,

    #[error("Client not found")]
    ClientNotFound,

    #[error("Invalid client registration: {0}")]
    InvalidClientRegistration(String),

    #[error("Unsupported response type")]
    UnsupportedResponseType,

    #[error("Invalid client")]
    InvalidClient,

    #[error("Invalid redirect URI")]
    InvalidRedirectUri,

    #[error("Invalid user")]
    InvalidUser,

    #[error("Unsupported grant type")]
    UnsupportedGrantType,

    #[error("Invalid client secret")]
    InvalidClientSecret,

    #[error("Invalid authorization code")]
    InvalidAuthorizationCode,

    #[error("Authorization code already used")]
    AuthorizationCodeAlreadyUsed,

    #[error("Authorization code expired")]
    AuthorizationCodeExpired,

    #[error("Client ID does not match the authorization code")]
    ClientMismatch,

    #[error("Redirect URI does not match the authorization code")]
    RedirectUriMismatch,

    #[error("Token not found")]
    TokenNotFound,

    #[error("Wrong token type")]
    WrongTokenType,

    #[error("Token expired or revoked")]
    TokenExpiredOrRevoked,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::UpstreamExchangeFailed(_)
            | ServiceError::UpstreamProfileFetchFailed(_)
            | ServiceError::UpstreamMembershipCheckFailed(_) => {
                tracing::error!(error = %err, "Discord upstream failure");
                AppError::BadGateway("Discord authentication failed".to_string())
            }
            ServiceError::NotGuildMember => {
                AppError::Forbidden(anyhow::anyhow!("You must be a member of the guild"))
            }
            // Expired and missing sessions are indistinguishable to callers
            ServiceError::SessionNotFound | ServiceError::SessionExpired => {
                AppError::Unauthorized(anyhow::anyhow!("Session is invalid or expired"))
            }
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::ClientNotFound => AppError::NotFound(anyhow::anyhow!("Client not found")),
            ServiceError::ClientIdAlreadyExists => {
                AppError::Conflict(anyhow::anyhow!("Client ID already exists"))
            }
            ServiceError::InvalidClient | ServiceError::InvalidClientSecret => {
                AppError::Unauthorized(anyhow::anyhow!("Invalid client credentials"))
            }
            ServiceError::TokenNotFound
            | ServiceError::WrongTokenType
            | ServiceError::TokenExpiredOrRevoked => {
                AppError::Unauthorized(anyhow::anyhow!("Token is invalid or expired"))
            }
            ServiceError::InvalidClientRegistration(_)
            | ServiceError::UnsupportedResponseType
            | ServiceError::InvalidRedirectUri
            | ServiceError::InvalidUser
            | ServiceError::UnsupportedGrantType
            | ServiceError::InvalidAuthorizationCode
            | ServiceError::AuthorizationCodeAlreadyUsed
            | ServiceError::AuthorizationCodeExpired
            | ServiceError::ClientMismatch
            | ServiceError::RedirectUriMismatch => AppError::BadRequest(anyhow::anyhow!(err.to_string())),
            ServiceError::Store(StoreError::NotFound(entity)) => {
                AppError::NotFound(anyhow::anyhow!("{} not found", entity))
            }
            ServiceError::Store(StoreError::Conflict(entity)) => {
                AppError::Conflict(anyhow::anyhow!("{} already exists", entity))
            }
            ServiceError::Store(StoreError::Database(e)) => AppError::DatabaseError(anyhow::anyhow!(e)),
            ServiceError::Store(StoreError::Backend(e)) => AppError::InternalError(anyhow::anyhow!(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use service_core::axum::{http::StatusCode, response::IntoResponse};

    fn status(err: ServiceError) -> StatusCode {
        AppError::from(err).into_response().status()
    }

    #[test]
    fn test_upstream_failures_are_bad_gateway() {
        let err = ServiceError::UpstreamExchangeFailed(DiscordError::UnexpectedStatus {
            status: 500,
            body: String::new(),
        });
        assert_eq!(status(err), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_expired_and_missing_sessions_look_the_same() {
        assert_eq!(status(ServiceError::SessionNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(status(ServiceError::SessionExpired), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_not_guild_member_is_forbidden() {
        assert_eq!(status(ServiceError::NotGuildMember), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_store_failures_are_internal() {
        let err = ServiceError::Store(StoreError::Backend("boom".to_string()));
        assert_eq!(status(err), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
