//! Authorization server: authorization-code grant, token issuance and
//! bearer token resolution.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::OAuth2Config;
use crate::models::{AuthCode, AuthCodeState, Token, TokenType, User};
use crate::services::{metrics, ClientService, ServiceError};
use crate::store::{AuthCodeStore, ClientStore, CredentialStore, StoreError, TokenStore, UserStore};
use crate::utils::{generate_secure_token, ClientSecret};

pub const RESPONSE_TYPE_CODE: &str = "code";
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";
pub const TOKEN_TYPE_BEARER: &str = "Bearer";

#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub response_type: String,
    pub user_id: Uuid,
    pub state: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthorizeResult {
    pub code: String,
    pub state: Option<String>,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub client_id: String,
    pub client_secret: ClientSecret,
    pub redirect_uri: String,
}

#[derive(Debug, Clone)]
pub struct TokenResult {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct OAuth2Service {
    store: Arc<dyn CredentialStore>,
    clients: ClientService,
    auth_code_ttl: Duration,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
}

impl OAuth2Service {
    pub fn new(store: Arc<dyn CredentialStore>, clients: ClientService, config: &OAuth2Config) -> Self {
        Self {
            store,
            clients,
            auth_code_ttl: Duration::minutes(config.auth_code_ttl_minutes),
            access_token_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Issue a single-use authorization code for an already authenticated user.
    #[tracing::instrument(skip_all, fields(client_id = %req.client_id, user_id = %req.user_id))]
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<AuthorizeResult, ServiceError> {
        if req.response_type != RESPONSE_TYPE_CODE {
            return Err(ServiceError::UnsupportedResponseType);
        }

        let client = self
            .store
            .find_client_by_client_id(&req.client_id)
            .await?
            .ok_or(ServiceError::InvalidClient)?;

        if !client.allows_redirect(&req.redirect_uri) {
            tracing::warn!(redirect_uri = %req.redirect_uri, "Redirect URI not registered");
            return Err(ServiceError::InvalidRedirectUri);
        }

        match self.store.get_user(req.user_id).await {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => return Err(ServiceError::InvalidUser),
            Err(e) => return Err(e.into()),
        }

        let auth_code = AuthCode::new(
            generate_secure_token(),
            client.client_id,
            req.user_id,
            req.redirect_uri,
            self.auth_code_ttl,
            Utc::now(),
        );
        self.store.create_auth_code(&auth_code).await?;

        tracing::info!("Authorization code issued");

        Ok(AuthorizeResult {
            code: auth_code.code,
            state: req.state,
            redirect_uri: auth_code.redirect_uri,
        })
    }

    /// Redeem an authorization code for an access/refresh token pair.
    ///
    /// Every check runs before the code is consumed; once consumed it is never
    /// usable again, even if token persistence fails afterwards.
    #[tracing::instrument(skip_all, fields(client_id = %req.client_id))]
    pub async fn exchange_token(&self, req: TokenRequest) -> Result<TokenResult, ServiceError> {
        let result = self.try_exchange_token(req).await;
        metrics::record_token_exchange(match &result {
            Ok(_) => "success",
            Err(ServiceError::AuthorizationCodeAlreadyUsed) => "code_reused",
            Err(ServiceError::InvalidClient | ServiceError::InvalidClientSecret) => "invalid_client",
            Err(_) => "failure",
        });
        result
    }

    async fn try_exchange_token(&self, req: TokenRequest) -> Result<TokenResult, ServiceError> {
        if req.grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(ServiceError::UnsupportedGrantType);
        }

        let client = self
            .clients
            .authenticate(&req.client_id, &req.client_secret)
            .await?;

        let auth_code = self
            .store
            .find_auth_code(&req.code)
            .await?
            .ok_or(ServiceError::InvalidAuthorizationCode)?;

        let now = Utc::now();
        match auth_code.state_at(now) {
            AuthCodeState::Used => {
                tracing::warn!(auth_code_id = %auth_code.id, "Authorization code replayed");
                return Err(ServiceError::AuthorizationCodeAlreadyUsed);
            }
            AuthCodeState::Expired => return Err(ServiceError::AuthorizationCodeExpired),
            AuthCodeState::Issued => {}
        }
        if auth_code.client_id != client.client_id {
            return Err(ServiceError::ClientMismatch);
        }
        if auth_code.redirect_uri != req.redirect_uri {
            return Err(ServiceError::RedirectUriMismatch);
        }

        // Single-use commit point
        if !self.store.mark_auth_code_used(&auth_code.code).await? {
            return Err(ServiceError::AuthorizationCodeAlreadyUsed);
        }

        let access = Token::new(
            generate_secure_token(),
            TokenType::Access,
            auth_code.user_id,
            auth_code.client_id.clone(),
            self.access_token_ttl,
            now,
        );
        let refresh = Token::new(
            generate_secure_token(),
            TokenType::Refresh,
            auth_code.user_id,
            auth_code.client_id,
            self.refresh_token_ttl,
            now,
        );
        self.store
            .create_tokens(&[access.clone(), refresh.clone()])
            .await?;

        tracing::info!(user_id = %access.user_id, "Tokens issued");

        Ok(TokenResult {
            access_token: access.token,
            refresh_token: refresh.token,
            token_type: TOKEN_TYPE_BEARER,
            expires_in: self.access_token_ttl.num_seconds(),
        })
    }

    /// Resolve a bearer access token to its user.
    pub async fn resolve_access_token(&self, token: &str) -> Result<User, ServiceError> {
        let token = self
            .store
            .find_token(token)
            .await?
            .ok_or(ServiceError::TokenNotFound)?;

        if token.token_type != TokenType::Access {
            return Err(ServiceError::WrongTokenType);
        }
        if !token.is_live_at(Utc::now()) {
            return Err(ServiceError::TokenExpiredOrRevoked);
        }

        match self.store.get_user(token.user_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => Err(ServiceError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Revoke a token owned by the authenticated client.
    ///
    /// Unknown tokens and tokens of other clients are ignored so callers learn
    /// nothing about them.
    #[tracing::instrument(skip_all, fields(client_id = %client_id))]
    pub async fn revoke_token(
        &self,
        token: &str,
        client_id: &str,
        client_secret: &ClientSecret,
    ) -> Result<(), ServiceError> {
        let client = self.clients.authenticate(client_id, client_secret).await?;

        match self.store.find_token(token).await? {
            Some(found) if found.client_id == client.client_id => {
                if self.store.revoke_token(token).await? {
                    tracing::info!(token_id = %found.id, "Token revoked");
                }
            }
            Some(_) => tracing::warn!("Client attempted to revoke a foreign token"),
            None => {}
        }
        Ok(())
    }
}
