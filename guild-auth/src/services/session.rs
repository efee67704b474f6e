//! Session engine: mint, resolve and drop first-party sessions.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{Session, User};
use crate::services::ServiceError;
use crate::store::{CredentialStore, SessionStore, StoreError, UserStore};
use crate::utils::generate_secure_token;

#[derive(Clone)]
pub struct SessionService {
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
}

impl SessionService {
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn issue(&self, user_id: Uuid) -> Result<Session, ServiceError> {
        let session = Session::new(user_id, generate_secure_token(), self.ttl, Utc::now());
        self.store.create_session(&session).await?;
        tracing::debug!(user_id = %user_id, session_id = %session.id, "Session issued");
        Ok(session)
    }

    /// Resolve a session token to its owning user.
    ///
    /// Missing and expired sessions both fail; callers must not treat them
    /// differently.
    pub async fn resolve(&self, token: &str) -> Result<User, ServiceError> {
        let now = Utc::now();
        let session = self
            .store
            .find_session_by_token(token, now)
            .await?
            .ok_or(ServiceError::SessionNotFound)?;

        if !session.is_live_at(now) {
            return Err(ServiceError::SessionExpired);
        }

        match self.store.get_user(session.user_id).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => Err(ServiceError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Idempotent: revoking an unknown token succeeds.
    pub async fn revoke(&self, token: &str) -> Result<(), ServiceError> {
        let removed = self.store.delete_session_by_token(token).await?;
        tracing::debug!(removed, "Session revoked");
        Ok(())
    }
}
