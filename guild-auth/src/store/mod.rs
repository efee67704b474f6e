//! Credential store: persistence contract for users, sessions, clients,
//! authorization codes, tokens and profiles.
//!
//! Lookup-miss conventions:
//! - natural-key lookups (`find_*`) return `Ok(None)`,
//! - primary-key reads and mutations of a missing row return [`StoreError::NotFound`],
//! - uniqueness violations on insert return [`StoreError::Conflict`].

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AuthCode, ClientApp, Profile, Session, Token, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> StoreResult<()>;
    async fn get_user(&self, id: Uuid) -> StoreResult<User>;
    async fn find_user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;
    /// Page of users ordered by username, then id.
    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> StoreResult<()>;
    /// Live sessions only: an expired row is reported as absent.
    async fn find_session_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>>;
    /// Returns whether a row was removed; a missing token is not an error.
    async fn delete_session_by_token(&self, token: &str) -> StoreResult<bool>;
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn create_client(&self, client: &ClientApp) -> StoreResult<()>;
    async fn get_client(&self, id: Uuid) -> StoreResult<ClientApp>;
    async fn find_client_by_client_id(&self, client_id: &str) -> StoreResult<Option<ClientApp>>;
    async fn list_clients_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<ClientApp>>;
    async fn update_client(&self, client: &ClientApp) -> StoreResult<()>;
    async fn delete_client(&self, client_id: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait AuthCodeStore: Send + Sync {
    async fn create_auth_code(&self, code: &AuthCode) -> StoreResult<()>;
    async fn find_auth_code(&self, code: &str) -> StoreResult<Option<AuthCode>>;
    /// Atomically flip `used` from false to true.
    ///
    /// Returns `false` when the code was already used or does not exist, so
    /// exactly one of any number of concurrent callers observes `true`.
    async fn mark_auth_code_used(&self, code: &str) -> StoreResult<bool>;
    async fn delete_expired_auth_codes(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert all tokens or none of them.
    async fn create_tokens(&self, tokens: &[Token]) -> StoreResult<()>;
    async fn find_token(&self, token: &str) -> StoreResult<Option<Token>>;
    /// Returns whether an active token was moved to revoked.
    async fn revoke_token(&self, token: &str) -> StoreResult<bool>;
    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn save_profile(&self, profile: &Profile) -> StoreResult<()>;
    async fn find_profile_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    async fn find_profiles_by_user_ids(&self, user_ids: &[Uuid]) -> StoreResult<Vec<Profile>>;
}

/// Every entity store behind one object, as handed to the services.
#[async_trait]
pub trait CredentialStore:
    UserStore + SessionStore + ClientStore + AuthCodeStore + TokenStore + ProfileStore
{
    async fn health_check(&self) -> StoreResult<()>;
}
