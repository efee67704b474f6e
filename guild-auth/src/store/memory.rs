//! In-process credential store with the same contract as [`super::PgStore`].
//!
//! Backs the integration tests and local runs without PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    AuthCodeStore, ClientStore, CredentialStore, ProfileStore, SessionStore, StoreError,
    StoreResult, TokenStore, UserStore,
};
use crate::models::{AuthCode, ClientApp, Profile, Session, Token, User};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    clients: HashMap<String, ClientApp>,
    auth_codes: HashMap<String, AuthCode>,
    tokens: HashMap<String, Token>,
    profiles: HashMap<Uuid, Profile>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Backend(format!("Memory store mutex poisoned: {}", e)))
    }

    pub fn session_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.sessions.len())
    }

    pub fn user_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.users.len())
    }

    pub fn auth_code_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.auth_codes.len())
    }

    pub fn token_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.tokens.len())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.users.contains_key(&user.id)
            || state.users.values().any(|u| u.discord_id == user.discord_id)
        {
            return Err(StoreError::Conflict("user"));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        self.lock()?
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.discord_id == discord_id)
            .cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.lock()?;
        let existing = state
            .users
            .get_mut(&user.id)
            .ok_or(StoreError::NotFound("user"))?;
        // discord_id and created_at are immutable
        let discord_id = existing.discord_id.clone();
        let created_at = existing.created_at;
        *existing = User {
            discord_id,
            created_at,
            ..user.clone()
        };
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.users.remove(&id).ok_or(StoreError::NotFound("user"))?;
        // Mirror ON DELETE CASCADE
        state.sessions.retain(|_, s| s.user_id != id);
        let owned: Vec<String> = state
            .clients
            .values()
            .filter(|c| c.owner_id == id)
            .map(|c| c.client_id.clone())
            .collect();
        state.clients.retain(|_, c| c.owner_id != id);
        state
            .auth_codes
            .retain(|_, c| c.user_id != id && !owned.contains(&c.client_id));
        state
            .tokens
            .retain(|_, t| t.user_id != id && !owned.contains(&t.client_id));
        state.profiles.remove(&id);
        Ok(())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        let state = self.lock()?;
        let mut users: Vec<User> = state.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username).then(a.id.cmp(&b.id)));
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.sessions.contains_key(&session.token) {
            return Err(StoreError::Conflict("session"));
        }
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn find_session_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        Ok(self
            .lock()?
            .sessions
            .get(token)
            .filter(|s| s.is_live_at(now))
            .cloned())
    }

    async fn delete_session_by_token(&self, token: &str) -> StoreResult<bool> {
        Ok(self.lock()?.sessions.remove(token).is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.lock()?;
        let before = state.sessions.len();
        state.sessions.retain(|_, s| s.is_live_at(now));
        Ok((before - state.sessions.len()) as u64)
    }
}

#[async_trait]
impl ClientStore for MemoryStore {
    async fn create_client(&self, client: &ClientApp) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.clients.contains_key(&client.client_id) {
            return Err(StoreError::Conflict("client"));
        }
        state.clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, id: Uuid) -> StoreResult<ClientApp> {
        self.lock()?
            .clients
            .values()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(StoreError::NotFound("client"))
    }

    async fn find_client_by_client_id(&self, client_id: &str) -> StoreResult<Option<ClientApp>> {
        Ok(self.lock()?.clients.get(client_id).cloned())
    }

    async fn list_clients_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<ClientApp>> {
        let state = self.lock()?;
        let mut clients: Vec<ClientApp> = state
            .clients
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        clients.sort_by_key(|c| c.created_at);
        Ok(clients)
    }

    async fn update_client(&self, client: &ClientApp) -> StoreResult<()> {
        let mut state = self.lock()?;
        let existing = state
            .clients
            .get_mut(&client.client_id)
            .ok_or(StoreError::NotFound("client"))?;
        existing.client_secret_hash = client.client_secret_hash.clone();
        existing.name = client.name.clone();
        existing.redirect_uris = client.redirect_uris.clone();
        existing.updated_at = client.updated_at;
        Ok(())
    }

    async fn delete_client(&self, client_id: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        state
            .clients
            .remove(client_id)
            .ok_or(StoreError::NotFound("client"))?;
        state.auth_codes.retain(|_, c| c.client_id != client_id);
        state.tokens.retain(|_, t| t.client_id != client_id);
        Ok(())
    }
}

#[async_trait]
impl AuthCodeStore for MemoryStore {
    async fn create_auth_code(&self, code: &AuthCode) -> StoreResult<()> {
        let mut state = self.lock()?;
        if state.auth_codes.contains_key(&code.code) {
            return Err(StoreError::Conflict("authorization code"));
        }
        state.auth_codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn find_auth_code(&self, code: &str) -> StoreResult<Option<AuthCode>> {
        Ok(self.lock()?.auth_codes.get(code).cloned())
    }

    async fn mark_auth_code_used(&self, code: &str) -> StoreResult<bool> {
        let mut state = self.lock()?;
        match state.auth_codes.get_mut(code) {
            Some(auth_code) if !auth_code.used => {
                auth_code.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_auth_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.lock()?;
        let before = state.auth_codes.len();
        state.auth_codes.retain(|_, c| now < c.expires_at);
        Ok((before - state.auth_codes.len()) as u64)
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn create_tokens(&self, tokens: &[Token]) -> StoreResult<()> {
        let mut state = self.lock()?;
        if tokens.iter().any(|t| state.tokens.contains_key(&t.token)) {
            return Err(StoreError::Conflict("token"));
        }
        for token in tokens {
            state.tokens.insert(token.token.clone(), token.clone());
        }
        Ok(())
    }

    async fn find_token(&self, token: &str) -> StoreResult<Option<Token>> {
        Ok(self.lock()?.tokens.get(token).cloned())
    }

    async fn revoke_token(&self, token: &str) -> StoreResult<bool> {
        let mut state = self.lock()?;
        match state.tokens.get_mut(token) {
            Some(t) if !t.revoked => {
                t.revoked = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut state = self.lock()?;
        let before = state.tokens.len();
        state.tokens.retain(|_, t| now < t.expires_at);
        Ok((before - state.tokens.len()) as u64)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn save_profile(&self, profile: &Profile) -> StoreResult<()> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&profile.user_id) {
            return Err(StoreError::NotFound("user"));
        }
        state.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn find_profile_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.lock()?.profiles.get(&user_id).cloned())
    }

    async fn find_profiles_by_user_ids(&self, user_ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        let state = self.lock()?;
        Ok(user_ids
            .iter()
            .filter_map(|id| state.profiles.get(id).cloned())
            .collect())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}
