use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle of an authorization code. `Used` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthCodeState {
    Issued,
    Used,
    Expired,
}

/// Single-use code bound to `(client_id, user_id, redirect_uri)`.
#[derive(Debug, Clone, FromRow)]
pub struct AuthCode {
    pub id: Uuid,
    pub code: String,
    pub client_id: String,
    pub user_id: Uuid,
    pub redirect_uri: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl AuthCode {
    pub fn new(
        code: String,
        client_id: String,
        user_id: Uuid,
        redirect_uri: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            code,
            client_id,
            user_id,
            redirect_uri,
            expires_at: now + ttl,
            used: false,
            created_at: now,
        }
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> AuthCodeState {
        if self.used {
            AuthCodeState::Used
        } else if now >= self.expires_at {
            AuthCodeState::Expired
        } else {
            AuthCodeState::Issued
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == AuthCodeState::Issued
    }
}
