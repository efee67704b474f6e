use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Error)]
#[error("unknown token type: {0}")]
pub struct UnknownTokenType(String);

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TokenType {
    type Error = UnknownTokenType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "access" => Ok(TokenType::Access),
            "refresh" => Ok(TokenType::Refresh),
            _ => Err(UnknownTokenType(value)),
        }
    }
}

/// Bearer credential issued to a client on behalf of a user.
#[derive(Debug, Clone, FromRow)]
pub struct Token {
    pub id: Uuid,
    pub token: String,
    #[sqlx(try_from = "String")]
    pub token_type: TokenType,
    pub user_id: Uuid,
    pub client_id: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn new(
        token: String,
        token_type: TokenType,
        user_id: Uuid,
        client_id: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            token_type,
            user_id,
            client_id,
            expires_at: now + ttl,
            revoked: false,
            created_at: now,
        }
    }

    /// Valid iff not revoked and strictly before expiry.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }
}
