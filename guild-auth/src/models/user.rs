use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A guild member known to this service.
///
/// Rows are created and refreshed by the login handshake only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub discord_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Guild-specific nickname, if the member set one
    pub guild_nickname: Option<String>,
    pub guild_roles: Vec<String>,
    pub joined_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Mutable identity fields refreshed from Discord on every login.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityUpdate {
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub guild_nickname: Option<String>,
    pub guild_roles: Vec<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl User {
    /// Build a first-login record for a Discord account.
    pub fn new(discord_id: String, identity: IdentityUpdate, now: DateTime<Utc>) -> Self {
        let mut user = Self {
            id: Uuid::new_v4(),
            discord_id,
            username: String::new(),
            display_name: None,
            avatar_url: None,
            guild_nickname: None,
            guild_roles: Vec::new(),
            joined_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        user.record_login(identity, now);
        user
    }

    /// Overwrite display fields and stamp the login time.
    pub fn record_login(&mut self, identity: IdentityUpdate, now: DateTime<Utc>) {
        self.username = identity.username;
        self.display_name = identity.display_name;
        self.avatar_url = identity.avatar_url;
        self.guild_nickname = identity.guild_nickname;
        self.guild_roles = identity.guild_roles;
        self.joined_at = identity.joined_at;
        self.last_login_at = Some(now);
        self.updated_at = now;
    }
}
