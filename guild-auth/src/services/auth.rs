//! Login orchestrator: Discord handshake to local user and session.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::models::{IdentityUpdate, Session, User};
use crate::services::discord::{DiscordGateway, DiscordUser, GuildMember};
use crate::services::{metrics, ServiceError, SessionService};
use crate::store::{CredentialStore, StoreError, UserStore};

/// Result of a completed Discord login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    discord: Arc<dyn DiscordGateway>,
    sessions: SessionService,
    guild_id: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        discord: Arc<dyn DiscordGateway>,
        sessions: SessionService,
        guild_id: String,
    ) -> Self {
        Self {
            store,
            discord,
            sessions,
            guild_id,
        }
    }

    pub fn discord(&self) -> &Arc<dyn DiscordGateway> {
        &self.discord
    }

    /// Exchange a Discord code, verify guild membership, upsert the user and
    /// mint a session. Any upstream failure aborts before anything is written.
    #[tracing::instrument(skip_all)]
    pub async fn complete_login(&self, code: &str) -> Result<LoginOutcome, ServiceError> {
        let result = self.try_complete_login(code).await;
        metrics::record_login(match &result {
            Ok(_) => "success",
            Err(ServiceError::NotGuildMember) => "not_member",
            Err(_) => "failure",
        });
        result
    }

    async fn try_complete_login(&self, code: &str) -> Result<LoginOutcome, ServiceError> {
        let upstream = self
            .discord
            .exchange_code(code)
            .await
            .map_err(ServiceError::UpstreamExchangeFailed)?;

        let discord_user = self
            .discord
            .fetch_user(&upstream)
            .await
            .map_err(ServiceError::UpstreamProfileFetchFailed)?;

        let member = self
            .discord
            .fetch_guild_membership(&upstream, &self.guild_id)
            .await
            .map_err(ServiceError::UpstreamMembershipCheckFailed)?
            .ok_or_else(|| {
                tracing::info!(discord_id = %discord_user.id, "Login rejected: not a guild member");
                ServiceError::NotGuildMember
            })?;

        let user = self
            .upsert_user(&discord_user, &member, Utc::now())
            .await?;
        let session = self.sessions.issue(user.id).await?;

        tracing::info!(user_id = %user.id, discord_id = %user.discord_id, "User logged in via Discord");

        Ok(LoginOutcome { user, session })
    }

    async fn upsert_user(
        &self,
        discord_user: &DiscordUser,
        member: &GuildMember,
        now: DateTime<Utc>,
    ) -> Result<User, ServiceError> {
        let identity = identity_from_discord(discord_user, member);

        if let Some(mut user) = self.store.find_user_by_discord_id(&discord_user.id).await? {
            user.record_login(identity, now);
            self.store.update_user(&user).await?;
            return Ok(user);
        }

        let user = User::new(discord_user.id.clone(), identity.clone(), now);
        match self.store.create_user(&user).await {
            Ok(()) => Ok(user),
            // A concurrent first login won the insert; refresh that row instead
            Err(StoreError::Conflict(_)) => {
                let mut existing = self
                    .store
                    .find_user_by_discord_id(&discord_user.id)
                    .await?
                    .ok_or(ServiceError::UserNotFound)?;
                existing.record_login(identity, now);
                self.store.update_user(&existing).await?;
                Ok(existing)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn resolve_session(&self, token: &str) -> Result<User, ServiceError> {
        self.sessions.resolve(token).await
    }

    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        self.sessions.revoke(token).await
    }
}

fn identity_from_discord(user: &DiscordUser, member: &GuildMember) -> IdentityUpdate {
    IdentityUpdate {
        username: user.username.clone(),
        display_name: Some(user.display_name()),
        avatar_url: user.avatar_url(),
        guild_nickname: member.nick.clone().filter(|nick| !nick.is_empty()),
        guild_roles: member.roles.clone(),
        joined_at: member.joined_at,
    }
}
