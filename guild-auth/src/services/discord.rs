//! Discord identity gateway: upstream OAuth2 exchange, profile and guild
//! membership lookups.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, Secret};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::DiscordConfig;

/// Scopes requested from Discord: identity plus guild member lookup.
pub const DISCORD_SCOPES: &str = "identify guilds.members.read";

const AVATAR_CDN_BASE: &str = "https://cdn.discordapp.com/avatars";

#[derive(Debug, Error)]
pub enum DiscordError {
    #[error("Discord request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Discord returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Discord returned an unreadable payload: {0}")]
    Decode(String),

    #[error("Discord gateway unavailable: {0}")]
    Unavailable(String),
}

/// Upstream access token; never logged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamToken {
    pub access_token: Secret<String>,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl UpstreamToken {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token: Secret::new(access_token),
            token_type: "Bearer".to_string(),
            expires_in: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    /// Avatar hash, not a URL
    #[serde(default)]
    pub avatar: Option<String>,
}

impl DiscordUser {
    pub fn avatar_url(&self) -> Option<String> {
        self.avatar
            .as_deref()
            .filter(|hash| !hash.is_empty())
            .map(|hash| format!("{}/{}/{}.png", AVATAR_CDN_BASE, self.id, hash))
    }

    /// Global display name, falling back to the username.
    pub fn display_name(&self) -> String {
        self.global_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.username)
            .to_string()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuildMember {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait DiscordGateway: Send + Sync {
    /// Browser-facing authorize URL carrying `state`.
    fn authorize_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<UpstreamToken, DiscordError>;

    async fn fetch_user(&self, token: &UpstreamToken) -> Result<DiscordUser, DiscordError>;

    /// `Ok(None)` when Discord reports the user is not in the guild.
    async fn fetch_guild_membership(
        &self,
        token: &UpstreamToken,
        guild_id: &str,
    ) -> Result<Option<GuildMember>, DiscordError>;
}

#[derive(Clone)]
pub struct DiscordClient {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordClient {
    pub fn new(config: DiscordConfig) -> Result<Self, DiscordError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn error_for_status(res: reqwest::Response) -> Result<reqwest::Response, DiscordError> {
        if res.status().is_success() {
            return Ok(res);
        }
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        Err(DiscordError::UnexpectedStatus { status, body })
    }

    async fn decode<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, DiscordError> {
        res.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                DiscordError::Decode(e.to_string())
            } else {
                DiscordError::Transport(e)
            }
        })
    }
}

#[async_trait]
impl DiscordGateway for DiscordClient {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.endpoint("/oauth2/authorize"),
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(DISCORD_SCOPES),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<UpstreamToken, DiscordError> {
        let res = self
            .http
            .post(self.endpoint("/oauth2/token"))
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret().as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to exchange Discord code");
                e
            })?;

        Self::decode(Self::error_for_status(res).await?).await
    }

    async fn fetch_user(&self, token: &UpstreamToken) -> Result<DiscordUser, DiscordError> {
        let res = self
            .http
            .get(self.endpoint("/users/@me"))
            .bearer_auth(token.access_token.expose_secret())
            .send()
            .await?;

        Self::decode(Self::error_for_status(res).await?).await
    }

    async fn fetch_guild_membership(
        &self,
        token: &UpstreamToken,
        guild_id: &str,
    ) -> Result<Option<GuildMember>, DiscordError> {
        let res = self
            .http
            .get(self.endpoint(&format!(
                "/users/@me/guilds/{}/member",
                urlencoding::encode(guild_id)
            )))
            .bearer_auth(token.access_token.expose_secret())
            .send()
            .await?;

        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(Self::decode(Self::error_for_status(res).await?).await?))
    }
}
