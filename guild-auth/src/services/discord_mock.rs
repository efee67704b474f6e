//! In-memory [`DiscordGateway`] for tests, keyed by upstream authorization code.

use async_trait::async_trait;
use secrecy::ExposeSecret;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::services::discord::{
    DiscordError, DiscordGateway, DiscordUser, GuildMember, UpstreamToken, DISCORD_SCOPES,
};

/// Step of the upstream handshake a [`MockDiscordGateway`] account fails at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Exchange,
    Profile,
    Membership,
}

#[derive(Debug, Clone)]
pub struct MockAccount {
    pub user: DiscordUser,
    /// `None` models a Discord user outside the guild
    pub membership: Option<GuildMember>,
    pub failure: Option<MockFailure>,
}

impl MockAccount {
    pub fn member(id: &str, username: &str) -> Self {
        Self {
            user: DiscordUser {
                id: id.to_string(),
                username: username.to_string(),
                global_name: None,
                avatar: None,
            },
            membership: Some(GuildMember::default()),
            failure: None,
        }
    }

    pub fn outsider(id: &str, username: &str) -> Self {
        Self {
            membership: None,
            ..Self::member(id, username)
        }
    }

    pub fn failing_at(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[derive(Default)]
pub struct MockDiscordGateway {
    accounts: Mutex<HashMap<String, MockAccount>>,
}

impl MockDiscordGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `code` exchangeable for `account`.
    pub fn register_code(&self, code: &str, account: MockAccount) -> Result<(), anyhow::Error> {
        self.accounts
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock gateway mutex poisoned: {}", e))?
            .insert(code.to_string(), account);
        Ok(())
    }

    fn account_for(&self, code: &str) -> Result<Option<MockAccount>, DiscordError> {
        Ok(self
            .accounts
            .lock()
            .map_err(|e| DiscordError::Unavailable(format!("Mock gateway mutex poisoned: {}", e)))?
            .get(code)
            .cloned())
    }

    fn account_for_token(&self, token: &UpstreamToken) -> Result<MockAccount, DiscordError> {
        let code = token
            .access_token
            .expose_secret()
            .strip_prefix("mock-")
            .unwrap_or_default()
            .to_string();
        self.account_for(&code)?.ok_or(DiscordError::UnexpectedStatus {
            status: 401,
            body: "401: Unauthorized".to_string(),
        })
    }
}

#[async_trait]
impl DiscordGateway for MockDiscordGateway {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://discord.test/oauth2/authorize?response_type=code&scope={}&state={}",
            urlencoding::encode(DISCORD_SCOPES),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<UpstreamToken, DiscordError> {
        match self.account_for(code)? {
            Some(account) if account.failure != Some(MockFailure::Exchange) => {
                Ok(UpstreamToken::bearer(format!("mock-{}", code)))
            }
            _ => Err(DiscordError::UnexpectedStatus {
                status: 400,
                body: r#"{"error": "invalid_grant"}"#.to_string(),
            }),
        }
    }

    async fn fetch_user(&self, token: &UpstreamToken) -> Result<DiscordUser, DiscordError> {
        let account = self.account_for_token(token)?;
        if account.failure == Some(MockFailure::Profile) {
            return Err(DiscordError::UnexpectedStatus {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        Ok(account.user)
    }

    async fn fetch_guild_membership(
        &self,
        token: &UpstreamToken,
        _guild_id: &str,
    ) -> Result<Option<GuildMember>, DiscordError> {
        let account = self.account_for_token(token)?;
        if account.failure == Some(MockFailure::Membership) {
            return Err(DiscordError::UnexpectedStatus {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(account.membership)
    }
}
