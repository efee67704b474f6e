//! PostgreSQL credential store (sqlx).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use uuid::Uuid;

use super::{
    AuthCodeStore, ClientStore, CredentialStore, ProfileStore, SessionStore, StoreError,
    StoreResult, TokenStore, UserStore,
};
use crate::models::{AuthCode, ClientApp, Profile, Session, Token, User};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map unique-constraint violations to `Conflict`, everything else to `Database`.
fn insert_error(entity: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(entity),
        _ => StoreError::Database(e),
    }
}

fn require_row(entity: &'static str, rows_affected: u64) -> StoreResult<()> {
    if rows_affected == 0 {
        return Err(StoreError::NotFound(entity));
    }
    Ok(())
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, discord_id, username, display_name, avatar_url, guild_nickname,
                               guild_roles, joined_at, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id)
        .bind(&user.discord_id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.guild_nickname)
        .bind(&user.guild_roles)
        .bind(user.joined_at)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error("user"))?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("user"))
    }

    async fn find_user_by_discord_id(&self, discord_id: &str) -> StoreResult<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE discord_id = $1")
                .bind(discord_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET username = $2, display_name = $3, avatar_url = $4, guild_nickname = $5,
                guild_roles = $6, joined_at = $7, last_login_at = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.guild_nickname)
        .bind(&user.guild_roles)
        .bind(user.joined_at)
        .bind(user.last_login_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        require_row("user", result.rows_affected())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        require_row("user", result.rows_affected())
    }

    async fn list_users(&self, limit: i64, offset: i64) -> StoreResult<Vec<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY username ASC, id ASC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO sessions (id, user_id, token, expires_at, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error("session"))?;
        Ok(())
    }

    async fn find_session_by_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Session>> {
        Ok(sqlx::query_as::<_, Session>(
            "SELECT * FROM sessions WHERE token = $1 AND expires_at > $2",
        )
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_session_by_token(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ClientStore for PgStore {
    async fn create_client(&self, client: &ClientApp) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO client_apps (id, owner_id, client_id, client_secret_hash, name,
                                     redirect_uris, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(client.id)
        .bind(client.owner_id)
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.name)
        .bind(&client.redirect_uris)
        .bind(client.created_at)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error("client"))?;
        Ok(())
    }

    async fn get_client(&self, id: Uuid) -> StoreResult<ClientApp> {
        sqlx::query_as::<_, ClientApp>("SELECT * FROM client_apps WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound("client"))
    }

    async fn find_client_by_client_id(&self, client_id: &str) -> StoreResult<Option<ClientApp>> {
        Ok(
            sqlx::query_as::<_, ClientApp>("SELECT * FROM client_apps WHERE client_id = $1")
                .bind(client_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_clients_by_owner(&self, owner_id: Uuid) -> StoreResult<Vec<ClientApp>> {
        Ok(sqlx::query_as::<_, ClientApp>(
            "SELECT * FROM client_apps WHERE owner_id = $1 ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_client(&self, client: &ClientApp) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE client_apps
            SET client_secret_hash = $2, name = $3, redirect_uris = $4, updated_at = $5
            WHERE client_id = $1
            "#,
        )
        .bind(&client.client_id)
        .bind(&client.client_secret_hash)
        .bind(&client.name)
        .bind(&client.redirect_uris)
        .bind(client.updated_at)
        .execute(&self.pool)
        .await?;
        require_row("client", result.rows_affected())
    }

    async fn delete_client(&self, client_id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM client_apps WHERE client_id = $1")
            .bind(client_id)
            .execute(&self.pool)
            .await?;
        require_row("client", result.rows_affected())
    }
}

#[async_trait]
impl AuthCodeStore for PgStore {
    async fn create_auth_code(&self, code: &AuthCode) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_codes (id, code, client_id, user_id, redirect_uri, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(code.id)
        .bind(&code.code)
        .bind(&code.client_id)
        .bind(code.user_id)
        .bind(&code.redirect_uri)
        .bind(code.expires_at)
        .bind(code.used)
        .bind(code.created_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error("authorization code"))?;
        Ok(())
    }

    async fn find_auth_code(&self, code: &str) -> StoreResult<Option<AuthCode>> {
        Ok(
            sqlx::query_as::<_, AuthCode>("SELECT * FROM auth_codes WHERE code = $1")
                .bind(code)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn mark_auth_code_used(&self, code: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE auth_codes SET used = TRUE WHERE code = $1 AND used = FALSE")
                .bind(code)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_auth_codes(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM auth_codes WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn create_tokens(&self, tokens: &[Token]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for token in tokens {
            sqlx::query(
                r#"
                INSERT INTO tokens (id, token, token_type, user_id, client_id, expires_at, revoked, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(token.id)
            .bind(&token.token)
            .bind(token.token_type.as_str())
            .bind(token.user_id)
            .bind(&token.client_id)
            .bind(token.expires_at)
            .bind(token.revoked)
            .bind(token.created_at)
            .execute(&mut *tx)
            .await
            .map_err(insert_error("token"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_token(&self, token: &str) -> StoreResult<Option<Token>> {
        Ok(
            sqlx::query_as::<_, Token>("SELECT * FROM tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn revoke_token(&self, token: &str) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE tokens SET revoked = TRUE WHERE token = $1 AND revoked = FALSE")
                .bind(token)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProfileStore for PgStore {
    async fn save_profile(&self, profile: &Profile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, user_id, discord_message_id, real_name, student_id, hobbies,
                                  what_to_do, comment, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE
            SET discord_message_id = EXCLUDED.discord_message_id,
                real_name = EXCLUDED.real_name,
                student_id = EXCLUDED.student_id,
                hobbies = EXCLUDED.hobbies,
                what_to_do = EXCLUDED.what_to_do,
                comment = EXCLUDED.comment,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.id)
        .bind(profile.user_id)
        .bind(&profile.discord_message_id)
        .bind(&profile.real_name)
        .bind(&profile.student_id)
        .bind(&profile.hobbies)
        .bind(&profile.what_to_do)
        .bind(&profile.comment)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(insert_error("profile"))?;
        Ok(())
    }

    async fn find_profile_by_user_id(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_profiles_by_user_ids(&self, user_ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(
            sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = ANY($1)")
                .bind(user_ids)
                .fetch_all(&self.pool)
                .await?,
        )
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        crate::db::health_check(&self.pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            StoreError::Database(e)
        })
    }
}
