use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct GuildAuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub discord: DiscordConfig,
    pub session: SessionConfig,
    pub jwt: JwtConfig,
    pub oauth2: OAuth2Config,
    pub reaper: ReaperConfig,
    pub security: SecurityConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub guild_id: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub ttl_days: i64,
    pub cookie_name: String,
}

/// Signing settings for first-party JWTs (HS256).
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: Secret<String>,
    pub ttl_days: i64,
}

/// Shortest accepted HS256 signing secret.
pub const MIN_JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct OAuth2Config {
    pub auth_code_ttl_minutes: i64,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub default_redirect_url: String,
    /// Redirect plain-HTTP requests to HTTPS and always mark cookies `Secure`
    pub https_only: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub token_attempts: u32,
    pub token_window_seconds: u64,
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

impl GuildAuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = GuildAuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("guild-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            discord: DiscordConfig {
                client_id: get_env("DISCORD_CLIENT_ID", None, is_prod)?,
                client_secret: Secret::new(get_env("DISCORD_CLIENT_SECRET", None, is_prod)?),
                redirect_uri: get_env("DISCORD_REDIRECT_URI", None, is_prod)?,
                guild_id: get_env("DISCORD_GUILD_ID", None, is_prod)?,
                api_base_url: get_env(
                    "DISCORD_API_BASE_URL",
                    Some("https://discord.com/api"),
                    is_prod,
                )?,
            },
            session: SessionConfig {
                ttl_days: parse_env("SESSION_TTL_DAYS", "7", is_prod)?,
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("session_token"), is_prod)?,
            },
            jwt: JwtConfig {
                secret: Secret::new(get_env("JWT_SECRET", None, is_prod)?),
                ttl_days: parse_env("JWT_TTL_DAYS", "7", is_prod)?,
            },
            oauth2: OAuth2Config {
                auth_code_ttl_minutes: parse_env("AUTH_CODE_TTL_MINUTES", "10", is_prod)?,
                access_token_ttl_minutes: parse_env("ACCESS_TOKEN_TTL_MINUTES", "60", is_prod)?,
                refresh_token_ttl_days: parse_env("REFRESH_TOKEN_TTL_DAYS", "7", is_prod)?,
            },
            reaper: ReaperConfig {
                interval_seconds: parse_env("REAPER_INTERVAL_SECONDS", "3600", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: split_origins(&get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?),
                default_redirect_url: get_env(
                    "DEFAULT_REDIRECT_URL",
                    Some("http://localhost:3000/auth/callback"),
                    is_prod,
                )?,
                https_only: get_env("HTTPS_ONLY", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
            },
            rate_limit: RateLimitConfig {
                token_attempts: parse_env("RATE_LIMIT_TOKEN_ATTEMPTS", "20", is_prod)?,
                token_window_seconds: parse_env("RATE_LIMIT_TOKEN_WINDOW_SECONDS", "60", is_prod)?,
                global_ip_limit: parse_env("RATE_LIMIT_GLOBAL_IP_LIMIT", "300", is_prod)?,
                global_ip_window_seconds: parse_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    "60",
                    is_prod,
                )?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.session.ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_TTL_DAYS must be positive"
            )));
        }

        if self.jwt.ttl_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_TTL_DAYS must be positive"
            )));
        }

        if self.jwt.secret.expose_secret().len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.oauth2.auth_code_ttl_minutes <= 0
            || self.oauth2.access_token_ttl_minutes <= 0
            || self.oauth2.refresh_token_ttl_days <= 0
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "OAuth2 code and token lifetimes must be positive"
            )));
        }

        if self.reaper.interval_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REAPER_INTERVAL_SECONDS must be positive"
            )));
        }

        if self.environment == Environment::Prod
            && self.security.allowed_origins.iter().any(|o| o == "*")
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Wildcard CORS origin not allowed in production"
            )));
        }

        Ok(())
    }
}

/// Origins may be separated by commas or semicolons.
pub fn split_origins(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_origins_accepts_both_separators() {
        assert_eq!(
            split_origins("https://a.test, https://b.test/;http://localhost:3000;;"),
            vec![
                "https://a.test".to_string(),
                "https://b.test".to_string(),
                "http://localhost:3000".to_string(),
            ]
        );
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert!("staging".parse::<Environment>().is_err());
    }
}
