//! Shared setup for guild-auth integration tests.
//!
//! Drives the real router with `tower::ServiceExt::oneshot` against the
//! in-memory credential store and a mock Discord gateway.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, Response, StatusCode},
    Router,
};
use guild_auth::{
    build_router,
    config::{
        DatabaseConfig, DiscordConfig, Environment, GuildAuthConfig, JwtConfig, OAuth2Config,
        RateLimitConfig, ReaperConfig, SecurityConfig, SessionConfig,
    },
    services::{MockAccount, MockDiscordGateway, NewClient},
    store::MemoryStore,
    utils::ClientSecret,
    AppState,
};
use reqwest::Url;
use secrecy::Secret;
use std::sync::Arc;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const CLIENT_ID: &str = "C1";
pub const CLIENT_SECRET: &str = "S1";
pub const CLIENT_REDIRECT: &str = "https://app.test/cb";

pub fn test_config() -> GuildAuthConfig {
    GuildAuthConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "guild-auth-test".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 1,
        },
        discord: DiscordConfig {
            client_id: "discord-app".to_string(),
            client_secret: Secret::new("discord-secret".to_string()),
            redirect_uri: "http://localhost:8080/auth/callback".to_string(),
            guild_id: "guild-1".to_string(),
            api_base_url: "https://discord.test/api".to_string(),
        },
        session: SessionConfig {
            ttl_days: 7,
            cookie_name: "session_token".to_string(),
        },
        jwt: JwtConfig {
            secret: Secret::new("test-jwt-secret-that-is-at-least-32-chars".to_string()),
            ttl_days: 7,
        },
        oauth2: OAuth2Config {
            auth_code_ttl_minutes: 10,
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 7,
        },
        reaper: ReaperConfig {
            interval_seconds: 3600,
        },
        security: SecurityConfig {
            allowed_origins: vec!["https://app.test".to_string()],
            default_redirect_url: "https://app.test/home".to_string(),
            https_only: false,
        },
        rate_limit: RateLimitConfig {
            token_attempts: 1000,
            token_window_seconds: 60,
            global_ip_limit: 10_000,
            global_ip_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub discord: Arc<MockDiscordGateway>,
}

impl TestApp {
    pub fn spawn() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: GuildAuthConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let discord = Arc::new(MockDiscordGateway::new());
        let state = AppState::new(config, store.clone(), discord.clone(), None);
        let router = build_router(state.clone());

        TestApp {
            router,
            state,
            store,
            discord,
        }
    }

    pub async fn request(&self, req: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(req)
            .await
            .expect("Router is infallible")
    }

    pub async fn get(&self, uri: &str, cookies: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    /// GET a JSON endpoint with the session cookie.
    pub async fn get_json(&self, uri: &str, session: &str) -> Response<Body> {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, session_cookie(session))
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    pub async fn get_bearer(&self, uri: &str, access_token: &str) -> Response<Body> {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .body(Body::empty())
            .unwrap();
        self.request(req).await
    }

    pub async fn send_json(
        &self,
        method: &str,
        uri: &str,
        session: &str,
        body: serde_json::Value,
    ) -> Response<Body> {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .header(header::COOKIE, session_cookie(session))
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(req).await
    }

    pub async fn post_form(&self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(serde_urlencoded::to_string(fields).unwrap()))
            .unwrap();
        self.request(req).await
    }

    /// Run the browser side of the Discord login and return the session token.
    pub async fn login(&self, discord_id: &str, username: &str) -> String {
        let code = format!("discord-code-{}", discord_id);
        self.discord
            .register_code(&code, MockAccount::member(discord_id, username))
            .unwrap();

        let res = self.complete_discord_login(&code, None, None).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        cookie_value(&res, "session_token").expect("Session cookie not set")
    }

    /// `/auth/login` followed by the Discord callback, carrying cookies across.
    pub async fn complete_discord_login(
        &self,
        discord_code: &str,
        login_query: Option<&str>,
        extra_cookies: Option<&str>,
    ) -> Response<Body> {
        let login_uri = match login_query {
            Some(q) => format!("/auth/login?{}", q),
            None => "/auth/login".to_string(),
        };
        let res = self.get(&login_uri, extra_cookies).await;
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);

        let state = cookie_value(&res, "oauth_state").expect("State cookie not set");
        let cookies = cookie_header(&res);
        self.get(
            &format!(
                "/auth/callback?code={}&state={}",
                urlencoding::encode(discord_code),
                urlencoding::encode(&state)
            ),
            Some(&cookies),
        )
        .await
    }

    pub async fn user_id(&self, session: &str) -> Uuid {
        let res = self.get_json("/api/me", session).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        body["id"].as_str().unwrap().parse().unwrap()
    }

    /// Register the well-known test client owned by `owner`.
    pub async fn register_test_client(&self, owner: Uuid) {
        self.state
            .client_service
            .register(NewClient {
                owner_id: owner,
                client_id: CLIENT_ID.to_string(),
                client_secret: ClientSecret::new(CLIENT_SECRET.to_string()),
                name: "Test App".to_string(),
                redirect_uris: vec![CLIENT_REDIRECT.to_string()],
            })
            .await
            .unwrap();
    }

    /// Authorize the test client for the session's user and return the code.
    pub async fn authorize(&self, session: &str, state: &str) -> String {
        let res = self
            .get(
                &format!(
                    "/oauth/authorize?response_type=code&client_id={}&redirect_uri={}&state={}",
                    CLIENT_ID,
                    urlencoding::encode(CLIENT_REDIRECT),
                    state
                ),
                Some(&session_cookie(session)),
            )
            .await;
        assert_eq!(res.status(), StatusCode::SEE_OTHER);

        let location = Url::parse(&location(&res)).unwrap();
        location
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
            .expect("No code in redirect")
    }

    pub async fn exchange(&self, code: &str, secret: &str) -> Response<Body> {
        self.post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", CLIENT_ID),
                ("client_secret", secret),
                ("redirect_uri", CLIENT_REDIRECT),
            ],
        )
        .await
    }

    /// Full grant: login, client registration, authorize and exchange.
    /// Returns `(session, token response body)`.
    pub async fn issue_tokens(&self) -> (String, serde_json::Value) {
        let session = self.login("1001", "alice").await;
        let owner = self.user_id(&session).await;
        self.register_test_client(owner).await;

        let code = self.authorize(&session, "xyz").await;
        let res = self.exchange(&code, CLIENT_SECRET).await;
        assert_eq!(res.status(), StatusCode::OK);
        (session, body_json(res).await)
    }
}

pub fn session_cookie(token: &str) -> String {
    format!("session_token={}", token)
}

/// `(name, raw value)` for every `Set-Cookie` header.
pub fn set_cookies<B>(res: &Response<B>) -> Vec<(String, String)> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| {
            let pair = v.split(';').next()?;
            let (name, value) = pair.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// Raw `Set-Cookie` header line for `name`, attributes included.
pub fn set_cookie_line<B>(res: &Response<B>, name: &str) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(&format!("{}=", name)))
        .map(str::to_string)
}

pub fn cookie_value<B>(res: &Response<B>, name: &str) -> Option<String> {
    set_cookies(res)
        .into_iter()
        .find(|(n, v)| n == name && !v.is_empty())
        .map(|(_, v)| v)
}

/// Echo every non-empty `Set-Cookie` back as a `Cookie` header.
pub fn cookie_header<B>(res: &Response<B>) -> String {
    set_cookies(res)
        .into_iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(n, v)| format!("{}={}", n, v))
        .collect::<Vec<_>>()
        .join("; ")
}

pub fn location<B>(res: &Response<B>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("No Location header")
        .to_string()
}

pub async fn body_json(res: Response<Body>) -> serde_json::Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
