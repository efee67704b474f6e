pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use chrono::Duration;
use metrics_exporter_prometheus::PrometheusHandle;
use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use service_core::middleware::{
    https::https_redirect_middleware,
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::config::GuildAuthConfig;
use crate::services::{
    AuthService, ClientService, DiscordGateway, JwtService, MemberService, OAuth2Service,
    SessionService,
};
use crate::store::CredentialStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::auth::login,
        handlers::auth::callback,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::jwt::issue_token,
        handlers::jwt::refresh_token,
        handlers::jwt::verify,
        handlers::jwt::user,
        handlers::members::list_members,
        handlers::clients::create_client,
        handlers::clients::list_clients,
        handlers::clients::update_client,
        handlers::clients::delete_client,
        handlers::oauth::authorize,
        handlers::oauth::token,
        handlers::oauth::revoke,
        handlers::oauth::userinfo,
        handlers::oauth::user_by_id,
        handlers::oauth::members,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::jwt::JwtResponse,
            dtos::jwt::VerifyResponse,
            dtos::oauth::TokenForm,
            dtos::oauth::TokenResponse,
            dtos::oauth::RevokeForm,
            dtos::client::CreateClientRequest,
            dtos::client::UpdateClientRequest,
            dtos::client::ClientResponse,
            dtos::client::ClientWithSecretResponse,
            dtos::client::ClientListResponse,
            dtos::member::ProfileResponse,
            dtos::member::UserWithProfile,
            dtos::member::MembersResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Discord login and first-party sessions"),
        (name = "User", description = "Signed-in member endpoints"),
        (name = "Clients", description = "OAuth2 client self-service"),
        (name = "OAuth2", description = "Authorization server and bearer-protected resources"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GuildAuthConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub auth_service: AuthService,
    pub session_service: SessionService,
    pub client_service: ClientService,
    pub oauth2_service: OAuth2Service,
    pub member_service: MemberService,
    pub jwt_service: JwtService,
    pub metrics: Option<PrometheusHandle>,
    pub token_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service onto one store and Discord gateway.
    pub fn new(
        config: GuildAuthConfig,
        store: Arc<dyn CredentialStore>,
        discord: Arc<dyn DiscordGateway>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let session_service =
            SessionService::new(store.clone(), Duration::days(config.session.ttl_days));
        let auth_service = AuthService::new(
            store.clone(),
            discord,
            session_service.clone(),
            config.discord.guild_id.clone(),
        );
        let client_service = ClientService::new(store.clone());
        let oauth2_service =
            OAuth2Service::new(store.clone(), client_service.clone(), &config.oauth2);
        let member_service = MemberService::new(store.clone());
        let jwt_service = JwtService::new(&config.jwt);

        let token_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.token_attempts,
            config.rate_limit.token_window_seconds,
        );
        let ip_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.global_ip_limit,
            config.rate_limit.global_ip_window_seconds,
        );

        Self {
            config: Arc::new(config),
            store,
            auth_service,
            session_service,
            client_service,
            oauth2_service,
            member_service,
            jwt_service,
            metrics,
            token_rate_limiter,
            ip_rate_limiter,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    // Wildcard origins cannot be combined with credentials
    if allowed_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(AllowOrigin::any());
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Ignoring invalid CORS origin '{}': {}", o, e);
                None
            }
        })
        .collect();

    layer.allow_origin(origins).allow_credentials(true)
}

pub fn build_router(state: AppState) -> Router {
    let token_routes = Router::new()
        .route("/oauth/token", post(handlers::oauth::token))
        .route("/oauth/revoke", post(handlers::oauth::revoke))
        .layer(from_fn_with_state(
            state.token_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let session_routes = Router::new()
        .route("/api/me", get(handlers::auth::me))
        .route("/api/members", get(handlers::members::list_members))
        .route(
            "/api/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/api/clients/:client_id",
            patch(handlers::clients::update_client).delete(handlers::clients::delete_client),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::session_auth_middleware,
        ));

    let jwt_routes = Router::new()
        .route("/api/verify", get(handlers::jwt::verify))
        .route("/api/user", get(handlers::jwt::user))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::jwt_auth_middleware,
        ));

    let bearer_routes = Router::new()
        .route("/oauth/userinfo", get(handlers::oauth::userinfo))
        .route("/oauth/users/:id", get(handlers::oauth::user_by_id))
        .route("/oauth/members", get(handlers::oauth::members))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::bearer_auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { service_core::axum::Json(ApiDoc::openapi()) }),
        )
        .route("/auth/login", get(handlers::auth::login))
        .route("/auth/callback", get(handlers::auth::callback))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/token", post(handlers::jwt::issue_token))
        .route("/token/refresh", post(handlers::jwt::refresh_token))
        .route("/oauth/authorize", get(handlers::oauth::authorize))
        .merge(token_routes)
        .merge(session_routes)
        .merge(jwt_routes)
        .merge(bearer_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
        .layer(from_fn_with_state(
            state.config.security.https_only,
            https_redirect_middleware,
        ))
}
