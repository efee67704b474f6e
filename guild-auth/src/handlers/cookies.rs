//! Cookie construction shared by the login and authorize handlers.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::config::GuildAuthConfig;

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
pub const POST_LOGIN_REDIRECT_COOKIE: &str = "redirect_uri";

/// Lifetime of the state and post-login redirect cookies.
pub const TRANSIENT_COOKIE_TTL: Duration = Duration::minutes(10);

/// HTTPS either directly or behind a TLS-terminating proxy.
pub fn is_https(config: &GuildAuthConfig, headers: &HeaderMap) -> bool {
    config.security.https_only
        || headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("https"))
}

pub fn http_only(name: &str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .build()
}

/// Removal stub; the path must match the one the cookie was set with.
pub fn removal(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), String::new())).path("/").build()
}
