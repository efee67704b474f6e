mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{
    body_json, cookie_header, cookie_value, location, session_cookie, set_cookie_line, TestApp,
};
use guild_auth::services::{MockAccount, MockFailure};

fn assert_handshake_cookies_cleared<B>(res: &axum::http::Response<B>) {
    for name in ["oauth_state", "redirect_uri"] {
        let line = set_cookie_line(res, name).unwrap_or_else(|| panic!("{} not cleared", name));
        assert!(line.contains("Max-Age=0"), "{} not expired: {}", name, line);
        assert!(cookie_value(res, name).is_none());
    }
}

#[tokio::test]
async fn test_login_redirects_to_discord_with_state_cookie() {
    let app = TestApp::spawn();

    let res = app.get("/auth/login", None).await;

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    let state = cookie_value(&res, "oauth_state").expect("state cookie");
    let target = location(&res);
    assert!(target.starts_with("https://discord.test/oauth2/authorize"));
    assert!(target.contains(&format!("state={}", state)));

    let line = set_cookie_line(&res, "oauth_state").unwrap();
    assert!(line.contains("HttpOnly"));
    assert!(line.contains("SameSite=Lax"));
    assert!(line.contains("Path=/"));
}

#[tokio::test]
async fn test_login_states_are_unique() {
    let app = TestApp::spawn();

    let first = cookie_value(&app.get("/auth/login", None).await, "oauth_state").unwrap();
    let second = cookie_value(&app.get("/auth/login", None).await, "oauth_state").unwrap();

    assert_ne!(first, second);
}

#[tokio::test]
async fn test_callback_creates_session_and_redirects_to_default() {
    let app = TestApp::spawn();
    app.discord
        .register_code("good", MockAccount::member("1001", "alice"))
        .unwrap();

    let res = app.complete_discord_login("good", None, None).await;

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "https://app.test/home");
    let line = set_cookie_line(&res, "session_token").unwrap();
    assert!(line.contains("HttpOnly"));
    assert!(line.contains("Max-Age=604800"));
    assert_eq!(app.store.user_count().unwrap(), 1);
    assert_eq!(app.store.session_count().unwrap(), 1);

    let token = cookie_value(&res, "session_token").unwrap();
    let me = body_json(app.get_json("/api/me", &token).await).await;
    assert_eq!(me["discord_id"], "1001");
    assert_eq!(me["username"], "alice");
}

#[tokio::test]
async fn test_callback_honours_relative_redirect() {
    let app = TestApp::spawn();
    app.discord
        .register_code("good", MockAccount::member("1001", "alice"))
        .unwrap();

    let res = app
        .complete_discord_login("good", Some("redirect_uri=%2Fdashboard%3Ftab%3D1"), None)
        .await;

    assert_eq!(location(&res), "/dashboard?tab=1");
}

#[tokio::test]
async fn test_callback_honours_allowed_absolute_redirect() {
    let app = TestApp::spawn();
    app.discord
        .register_code("good", MockAccount::member("1001", "alice"))
        .unwrap();

    let res = app
        .complete_discord_login("good", Some("redirect_uri=https%3A%2F%2Fapp.test%2Fdone"), None)
        .await;

    assert_eq!(location(&res), "https://app.test/done");
}

#[tokio::test]
async fn test_foreign_redirect_falls_back_to_default() {
    let app = TestApp::spawn();

    for candidate in [
        "https%3A%2F%2Fapp.test.evil.com%2Fsteal",
        "https%3A%2F%2Fevil.test",
        "%2F%2Fevil.test",
        "%2F%09%2Fevil.test",
        "%2F%0D%2Fevil.test",
        "%2F%0A%2Fevil.test",
        "%2Fa%0Ab",
    ] {
        let code = format!("code-{}", candidate);
        app.discord
            .register_code(&code, MockAccount::member("1001", "alice"))
            .unwrap();

        let res = app
            .complete_discord_login(&code, Some(&format!("redirect_uri={}", candidate)), None)
            .await;

        assert_eq!(location(&res), "https://app.test/home", "candidate {}", candidate);
    }
}

#[tokio::test]
async fn test_callback_revalidates_stored_redirect_cookie() {
    let app = TestApp::spawn();
    app.discord
        .register_code("good", MockAccount::member("1001", "alice"))
        .unwrap();
    let login = app.get("/auth/login", None).await;
    let state = cookie_value(&login, "oauth_state").unwrap();

    // A redirect cookie planted without going through /auth/login
    let res = app
        .get(
            &format!("/auth/callback?code=good&state={}", state),
            Some(&format!("oauth_state={}; redirect_uri=%2F%09%2Fevil.test", state)),
        )
        .await;

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "https://app.test/home");
}

#[tokio::test]
async fn test_newline_in_redirect_does_not_break_callback() {
    let app = TestApp::spawn();
    app.discord
        .register_code("good", MockAccount::member("1001", "alice"))
        .unwrap();
    let login = app.get("/auth/login", None).await;
    let state = cookie_value(&login, "oauth_state").unwrap();

    let res = app
        .get(
            &format!("/auth/callback?code=good&state={}", state),
            Some(&format!("oauth_state={}; redirect_uri=%2Fa%0Ab", state)),
        )
        .await;

    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), "https://app.test/home");
    assert!(cookie_value(&res, "session_token").is_some());
}

#[tokio::test]
async fn test_callback_rejects_state_mismatch() {
    let app = TestApp::spawn();
    app.discord
        .register_code("good", MockAccount::member("1001", "alice"))
        .unwrap();

    let login = app.get("/auth/login", None).await;
    let cookies = cookie_header(&login);

    let res = app
        .get("/auth/callback?code=good&state=forged", Some(&cookies))
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_handshake_cookies_cleared(&res);
    assert_eq!(body_json(res).await["error"], "state_mismatch");
    assert_eq!(app.store.session_count().unwrap(), 0);
}

#[tokio::test]
async fn test_callback_requires_state_cookie() {
    let app = TestApp::spawn();

    let res = app.get("/auth/callback?code=good&state=abc", None).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_state");
}

#[tokio::test]
async fn test_callback_requires_code() {
    let app = TestApp::spawn();
    let login = app.get("/auth/login", None).await;
    let state = cookie_value(&login, "oauth_state").unwrap();

    let res = app
        .get(
            &format!("/auth/callback?state={}", state),
            Some(&cookie_header(&login)),
        )
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "missing_code");
}

#[tokio::test]
async fn test_callback_surfaces_discord_denial() {
    let app = TestApp::spawn();

    let res = app.get("/auth/callback?error=access_denied", None).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "access_denied");
}

#[tokio::test]
async fn test_non_member_is_forbidden_and_not_stored() {
    let app = TestApp::spawn();
    app.discord
        .register_code("outsider", MockAccount::outsider("2002", "mallory"))
        .unwrap();

    let res = app.complete_discord_login("outsider", None, None).await;

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_handshake_cookies_cleared(&res);
    assert_eq!(body_json(res).await["error"], "not_guild_member");
    assert_eq!(app.store.user_count().unwrap(), 0);
    assert_eq!(app.store.session_count().unwrap(), 0);
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let app = TestApp::spawn();
    app.discord
        .register_code(
            "flaky",
            MockAccount::member("1001", "alice").failing_at(MockFailure::Profile),
        )
        .unwrap();

    let res = app.complete_discord_login("flaky", None, None).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_handshake_cookies_cleared(&res);

    // Unknown upstream codes fail the exchange step
    let res = app.complete_discord_login("never-issued", None, None).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    assert_eq!(app.store.user_count().unwrap(), 0);
}

#[tokio::test]
async fn test_relogin_reuses_user_and_adds_session() {
    let app = TestApp::spawn();

    let first = app.login("1001", "alice").await;
    let second = app.login("1001", "alice-renamed").await;

    assert_ne!(first, second);
    assert_eq!(app.user_id(&first).await, app.user_id(&second).await);
    assert_eq!(app.store.user_count().unwrap(), 1);
    assert_eq!(app.store.session_count().unwrap(), 2);

    let me = body_json(app.get_json("/api/me", &first).await).await;
    assert_eq!(me["username"], "alice-renamed");
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;

    let logout = |cookie: Option<String>| {
        let mut builder = Request::builder().method("POST").uri("/auth/logout");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    };

    let res = app.request(logout(Some(session_cookie(&session)))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert_eq!(app.store.session_count().unwrap(), 0);

    let res = app.get_json("/api/me", &session).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Again with the dead token, then with no cookie at all
    let res = app.request(logout(Some(session_cookie(&session)))).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.request(logout(None)).await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unauthenticated_json_caller_gets_401() {
    let app = TestApp::spawn();

    let res = app.get_json("/api/me", "not-a-session").await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(res).await["error"], "unauthorized");
}

#[tokio::test]
async fn test_unauthenticated_browser_is_sent_to_login() {
    let app = TestApp::spawn();

    let res = app.get("/api/members?limit=5", None).await;

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&res),
        "/auth/login?redirect_uri=%2Fapi%2Fmembers%3Flimit%3D5"
    );
}

#[tokio::test]
async fn test_unauthenticated_delete_gets_401() {
    let app = TestApp::spawn();

    let req = Request::builder()
        .method("DELETE")
        .uri("/api/clients/C1")
        .body(Body::empty())
        .unwrap();
    let res = app.request(req).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
