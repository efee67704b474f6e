mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{
    body_json, cookie_header, location, session_cookie, TestApp, CLIENT_ID, CLIENT_REDIRECT,
    CLIENT_SECRET,
};
use guild_auth::services::MockAccount;
use reqwest::Url;

fn query_param(url: &str, name: &str) -> Option<String> {
    Url::parse(url)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn test_authorization_code_flow() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    let owner = app.user_id(&session).await;
    app.register_test_client(owner).await;

    let res = app
        .get(
            "/oauth/authorize?response_type=code&client_id=C1&redirect_uri=https%3A%2F%2Fapp.test%2Fcb&state=xyz",
            Some(&session_cookie(&session)),
        )
        .await;

    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let target = location(&res);
    assert!(target.starts_with(CLIENT_REDIRECT));
    assert_eq!(query_param(&target, "state").as_deref(), Some("xyz"));
    let code = query_param(&target, "code").expect("code");

    let res = app.exchange(&code, CLIENT_SECRET).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()[header::CACHE_CONTROL], "no-store");
    assert_eq!(res.headers()[header::PRAGMA], "no-cache");

    let body = body_json(res).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    let access = body["access_token"].as_str().unwrap();
    let refresh = body["refresh_token"].as_str().unwrap();
    assert_ne!(access, refresh);
    assert_eq!(app.store.token_count().unwrap(), 2);

    let me = body_json(app.get_bearer("/oauth/userinfo", access).await).await;
    assert_eq!(me["id"], owner.to_string());
}

#[tokio::test]
async fn test_state_is_omitted_when_not_supplied() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;

    let res = app
        .get(
            "/oauth/authorize?response_type=code&client_id=C1&redirect_uri=https%3A%2F%2Fapp.test%2Fcb",
            Some(&session_cookie(&session)),
        )
        .await;

    let target = location(&res);
    assert!(query_param(&target, "code").is_some());
    assert!(query_param(&target, "state").is_none());
}

#[tokio::test]
async fn test_code_replay_is_rejected() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;
    let code = app.authorize(&session, "xyz").await;

    assert_eq!(app.exchange(&code, CLIENT_SECRET).await.status(), StatusCode::OK);

    let res = app.exchange(&code, CLIENT_SECRET).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_grant");
    assert_eq!(app.store.token_count().unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_exchanges_issue_tokens_once() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;
    let code = app.authorize(&session, "xyz").await;

    let (a, b, c) = futures::join!(
        app.exchange(&code, CLIENT_SECRET),
        app.exchange(&code, CLIENT_SECRET),
        app.exchange(&code, CLIENT_SECRET),
    );

    let successes = [a.status(), b.status(), c.status()]
        .into_iter()
        .filter(|s| *s == StatusCode::OK)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(app.store.token_count().unwrap(), 2);
}

#[tokio::test]
async fn test_wrong_secret_leaves_code_usable() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;
    let code = app.authorize(&session, "xyz").await;

    let res = app.exchange(&code, "wrong").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
    assert_eq!(body_json(res).await["error"], "invalid_client");

    assert_eq!(app.exchange(&code, CLIENT_SECRET).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_redirect_uri_must_match_code() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;
    let code = app.authorize(&session, "xyz").await;

    let res = app
        .post_form(
            "/oauth/token",
            &[
                ("grant_type", "authorization_code"),
                ("code", &code),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
                ("redirect_uri", "https://app.test/other"),
            ],
        )
        .await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_unknown_code_is_invalid_grant() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;

    let res = app.exchange("made-up", CLIENT_SECRET).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_token_request_validation() {
    let app = TestApp::spawn();

    let res = app
        .post_form(
            "/oauth/token",
            &[("grant_type", "authorization_code"), ("code", "abc")],
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_request");

    let res = app
        .post_form(
            "/oauth/token",
            &[
                ("grant_type", "client_credentials"),
                ("code", "abc"),
                ("client_id", CLIENT_ID),
                ("client_secret", CLIENT_SECRET),
            ],
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "unsupported_grant_type");

    let req = Request::builder()
        .method("POST")
        .uri("/oauth/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"grant_type":"authorization_code"}"#))
        .unwrap();
    let res = app.request(req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_request");
}

#[tokio::test]
async fn test_authorize_validation_errors() {
    let app = TestApp::spawn();
    let session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&session).await).await;
    let cookie = session_cookie(&session);

    let res = app
        .get("/oauth/authorize?client_id=C1", Some(&cookie))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_request");

    let res = app
        .get(
            "/oauth/authorize?response_type=token&client_id=C1&redirect_uri=https%3A%2F%2Fapp.test%2Fcb",
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "unsupported_response_type");

    let res = app
        .get(
            "/oauth/authorize?response_type=code&client_id=ghost&redirect_uri=https%3A%2F%2Fapp.test%2Fcb",
            Some(&cookie),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Prefix lookalikes of the registered URI never receive a code
    for redirect in [
        "https%3A%2F%2Fapp.test%2Fcb.evil.com",
        "https%3A%2F%2Fapp.test%2Fcbx",
        "https%3A%2F%2Fevil.test%2Fcb",
    ] {
        let res = app
            .get(
                &format!(
                    "/oauth/authorize?response_type=code&client_id=C1&redirect_uri={}",
                    redirect
                ),
                Some(&cookie),
            )
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "redirect {}", redirect);
        assert!(res.headers().get(header::LOCATION).is_none());
    }

    assert_eq!(app.store.auth_code_count().unwrap(), 0);
}

#[tokio::test]
async fn test_authorize_without_session_resumes_after_login() {
    let app = TestApp::spawn();
    let owner_session = app.login("1001", "alice").await;
    app.register_test_client(app.user_id(&owner_session).await).await;

    let authorize_uri =
        "/oauth/authorize?response_type=code&client_id=C1&redirect_uri=https%3A%2F%2Fapp.test%2Fcb&state=s1";
    let res = app.get(authorize_uri, None).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&res), "/auth/login");

    app.discord
        .register_code("bob-code", MockAccount::member("3003", "bob"))
        .unwrap();
    let pending = cookie_header(&res);
    let res = app
        .complete_discord_login("bob-code", None, Some(&pending))
        .await;
    assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&res), authorize_uri);

    let bob = common::cookie_value(&res, "session_token").unwrap();
    let res = app.get(authorize_uri, Some(&session_cookie(&bob))).await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    let target = location(&res);
    assert_eq!(query_param(&target, "state").as_deref(), Some("s1"));

    let code = query_param(&target, "code").unwrap();
    let tokens = body_json(app.exchange(&code, CLIENT_SECRET).await).await;
    let me = body_json(
        app.get_bearer("/oauth/userinfo", tokens["access_token"].as_str().unwrap())
            .await,
    )
    .await;
    assert_eq!(me["discord_id"], "3003");
}

#[tokio::test]
async fn test_revoke_requires_owning_client() {
    let app = TestApp::spawn();
    let (_, tokens) = app.issue_tokens().await;
    let access = tokens["access_token"].as_str().unwrap();

    let res = app
        .post_form(
            "/oauth/revoke",
            &[("token", access), ("client_id", CLIENT_ID), ("client_secret", "wrong")],
        )
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.get_bearer("/oauth/userinfo", access).await.status(), StatusCode::OK);

    let res = app
        .post_form(
            "/oauth/revoke",
            &[("token", access), ("client_id", CLIENT_ID), ("client_secret", CLIENT_SECRET)],
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        app.get_bearer("/oauth/userinfo", access).await.status(),
        StatusCode::UNAUTHORIZED
    );

    // Unknown tokens are accepted silently
    let res = app
        .post_form(
            "/oauth/revoke",
            &[("token", "nope"), ("client_id", CLIENT_ID), ("client_secret", CLIENT_SECRET)],
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
}
