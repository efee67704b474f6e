mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::TestApp;
use guild_auth::{models::Session, services::SessionReaper, store::SessionStore};

#[tokio::test]
async fn test_expired_session_is_rejected_and_reaped() {
    let app = TestApp::spawn();
    let live = app.login("1001", "alice").await;
    let user_id = app.user_id(&live).await;

    let expired = Session::new(
        user_id,
        "expired-token".to_string(),
        Duration::hours(1),
        Utc::now() - Duration::hours(2),
    );
    app.store.create_session(&expired).await.unwrap();

    let res = app.get_json("/api/me", "expired-token").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let report = SessionReaper::new(app.store.clone(), std::time::Duration::from_secs(60))
        .sweep()
        .await;
    assert_eq!(report.sessions, 1);
    assert_eq!(report.failures, 0);
    assert_eq!(app.store.session_count().unwrap(), 1);

    assert_eq!(app.get_json("/api/me", &live).await.status(), StatusCode::OK);
}
