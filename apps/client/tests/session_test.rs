mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{mint_token, start_server, PASSWORD};
use pawsitive_client::auth::{MemoryTokenStore, TokenStore};
use pawsitive_client::error::ClientError;
use pawsitive_client::models::Registration;
use pawsitive_client::App;

#[tokio::test]
async fn login_persists_token_and_publishes_session() {
    let server = start_server().await;
    server.backend.embed_user_on_login.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryTokenStore::new());
    let app = App::with_store(server.config(), store.clone()).unwrap();
    let mut sessions = app.sessions.subscribe();

    let session = app.sessions.login("daisy@example.com", PASSWORD).await.unwrap();

    assert_eq!(session.user_id, "u1");
    assert_eq!(session.display_name, "daisy the dog");
    assert!(sessions.has_changed().unwrap());
    assert_eq!(sessions.borrow_and_update().as_ref(), Some(&session));
    assert_eq!(store.load().await.unwrap().as_deref(), Some(session.token.as_str()));
    // Embedded user, no profile round trip.
    assert_eq!(server.backend.hits("GET /user/u1"), 0);
}

#[tokio::test]
async fn login_fetches_profile_when_response_has_no_user() {
    let server = start_server().await;
    let app = server.app();

    let session = app.sessions.login("rex@example.com", PASSWORD).await.unwrap();

    assert_eq!(session.user_id, "u2");
    assert_eq!(session.display_name, "rex the dog");
    assert_eq!(server.backend.hits("GET /user/u2"), 1);
}

#[tokio::test]
async fn login_falls_back_to_token_claims_when_profile_is_unavailable() {
    let server = start_server().await;
    server.backend.fail_profile.store(true, Ordering::SeqCst);
    let store = Arc::new(MemoryTokenStore::new());
    let app = App::with_store(server.config(), store.clone()).unwrap();

    let session = app.sessions.login("rex@example.com", PASSWORD).await.unwrap();

    assert_eq!(session.user_id, "u2");
    assert_eq!(session.display_name, "rex");
    assert!(session.avatar.is_none());
    assert!(app.sessions.is_authenticated());
    assert_eq!(store.load().await.unwrap().as_deref(), Some(session.token.as_str()));
    assert_eq!(server.backend.hits("GET /user/u2"), 1);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let server = start_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let app = App::with_store(server.config(), store.clone()).unwrap();

    let err = app.sessions.login("daisy@example.com", "nope").await.unwrap_err();

    assert!(matches!(err, ClientError::InvalidCredentials));
    assert!(!app.sessions.is_authenticated());
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn resume_restores_a_valid_token() {
    let server = start_server().await;
    let token = server.backend.issue("u2");
    let app = App::with_store(server.config(), Arc::new(MemoryTokenStore::with_token(token))).unwrap();

    let session = app.sessions.resume().await.unwrap().unwrap();

    assert_eq!(session.user_id, "u2");
    assert!(app.sessions.is_authenticated());
}

#[tokio::test]
async fn resume_with_expired_token_clears_it_without_a_request() {
    let server = start_server().await;
    let expired = mint_token("u1", "daisy", chrono::Duration::hours(-1));
    let store = Arc::new(MemoryTokenStore::with_token(expired));
    let app = App::with_store(server.config(), store.clone()).unwrap();

    assert!(app.sessions.resume().await.unwrap().is_none());

    assert!(store.load().await.unwrap().is_none());
    assert!(server.backend.requests.lock().is_empty());
}

#[tokio::test]
async fn resume_with_revoked_token_clears_it() {
    let server = start_server().await;
    // Well-formed and unexpired, but the server never issued it.
    let revoked = mint_token("u1", "daisy", chrono::Duration::hours(1));
    let store = Arc::new(MemoryTokenStore::with_token(revoked));
    let app = App::with_store(server.config(), store.clone()).unwrap();

    assert!(app.sessions.resume().await.unwrap().is_none());

    assert!(!app.sessions.is_authenticated());
    assert!(store.load().await.unwrap().is_none());
    assert_eq!(server.backend.hits("GET /user/u1"), 1);
}

#[tokio::test]
async fn logout_clears_local_state_and_notifies_server() {
    let server = start_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let app = App::with_store(server.config(), store.clone()).unwrap();
    app.sessions.login("daisy@example.com", PASSWORD).await.unwrap();

    app.sessions.logout().await;

    assert!(app.sessions.current().is_none());
    assert!(store.load().await.unwrap().is_none());
    assert_eq!(server.backend.logouts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn server_rejection_mid_session_logs_out() {
    let server = start_server().await;
    let app = server.app();
    app.sessions.login("daisy@example.com", PASSWORD).await.unwrap();
    server.backend.revoke_all();

    let err = app.notifications.fetch_all().await.unwrap_err();

    assert!(matches!(err, ClientError::Unauthenticated));
    assert!(!app.sessions.is_authenticated());
}

#[tokio::test]
async fn register_does_not_log_in() {
    let server = start_server().await;
    let app = server.app();
    let form = Registration {
        username: "biscuit".into(),
        email: "biscuit@example.com".into(),
        password: "woofwoof".into(),
        confirm_password: "woofwoof".into(),
        name: None,
    };

    app.sessions.register(&form).await.unwrap();

    assert!(!app.sessions.is_authenticated());
    assert_eq!(server.backend.hits("POST /user/register"), 1);
}

#[tokio::test]
async fn register_rejects_mismatched_passwords_locally() {
    let server = start_server().await;
    let app = server.app();
    let form = Registration {
        username: "biscuit".into(),
        email: "biscuit@example.com".into(),
        password: "woofwoof".into(),
        confirm_password: "woofwoo".into(),
        name: None,
    };

    let err = app.sessions.register(&form).await.unwrap_err();

    assert!(matches!(err, ClientError::Validation(_)));
    assert!(server.backend.requests.lock().is_empty());
}
