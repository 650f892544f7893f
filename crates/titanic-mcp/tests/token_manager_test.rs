use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use titanic_mcp::{AuthError, OAuthConfig, TokenManager};

fn config(server: &mockito::Server) -> OAuthConfig {
    OAuthConfig {
        client_id: Some("titanic-client-0001".to_string()),
        client_secret: Some("s3cret".to_string()),
        token_url: Some(format!("{}/oauth/token", server.url())),
        ..OAuthConfig::default()
    }
}

fn manager(server: &mockito::Server) -> TokenManager {
    TokenManager::new(&config(server), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_unconfigured_manager_makes_no_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server.mock("POST", Matcher::Any).expect(0).create_async().await;

    let manager = TokenManager::new(&OAuthConfig::default(), Duration::from_secs(5)).unwrap();
    assert_eq!(manager.get_token().await.unwrap(), None);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_exchange_sends_client_credentials_form() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("grant_type".into(), "client_credentials".into()),
            Matcher::UrlEncoded("client_id".into(), "titanic-client-0001".into()),
            Matcher::UrlEncoded("client_secret".into(), "s3cret".into()),
            Matcher::UrlEncoded("scope".into(), "api:read".into()),
            Matcher::UrlEncoded("audience".into(), "titanic-api".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"access_token":"tok-1","expires_in":3600,"token_type":"Bearer"}"#)
        .create_async()
        .await;

    let manager = manager(&server);
    assert_eq!(manager.get_token().await.unwrap().as_deref(), Some("tok-1"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cached_token_is_reused() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok-cached","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let manager = manager(&server);
    for _ in 0..5 {
        assert_eq!(manager.get_token().await.unwrap().as_deref(), Some("tok-cached"));
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_token_inside_margin_is_refreshed() {
    let mut server = mockito::Server::new_async().await;
    // Expires within the 60 s margin, so it is never served from cache.
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"short-lived","expires_in":30}"#)
        .expect(2)
        .create_async()
        .await;

    let manager = manager(&server);
    manager.get_token().await.unwrap();
    manager.get_token().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_expires_in_defaults_to_an_hour() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok-default"}"#)
        .expect(1)
        .create_async()
        .await;

    let manager = manager(&server);
    manager.get_token().await.unwrap();
    manager.get_token().await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"shared","expires_in":3600}"#)
        .expect(1)
        .create_async()
        .await;

    let manager = Arc::new(manager(&server));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.get_token().await })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().as_deref(), Some("shared"));
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_failed_exchange_returns_error_and_keeps_no_token() {
    let mut server = mockito::Server::new_async().await;
    let denied = server
        .mock("POST", "/oauth/token")
        .with_status(401)
        .with_body(r#"{"error":"access_denied"}"#)
        .create_async()
        .await;

    let manager = manager(&server);
    let err = manager.get_token().await.unwrap_err();
    match err {
        AuthError::CredentialExchange { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("access_denied"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    denied.assert_async().await;
}

#[tokio::test]
async fn test_malformed_response() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server.mock("POST", "/oauth/token").with_status(200).with_body("not json").create_async().await;

    let err = manager(&server).get_token().await.unwrap_err();
    assert!(matches!(err, AuthError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_out_of_range_expiry_is_malformed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"t","expires_in":9223372036854775807}"#)
        .expect(2)
        .create_async()
        .await;

    let manager = manager(&server);
    let err = manager.get_token().await.unwrap_err();
    assert!(matches!(err, AuthError::MalformedResponse(ref msg) if msg.contains("expires_in")));
    // Nothing was cached, so the next call asks again.
    assert!(manager.get_token().await.is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalidate_forces_refresh() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/oauth/token")
        .with_status(200)
        .with_body(r#"{"access_token":"tok","expires_in":3600}"#)
        .expect(2)
        .create_async()
        .await;

    let manager = manager(&server);
    manager.get_token().await.unwrap();
    manager.invalidate().await;
    manager.get_token().await.unwrap();
    mock.assert_async().await;
}
