//! End-to-end tests for the credential lifecycle.

use oauth2_credentials::{
    create_file_token_adapter, create_memory_token_adapter, oauth2_client, oauth2_config,
    AuthorizationError, DeferredCache, HttpMethod, HttpRequest, MockOAuthService, OAuth2Config,
    OAuth2Error, PersistenceAdapter, Token, TokenLifecycleManager, ValidationError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_config(server: &MockServer) -> OAuth2Config {
    oauth2_config()
        .client_id("test-client")
        .client_secret("test-secret")
        .authorization_endpoint(format!("{}/authorize", server.uri()))
        .token_endpoint(format!("{}/token", server.uri()))
        .revocation_endpoint(format!("{}/revoke", server.uri()))
        .redirect_uri("https://cb.example/done")
        .add_default_scope("read")
        .build()
        .unwrap()
}

async fn mount_provider(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=ABC"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-1",
            "token_type": "bearer",
            "expires_in": 0,
            "refresh_token": "rt-1",
            "scope": "read"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "at-2",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/me"))
        .and(header("authorization", "Bearer at-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "alice"})))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/revoke"))
        .and(body_string_contains("token=at-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_lifecycle_across_restarts() {
    let server = MockServer::start().await;
    mount_provider(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("tokens.json");

    // First run: authorize and persist.
    {
        let client =
            oauth2_client(create_config(&server), create_file_token_adapter(&store_path)).unwrap();
        client.cache().load().unwrap();

        let request = client.authorization_request().unwrap();
        assert!(request.url.contains("response_type=code"));

        let callback = format!("https://cb.example/done?state={}&code=ABC", request.state);
        assert!(client.is_final_redirect_url(&callback));

        let manager = client
            .complete_authorization(&callback, &request.state, "alice")
            .await
            .unwrap();
        assert_eq!(
            manager.current_token().await.unwrap().access_token(),
            "at-1"
        );

        assert!(client.cache().has_unsaved());
        client.cache().persist().unwrap();
        assert!(!client.cache().has_unsaved());
    }

    // Second run: restore, refresh on first use, call the API, log out.
    let client =
        oauth2_client(create_config(&server), create_file_token_adapter(&store_path)).unwrap();
    client.cache().load().unwrap();
    assert_eq!(client.cache().ids(), vec!["alice".to_string()]);

    let manager = client.login("alice").await.unwrap();
    let token = manager.current_token().await.unwrap();
    assert_eq!(token.access_token(), "at-2");
    assert_eq!(token.refresh_token(), Some("rt-1"));

    let response = manager
        .send_request(HttpRequest::new(
            HttpMethod::Get,
            format!("{}/api/me", server.uri()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.contains("alice"));

    manager.logout().await.unwrap();
    client.cache().persist().unwrap();

    let raw = std::fs::read_to_string(&store_path).unwrap();
    assert!(!raw.contains("alice"));
}

#[tokio::test]
async fn test_restored_token_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = create_file_token_adapter(dir.path().join("tokens.json"));
    let cache = DeferredCache::new(adapter);
    let token = Token::new("at", Some("rt".to_string()), "bearer", "read write", 3600);

    cache.store("u1", token.clone()).unwrap();
    cache.persist().unwrap();
    cache.clear();
    cache.load().unwrap();

    let restored = cache.fetch("u1").unwrap();
    assert_eq!(restored, token);
    assert_eq!(restored.expires_at(), token.expires_at());
    assert_eq!(restored.scopes(), vec!["read", "write"]);
}

#[tokio::test]
async fn test_redirect_with_wrong_state_stores_nothing() {
    let server = MockServer::start().await;
    let client = oauth2_client(create_config(&server), create_memory_token_adapter()).unwrap();

    let request = client.authorization_request().unwrap();
    let result = client
        .complete_authorization(
            "https://cb.example/done?state=forged&code=ABC",
            &request.state,
            "alice",
        )
        .await;

    assert!(matches!(
        result,
        Err(OAuth2Error::Validation(ValidationError::StateMismatch { .. }))
    ));
    assert!(client.cache().ids().is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_many_concurrent_callers_share_one_refresh() {
    let cache = Arc::new(DeferredCache::new(create_memory_token_adapter()));
    cache
        .store("u1", Token::new("old", Some("rt".to_string()), "bearer", "", 0))
        .unwrap();

    let service = Arc::new(MockOAuthService::new());
    service
        .set_refresh_delay(Duration::from_millis(25))
        .queue_refresh(Ok(Token::new("new", None, "bearer", "", 3600)));

    let manager = TokenLifecycleManager::new("u1", cache.clone(), service.clone()).unwrap();
    let results = futures::future::join_all((0..8).map(|_| manager.ensure_fresh())).await;

    for result in results {
        assert_eq!(result.unwrap().access_token(), "new");
    }
    assert_eq!(service.get_refresh_history().len(), 1);
    assert_eq!(cache.fetch("u1").unwrap().access_token(), "new");
}

#[tokio::test]
async fn test_login_unknown_identity() {
    let server = MockServer::start().await;
    let client = oauth2_client(create_config(&server), create_memory_token_adapter()).unwrap();

    let result = client.login("nobody").await;
    assert!(matches!(
        result,
        Err(OAuth2Error::Authorization(AuthorizationError::NotAuthorized { .. }))
    ));
}

#[test]
fn test_corrupt_store_entries_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tokens.json");
    let adapter = create_file_token_adapter(&path);
    let good = adapter
        .serialize(&Token::new("at", None, "bearer", "", 60))
        .unwrap();
    std::fs::write(
        &path,
        json!({"good": good, "bad": "{\"access_token\":", "number": 7}).to_string(),
    )
    .unwrap();

    let cache = DeferredCache::new(adapter);
    cache.load().unwrap();

    assert_eq!(cache.ids(), vec!["good".to_string()]);
    assert!(!cache.has_unsaved());
}
