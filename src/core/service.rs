//! Remote OAuth Service
//!
//! The provider-side capability consumed by the lifecycle manager and the authorization flow:
//! code exchange, refresh, optional revocation, and execution of signed API requests.

use async_trait::async_trait;
use base64::Engine;
use secrecy::ExposeSecret;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::form_urlencoded;

use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::error::{create_error_from_response, ServiceError};
use crate::types::{ClientAuthMethod, GrantType, OAuth2Config, Token, TokenResponse};

/// Remote OAuth service interface.
#[async_trait]
pub trait OAuthService: Send + Sync {
    /// Exchange an authorization code for a token.
    async fn exchange_code(&self, code: &str) -> Result<Token, ServiceError>;

    /// Obtain a new token using a refresh credential.
    async fn refresh(&self, refresh_token: &str) -> Result<Token, ServiceError>;

    /// Whether the provider exposes token revocation at all.
    fn supports_revocation(&self) -> bool;

    /// Revoke an access credential. Only called when [`supports_revocation`](Self::supports_revocation) is true.
    async fn revoke(&self, access_token: &str) -> Result<(), ServiceError>;

    /// Send an already-signed API request.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ServiceError>;
}

/// OAuth service speaking RFC 6749 / RFC 7009 over an [`HttpTransport`].
pub struct HttpOAuthService<T: HttpTransport> {
    config: OAuth2Config,
    transport: Arc<T>,
}

impl<T: HttpTransport> HttpOAuthService<T> {
    /// Create new service.
    pub fn new(config: OAuth2Config, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    /// Get the configuration.
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    fn form_request(&self, url: &str, mut params: Vec<(&str, String)>) -> HttpRequest {
        let credentials = &self.config.credentials;
        params.push(("client_id", credentials.client_id.clone()));

        let mut request = HttpRequest::new(HttpMethod::Post, url)
            .with_header("content-type", "application/x-www-form-urlencoded")
            .with_header("accept", "application/json")
            .with_timeout(self.config.timeout);

        if let Some(secret) = &credentials.client_secret {
            match credentials.auth_method {
                ClientAuthMethod::ClientSecretBasic => {
                    let pair = format!("{}:{}", credentials.client_id, secret.expose_secret());
                    let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
                    request = request.with_header("authorization", format!("Basic {}", encoded));
                }
                ClientAuthMethod::ClientSecretPost => {
                    params.push(("client_secret", secret.expose_secret().to_string()));
                }
                ClientAuthMethod::None => {}
            }
        }

        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        self.with_user_agent(request.with_body(body))
    }

    fn with_user_agent(&self, request: HttpRequest) -> HttpRequest {
        match &self.config.user_agent {
            Some(agent) if request.header("user-agent").is_none() => {
                request.with_header("user-agent", agent.clone())
            }
            _ => request,
        }
    }

    async fn token_request(&self, params: Vec<(&str, String)>) -> Result<Token, ServiceError> {
        let request = self.form_request(&self.config.provider.token_endpoint, params);
        let response = self.transport.send(request).await?;

        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let token_response: TokenResponse =
            serde_json::from_str(&response.body).map_err(|e| ServiceError::InvalidResponse {
                message: e.to_string(),
            })?;

        Ok(Token::from_response(&token_response))
    }
}

#[async_trait]
impl<T: HttpTransport> OAuthService for HttpOAuthService<T> {
    async fn exchange_code(&self, code: &str) -> Result<Token, ServiceError> {
        self.token_request(vec![
            ("grant_type", GrantType::AuthorizationCode.as_str().to_string()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, ServiceError> {
        self.token_request(vec![
            ("grant_type", GrantType::RefreshToken.as_str().to_string()),
            ("refresh_token", refresh_token.to_string()),
        ])
        .await
    }

    fn supports_revocation(&self) -> bool {
        self.config.provider.revocation_endpoint.is_some()
    }

    async fn revoke(&self, access_token: &str) -> Result<(), ServiceError> {
        let Some(endpoint) = &self.config.provider.revocation_endpoint else {
            return Ok(());
        };

        let request = self.form_request(
            endpoint,
            vec![
                ("token", access_token.to_string()),
                ("token_type_hint", "access_token".to_string()),
            ],
        );
        let response = self.transport.send(request).await?;

        // RFC 7009: 200 for success, and for tokens the server no longer knows.
        if response.is_success() {
            Ok(())
        } else {
            Err(create_error_from_response(response.status, &response.body))
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ServiceError> {
        let request = match request.timeout {
            Some(_) => request,
            None => request.with_timeout(self.config.timeout),
        };
        self.transport.send(self.with_user_agent(request)).await
    }
}

/// Mock OAuth service for testing.
///
/// Queued results are consumed in FIFO order. With an empty queue, exchange and refresh fail,
/// revoke succeeds, and execute answers `200` with an empty body.
pub struct MockOAuthService {
    exchange_results: Mutex<VecDeque<Result<Token, ServiceError>>>,
    refresh_results: Mutex<VecDeque<Result<Token, ServiceError>>>,
    revoke_results: Mutex<VecDeque<Result<(), ServiceError>>>,
    execute_results: Mutex<VecDeque<Result<HttpResponse, ServiceError>>>,
    exchange_history: Mutex<Vec<String>>,
    refresh_history: Mutex<Vec<String>>,
    revoke_history: Mutex<Vec<String>>,
    execute_history: Mutex<Vec<HttpRequest>>,
    refresh_delay: Mutex<Option<Duration>>,
    supports_revocation: AtomicBool,
}

impl Default for MockOAuthService {
    fn default() -> Self {
        Self {
            exchange_results: Mutex::new(VecDeque::new()),
            refresh_results: Mutex::new(VecDeque::new()),
            revoke_results: Mutex::new(VecDeque::new()),
            execute_results: Mutex::new(VecDeque::new()),
            exchange_history: Mutex::new(Vec::new()),
            refresh_history: Mutex::new(Vec::new()),
            revoke_history: Mutex::new(Vec::new()),
            execute_history: Mutex::new(Vec::new()),
            refresh_delay: Mutex::new(None),
            supports_revocation: AtomicBool::new(true),
        }
    }
}

impl MockOAuthService {
    /// Create new mock service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a token for the next exchange.
    pub fn queue_exchange(&self, result: Result<Token, ServiceError>) -> &Self {
        self.exchange_results.lock().unwrap().push_back(result);
        self
    }

    /// Queue a token for the next refresh.
    pub fn queue_refresh(&self, result: Result<Token, ServiceError>) -> &Self {
        self.refresh_results.lock().unwrap().push_back(result);
        self
    }

    /// Queue the next revoke outcome.
    pub fn queue_revoke(&self, result: Result<(), ServiceError>) -> &Self {
        self.revoke_results.lock().unwrap().push_back(result);
        self
    }

    /// Queue the next API response.
    pub fn queue_execute(&self, result: Result<HttpResponse, ServiceError>) -> &Self {
        self.execute_results.lock().unwrap().push_back(result);
        self
    }

    /// Delay every refresh, to widen race windows in concurrency tests.
    pub fn set_refresh_delay(&self, delay: Duration) -> &Self {
        *self.refresh_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Toggle the revoke capability.
    pub fn set_supports_revocation(&self, supported: bool) -> &Self {
        self.supports_revocation.store(supported, Ordering::SeqCst);
        self
    }

    /// Codes passed to `exchange_code`.
    pub fn get_exchange_history(&self) -> Vec<String> {
        self.exchange_history.lock().unwrap().clone()
    }

    /// Refresh credentials passed to `refresh`.
    pub fn get_refresh_history(&self) -> Vec<String> {
        self.refresh_history.lock().unwrap().clone()
    }

    /// Access credentials passed to `revoke`.
    pub fn get_revoke_history(&self) -> Vec<String> {
        self.revoke_history.lock().unwrap().clone()
    }

    /// Requests passed to `execute`.
    pub fn get_execute_history(&self) -> Vec<HttpRequest> {
        self.execute_history.lock().unwrap().clone()
    }

    /// Total number of remote calls of any kind.
    pub fn call_count(&self) -> usize {
        self.exchange_history.lock().unwrap().len()
            + self.refresh_history.lock().unwrap().len()
            + self.revoke_history.lock().unwrap().len()
            + self.execute_history.lock().unwrap().len()
    }
}

fn no_mock_response() -> ServiceError {
    ServiceError::ConnectionFailed {
        message: "No mock response available".to_string(),
    }
}

#[async_trait]
impl OAuthService for MockOAuthService {
    async fn exchange_code(&self, code: &str) -> Result<Token, ServiceError> {
        self.exchange_history.lock().unwrap().push(code.to_string());
        let queued = self.exchange_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Err(no_mock_response()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, ServiceError> {
        self.refresh_history
            .lock()
            .unwrap()
            .push(refresh_token.to_string());

        let delay = *self.refresh_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.refresh_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Err(no_mock_response()))
    }

    fn supports_revocation(&self) -> bool {
        self.supports_revocation.load(Ordering::SeqCst)
    }

    async fn revoke(&self, access_token: &str) -> Result<(), ServiceError> {
        self.revoke_history
            .lock()
            .unwrap()
            .push(access_token.to_string());
        let queued = self.revoke_results.lock().unwrap().pop_front();
        queued.unwrap_or(Ok(()))
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ServiceError> {
        self.execute_history.lock().unwrap().push(request);
        let queued = self.execute_results.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(HttpResponse::new(200, "")))
    }
}

/// Create HTTP-backed OAuth service.
pub fn create_oauth_service<T: HttpTransport>(
    config: OAuth2Config,
    transport: Arc<T>,
) -> HttpOAuthService<T> {
    HttpOAuthService::new(config, transport)
}

/// Create mock OAuth service for testing.
pub fn create_mock_oauth_service() -> MockOAuthService {
    MockOAuthService::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::oauth2_config;
    use crate::core::{create_transport, MockHttpTransport};
    use serde_json::json;
    use std::collections::HashMap;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(revocation: bool) -> OAuth2Config {
        let mut builder = oauth2_config()
            .client_id("test-client")
            .client_secret("test-secret")
            .authorization_endpoint("https://provider.example/authorize")
            .token_endpoint("https://provider.example/token")
            .redirect_uri("https://myapp.example/callback")
            .user_agent("credentials-test/1.0");
        if revocation {
            builder = builder.revocation_endpoint("https://provider.example/revoke");
        }
        builder.build().unwrap()
    }

    fn form_fields(request: &HttpRequest) -> HashMap<String, String> {
        form_urlencoded::parse(request.body.as_deref().unwrap_or("").as_bytes())
            .into_owned()
            .collect()
    }

    #[tokio::test]
    async fn test_exchange_code_request_shape() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            200,
            &json!({
                "access_token": "at-1",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "rt-1",
                "scope": "read write"
            }),
        );
        let service = HttpOAuthService::new(create_test_config(false), transport.clone());

        let token = service.exchange_code("ABC").await.unwrap();
        assert_eq!(token.access_token(), "at-1");
        assert_eq!(token.refresh_token(), Some("rt-1"));
        assert!(!token.is_expired());

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, "https://provider.example/token");
        assert_eq!(request.header("user-agent"), Some("credentials-test/1.0"));
        assert!(request.header("authorization").unwrap().starts_with("Basic "));

        let fields = form_fields(&request);
        assert_eq!(fields["grant_type"], "authorization_code");
        assert_eq!(fields["code"], "ABC");
        assert_eq!(fields["redirect_uri"], "https://myapp.example/callback");
        assert!(!fields.contains_key("client_secret"));
    }

    #[tokio::test]
    async fn test_refresh_with_post_auth() {
        let mut config = create_test_config(false);
        config.credentials.auth_method = ClientAuthMethod::ClientSecretPost;
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(200, &json!({"access_token": "at-2"}));
        let service = HttpOAuthService::new(config, transport.clone());

        let token = service.refresh("rt-1").await.unwrap();
        assert_eq!(token.access_token(), "at-2");
        assert_eq!(token.token_type(), "Bearer");
        assert_eq!(token.expires_in(), 0);

        let request = transport.get_last_request().unwrap();
        assert!(request.header("authorization").is_none());
        let fields = form_fields(&request);
        assert_eq!(fields["grant_type"], "refresh_token");
        assert_eq!(fields["refresh_token"], "rt-1");
        assert_eq!(fields["client_secret"], "test-secret");
    }

    #[tokio::test]
    async fn test_token_error_response_mapping() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_json_response(
            400,
            &json!({"error": "invalid_grant", "error_description": "expired"}),
        );
        transport.queue_response(HttpResponse::new(502, "<html>bad gateway</html>"));
        transport.queue_response(HttpResponse::new(200, "not json"));
        let service = HttpOAuthService::new(create_test_config(false), transport);

        let err = service.refresh("rt").await.unwrap_err();
        assert_eq!(
            err,
            ServiceError::Provider {
                error: "invalid_grant".to_string(),
                description: Some("expired".to_string()),
                uri: None,
            }
        );

        let err = service.refresh("rt").await.unwrap_err();
        assert_eq!(err, ServiceError::UnexpectedStatus { status: 502 });

        let err = service.refresh("rt").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_revocation_capability() {
        let transport = Arc::new(MockHttpTransport::new());
        let without = HttpOAuthService::new(create_test_config(false), transport.clone());
        assert!(!without.supports_revocation());
        without.revoke("at").await.unwrap();
        assert!(transport.get_requests().is_empty());

        transport.queue_response(HttpResponse::new(200, ""));
        let with = HttpOAuthService::new(create_test_config(true), transport.clone());
        assert!(with.supports_revocation());
        with.revoke("at-9").await.unwrap();

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.url, "https://provider.example/revoke");
        let fields = form_fields(&request);
        assert_eq!(fields["token"], "at-9");
        assert_eq!(fields["token_type_hint"], "access_token");
    }

    #[tokio::test]
    async fn test_execute_adds_user_agent_and_timeout() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.queue_response(HttpResponse::new(200, "ok"));
        let service = HttpOAuthService::new(create_test_config(false), transport.clone());

        let response = service
            .execute(HttpRequest::new(HttpMethod::Get, "https://api.example/me"))
            .await
            .unwrap();
        assert_eq!(response.body, "ok");

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.header("user-agent"), Some("credentials-test/1.0"));
        assert_eq!(request.timeout, Some(Duration::from_millis(30_000)));
    }

    #[tokio::test]
    async fn test_http_service_against_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=ABC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "server-token",
                "token_type": "bearer",
                "expires_in": "3600"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/revoke"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let config = oauth2_config()
            .client_id("test-client")
            .client_secret("test-secret")
            .authorization_endpoint(format!("{}/authorize", server.uri()))
            .token_endpoint(format!("{}/token", server.uri()))
            .revocation_endpoint(format!("{}/revoke", server.uri()))
            .redirect_uri("https://myapp.example/callback")
            .build()
            .unwrap();
        let transport = Arc::new(create_transport(Some(Duration::from_secs(5))).unwrap());
        let service = create_oauth_service(config, transport);

        let token = service.exchange_code("ABC").await.unwrap();
        assert_eq!(token.access_token(), "server-token");
        assert_eq!(token.expires_in(), 3600);

        let err = service.revoke(token.access_token()).await.unwrap_err();
        assert_eq!(err, ServiceError::UnexpectedStatus { status: 503 });
    }

    #[tokio::test]
    async fn test_mock_service_queues_and_history() {
        let service = create_mock_oauth_service();
        service.queue_exchange(Ok(Token::new("t", None, "bearer", "", 60)));

        assert!(service.exchange_code("c1").await.is_ok());
        assert!(service.exchange_code("c2").await.is_err());
        assert!(service.revoke("t").await.is_ok());
        assert_eq!(service.get_exchange_history(), vec!["c1", "c2"]);
        assert_eq!(service.call_count(), 3);

        service.set_supports_revocation(false);
        assert!(!service.supports_revocation());
    }
}
