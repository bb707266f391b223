//! OAuth2 Credential Lifecycle
//!
//! Acquire, cache, persist, refresh and revoke OAuth2 credentials for multiple client identities.
//!
//! # Features
//!
//! - Authorization Code Flow (RFC 6749 Section 4.1) with anti-forgery state
//! - Deferred cache: cheap in-memory reads and writes, explicit blocking persist/load
//! - One live credential per identity, refreshed on expiry (RFC 6749 Section 6), at most one
//!   refresh in flight
//! - Request signing with the live credential
//! - Logout with token revocation (RFC 7009) where the provider supports it
//!
//! # Example
//!
//! ```rust,ignore
//! use oauth2_credentials::{create_file_token_adapter, oauth2_client, oauth2_config, HttpMethod, HttpRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = oauth2_config()
//!         .client_id("my-client-id")
//!         .client_secret("my-client-secret")
//!         .authorization_endpoint("https://provider.com/authorize")
//!         .token_endpoint("https://provider.com/token")
//!         .revocation_endpoint("https://provider.com/revoke")
//!         .redirect_uri("https://myapp.com/callback")
//!         .add_default_scope("read")
//!         .build()?;
//!
//!     let client = oauth2_client(config, create_file_token_adapter("tokens.json"))?;
//!     client.cache().load()?;
//!
//!     let request = client.authorization_request()?;
//!     println!("Open: {}", request.url);
//!
//!     // ... the user agent lands on the callback URL ...
//!     # let callback_url = "";
//!     let manager = client
//!         .complete_authorization(callback_url, &request.state, "alice")
//!         .await?;
//!     client.cache().persist()?;
//!
//!     let response = manager
//!         .send_request(HttpRequest::new(HttpMethod::Get, "https://api.provider.com/me"))
//!         .await?;
//!     println!("{}", response.body);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: token, callback, authorization and configuration types
//! - `error`: error hierarchy
//! - `core`: HTTP transport, remote OAuth service, state generation
//! - `flows`: authorization code flow
//! - `token`: storage adapters, deferred cache, lifecycle manager
//! - `builders`: fluent configuration builder
//! - `client`: high-level client combining all of the above

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod flows;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{oauth2_client, OAuth2Client};

// Re-export builders
pub use builders::{oauth2_config, OAuth2ConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, parse_error_response, AuthorizationError,
    ConfigurationError, OAuth2Error, OAuth2ErrorResponse, OAuth2Result, RemoteError, ServiceError,
    StorageError, ValidationError,
};

// Re-export types
pub use types::{
    // Config
    ClientAuthMethod, ClientCredentials, GrantType, OAuth2Config, ProviderConfig,
    // Token
    StoredToken, Token, TokenResponse,
    // Auth
    AuthorizationParams, AuthorizationRequest, Prompt,
    // Callback
    is_final_redirect_url, CallbackParams,
};

// Re-export core components
pub use crate::core::{
    // Transport
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport,
    ReqwestHttpTransport,
    // Service
    HttpOAuthService, MockOAuthService, OAuthService,
    // State
    MockStateGenerator, RandomStateGenerator, StateGenerator,
};

// Re-export flows
pub use flows::{AuthorizationCodeFlow, AuthorizationCodeFlowImpl};

// Re-export token management
pub use token::{
    // Storage
    create_file_token_adapter, create_memory_token_adapter, FileBackend, JsonTokenAdapter,
    MemoryBackend, PersistenceAdapter, StorageBackend,
    // Cache
    DeferredCache,
    // Manager
    TokenLifecycleManager,
};
