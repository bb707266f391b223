//! Configuration Builder
//!
//! Fluent builder for OAuth2 configuration.

use std::time::Duration;
use url::Url;

use crate::error::{ConfigurationError, OAuth2Error};
use crate::types::{
    ClientAuthMethod, ClientCredentials, OAuth2Config, ProviderConfig, DEFAULT_TIMEOUT_MS,
};
use secrecy::SecretString;

/// OAuth2 configuration builder.
#[derive(Default)]
pub struct OAuth2ConfigBuilder {
    client_id: Option<String>,
    client_secret: Option<SecretString>,
    auth_method: Option<ClientAuthMethod>,
    authorization_endpoint: Option<String>,
    token_endpoint: Option<String>,
    revocation_endpoint: Option<String>,
    redirect_uri: Option<String>,
    user_agent: Option<String>,
    default_scopes: Vec<String>,
    timeout: Option<Duration>,
}

impl OAuth2ConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set client ID.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set client secret.
    pub fn client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(SecretString::new(client_secret.into()));
        self
    }

    /// Set client authentication method.
    pub fn auth_method(mut self, method: ClientAuthMethod) -> Self {
        self.auth_method = Some(method);
        self
    }

    /// Set authorization endpoint.
    pub fn authorization_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.authorization_endpoint = Some(endpoint.into());
        self
    }

    /// Set token endpoint.
    pub fn token_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.token_endpoint = Some(endpoint.into());
        self
    }

    /// Set revocation endpoint.
    pub fn revocation_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.revocation_endpoint = Some(endpoint.into());
        self
    }

    /// Set the registered callback URL.
    pub fn redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Set the `User-Agent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set default scopes.
    pub fn default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Add a default scope.
    pub fn add_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scopes.push(scope.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Configure endpoints from a provider config.
    pub fn from_provider_config(mut self, provider: ProviderConfig) -> Self {
        self.authorization_endpoint = Some(provider.authorization_endpoint);
        self.token_endpoint = Some(provider.token_endpoint);
        self.revocation_endpoint = provider.revocation_endpoint;
        self
    }

    /// Build the OAuth2 configuration.
    pub fn build(self) -> Result<OAuth2Config, OAuth2Error> {
        let client_id = required(self.client_id, "client_id")?;
        let authorization_endpoint =
            validate_endpoint(required(self.authorization_endpoint, "authorization_endpoint")?)?;
        let token_endpoint = validate_endpoint(required(self.token_endpoint, "token_endpoint")?)?;
        let revocation_endpoint = self.revocation_endpoint.map(validate_endpoint).transpose()?;
        let redirect_uri = validate_endpoint(required(self.redirect_uri, "redirect_uri")?)?;

        let auth_method = self.auth_method.unwrap_or_default();

        if matches!(
            auth_method,
            ClientAuthMethod::ClientSecretBasic | ClientAuthMethod::ClientSecretPost
        ) && self.client_secret.is_none()
        {
            return Err(ConfigurationError::MissingRequired {
                field: "client_secret".to_string(),
            }
            .into());
        }

        let timeout = self
            .timeout
            .unwrap_or(Duration::from_millis(DEFAULT_TIMEOUT_MS));
        if timeout.is_zero() {
            return Err(ConfigurationError::InvalidConfig {
                message: "timeout must be greater than zero".to_string(),
            }
            .into());
        }

        Ok(OAuth2Config {
            credentials: ClientCredentials {
                client_id,
                client_secret: self.client_secret,
                auth_method,
            },
            provider: ProviderConfig {
                authorization_endpoint,
                token_endpoint,
                revocation_endpoint,
            },
            default_scopes: self.default_scopes,
            redirect_uri,
            user_agent: self.user_agent,
            timeout,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, OAuth2Error> {
    value.filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        ConfigurationError::MissingRequired {
            field: field.to_string(),
        }
        .into()
    })
}

fn validate_endpoint(endpoint: String) -> Result<String, OAuth2Error> {
    match Url::parse(&endpoint) {
        Ok(url) if url.has_host() => Ok(endpoint),
        _ => Err(ConfigurationError::InvalidEndpoint { url: endpoint }.into()),
    }
}

/// Create a new OAuth2 configuration builder.
pub fn oauth2_config() -> OAuth2ConfigBuilder {
    OAuth2ConfigBuilder::new()
}
