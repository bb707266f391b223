//! Authorization Code Flow
//!
//! RFC 6749 Section 4.1 - Authorization Code Grant.
//!
//! Builds the authorization request with a fresh anti-forgery state and turns the provider's
//! redirect into a token. The resulting token goes back to the caller; storing it is the caller's
//! business.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use crate::core::{OAuthService, StateGenerator};
use crate::error::{
    ConfigurationError, OAuth2Error, OAuth2Result, RemoteError, ServiceError, ValidationError,
};
use crate::types::{AuthorizationParams, AuthorizationRequest, CallbackParams, OAuth2Config, Token};

/// Authorization Code Flow interface.
#[async_trait]
pub trait AuthorizationCodeFlow: Send + Sync {
    /// Build the authorization request. The state never equals any of `existing_ids`.
    fn build_authorization_request(
        &self,
        params: AuthorizationParams,
        existing_ids: &[String],
    ) -> OAuth2Result<AuthorizationRequest>;

    /// Validate the redirect against `expected_state` and exchange its code.
    async fn handle_redirect(&self, callback_url: &str, expected_state: &str)
        -> OAuth2Result<Token>;
}

/// Authorization Code Flow implementation.
pub struct AuthorizationCodeFlowImpl<S: OAuthService, G: StateGenerator> {
    config: OAuth2Config,
    service: Arc<S>,
    state_generator: Arc<G>,
}

impl<S: OAuthService, G: StateGenerator> AuthorizationCodeFlowImpl<S, G> {
    /// Create new Authorization Code Flow.
    pub fn new(config: OAuth2Config, service: Arc<S>, state_generator: Arc<G>) -> Self {
        Self {
            config,
            service,
            state_generator,
        }
    }

    fn build_url(&self, params: &AuthorizationParams, state: &str) -> OAuth2Result<Url> {
        let endpoint = &self.config.provider.authorization_endpoint;
        let mut url = Url::parse(endpoint).map_err(|_| ConfigurationError::InvalidEndpoint {
            url: endpoint.clone(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.credentials.client_id)
                .append_pair("redirect_uri", &self.config.redirect_uri);

            let scopes = params.scopes.as_ref().unwrap_or(&self.config.default_scopes);
            if !scopes.is_empty() {
                query.append_pair("scope", &scopes.join(" "));
            }

            query.append_pair("state", state);

            if let Some(prompt) = &params.prompt {
                query.append_pair("prompt", prompt.as_str());
            }

            for (key, value) in &params.extra_params {
                query.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

#[async_trait]
impl<S: OAuthService, G: StateGenerator> AuthorizationCodeFlow for AuthorizationCodeFlowImpl<S, G> {
    fn build_authorization_request(
        &self,
        params: AuthorizationParams,
        existing_ids: &[String],
    ) -> OAuth2Result<AuthorizationRequest> {
        let state = self.state_generator.generate_unique(existing_ids);
        let url = self.build_url(&params, &state)?;

        debug!(endpoint = %self.config.provider.authorization_endpoint, "built authorization request");
        Ok(AuthorizationRequest {
            url: url.into(),
            state,
        })
    }

    async fn handle_redirect(
        &self,
        callback_url: &str,
        expected_state: &str,
    ) -> OAuth2Result<Token> {
        let callback = CallbackParams::from_url_str(callback_url)?;

        if let Some(error) = callback.error {
            warn!(error = %error, "authorization denied by provider");
            return Err(RemoteError::Service(ServiceError::Provider {
                error,
                description: callback.error_description,
                uri: callback.error_uri,
            })
            .into());
        }

        let state = callback
            .state
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::MissingState)?;
        if state != expected_state {
            return Err(ValidationError::StateMismatch {
                expected: expected_state.to_string(),
                received: state,
            }
            .into());
        }

        let code = callback
            .code
            .filter(|c| !c.is_empty())
            .ok_or(ValidationError::MissingCode)?;

        let token = self.service.exchange_code(&code).await.map_err(|e| {
            warn!(error = %e, "authorization code exchange failed");
            OAuth2Error::from(RemoteError::ExchangeFailed(e))
        })?;

        info!("authorization code exchanged");
        Ok(token)
    }
}
