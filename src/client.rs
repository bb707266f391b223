//! OAuth2 Client
//!
//! High-level client tying configuration, the remote service, the credential cache and the
//! authorization flow together.

use std::sync::Arc;
use tracing::info;

use crate::core::{
    create_transport, HttpOAuthService, OAuthService, RandomStateGenerator, ReqwestHttpTransport,
    StateGenerator,
};
use crate::error::{AuthorizationError, OAuth2Result, RemoteError};
use crate::flows::{AuthorizationCodeFlow, AuthorizationCodeFlowImpl};
use crate::token::{DeferredCache, PersistenceAdapter, TokenLifecycleManager};
use crate::types::{
    is_final_redirect_url, AuthorizationParams, AuthorizationRequest, OAuth2Config, Token,
};

/// OAuth2 client for acquiring credentials and handing out per-identity managers.
pub struct OAuth2Client<
    A: PersistenceAdapter<Token>,
    S: OAuthService = HttpOAuthService<ReqwestHttpTransport>,
    G: StateGenerator = RandomStateGenerator,
> {
    config: OAuth2Config,
    service: Arc<S>,
    cache: Arc<DeferredCache<Token, A>>,
    state_generator: Arc<G>,
}

impl<A: PersistenceAdapter<Token> + 'static> OAuth2Client<A> {
    /// Create a client talking HTTP to the configured provider, caching tokens through `adapter`.
    pub fn new(config: OAuth2Config, adapter: A) -> OAuth2Result<Self> {
        let transport =
            Arc::new(create_transport(Some(config.timeout)).map_err(RemoteError::Service)?);
        let service = HttpOAuthService::new(config.clone(), transport);

        Ok(Self::with_components(
            config,
            service,
            Arc::new(DeferredCache::new(adapter)),
            RandomStateGenerator::new(),
        ))
    }
}

impl<A, S, G> OAuth2Client<A, S, G>
where
    A: PersistenceAdapter<Token> + 'static,
    S: OAuthService,
    G: StateGenerator,
{
    /// Create a client with custom implementations.
    pub fn with_components(
        config: OAuth2Config,
        service: S,
        cache: Arc<DeferredCache<Token, A>>,
        state_generator: G,
    ) -> Self {
        Self {
            config,
            service: Arc::new(service),
            cache,
            state_generator: Arc::new(state_generator),
        }
    }

    /// Get the OAuth2 configuration.
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Get the shared credential cache.
    pub fn cache(&self) -> &Arc<DeferredCache<Token, A>> {
        &self.cache
    }

    /// Get the remote service.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    fn flow(&self) -> AuthorizationCodeFlowImpl<S, G> {
        AuthorizationCodeFlowImpl::new(
            self.config.clone(),
            self.service.clone(),
            self.state_generator.clone(),
        )
    }

    /// Build an authorization request with the configured scopes.
    ///
    /// The state never collides with an identity already held in the cache.
    pub fn authorization_request(&self) -> OAuth2Result<AuthorizationRequest> {
        self.authorization_request_with(AuthorizationParams::default())
    }

    /// Build an authorization request with explicit parameters.
    pub fn authorization_request_with(
        &self,
        params: AuthorizationParams,
    ) -> OAuth2Result<AuthorizationRequest> {
        self.flow()
            .build_authorization_request(params, &self.cache.ids())
    }

    /// Whether `url` is the provider's final redirect back to this client.
    pub fn is_final_redirect_url(&self, url: &str) -> bool {
        is_final_redirect_url(url, &self.config.redirect_uri)
    }

    /// Finish the flow: validate the redirect, exchange the code, store the token under
    /// `identity` and return a live manager for it.
    pub async fn complete_authorization(
        &self,
        callback_url: &str,
        expected_state: &str,
        identity: &str,
    ) -> OAuth2Result<TokenLifecycleManager<S, A>> {
        let manager = self.manager(identity)?;
        let token = self
            .flow()
            .handle_redirect(callback_url, expected_state)
            .await?;

        manager.set_token(token).await?;
        info!(identity, "authorization completed");
        Ok(manager)
    }

    /// Manager for an identity with a stored token, refreshed if it has expired.
    ///
    /// Fails with `NotAuthorized` when the cache holds nothing for `identity`; the caller then
    /// has to run the authorization flow.
    pub async fn login(&self, identity: &str) -> OAuth2Result<TokenLifecycleManager<S, A>> {
        let manager = self.manager(identity)?;
        if !self.cache.contains(identity) {
            return Err(AuthorizationError::NotAuthorized {
                identity: identity.to_string(),
            }
            .into());
        }

        manager.ensure_fresh().await?;
        info!(identity, "logged in from stored credential");
        Ok(manager)
    }

    /// Manager for `identity`, not yet populated.
    pub fn manager(&self, identity: &str) -> OAuth2Result<TokenLifecycleManager<S, A>> {
        TokenLifecycleManager::new(identity, self.cache.clone(), self.service.clone())
    }
}

/// Create an OAuth2 client with default implementations.
pub fn oauth2_client<A: PersistenceAdapter<Token> + 'static>(
    config: OAuth2Config,
    adapter: A,
) -> OAuth2Result<OAuth2Client<A>> {
    OAuth2Client::new(config, adapter)
}
