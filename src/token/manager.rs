//! Token Lifecycle Manager
//!
//! Keeps one live credential for one client identity, refreshes it when expired, and signs
//! outgoing requests with it.
//!
//! The current token sits behind an async mutex that is held for the whole
//! read-check-refresh-write sequence, so concurrent callers on one manager never issue more than
//! one refresh. A caller that waits on an in-flight refresh observes the refreshed token.
//!
//! Writes to the cache go through `spawn_blocking` when the cache auto-persists, so a slow
//! storage medium never stalls the async worker. The mutex stays held until the write finishes.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::core::{HttpRequest, HttpResponse, OAuthService};
use crate::error::{
    AuthorizationError, OAuth2Error, OAuth2Result, RemoteError, StorageError, ValidationError,
};
use crate::token::{DeferredCache, PersistenceAdapter};
use crate::types::Token;

/// Token lifecycle manager for one identity.
pub struct TokenLifecycleManager<S: OAuthService, A: PersistenceAdapter<Token>> {
    identity: String,
    cache: Arc<DeferredCache<Token, A>>,
    service: Arc<S>,
    current: Mutex<Option<Token>>,
}

impl<S, A> TokenLifecycleManager<S, A>
where
    S: OAuthService,
    A: PersistenceAdapter<Token> + 'static,
{
    /// Create new manager. Holds no token until one is set or pulled from the cache.
    pub fn new(
        identity: impl Into<String>,
        cache: Arc<DeferredCache<Token, A>>,
        service: Arc<S>,
    ) -> OAuth2Result<Self> {
        let identity = identity.into();
        if identity.trim().is_empty() {
            return Err(ValidationError::InvalidIdentity.into());
        }

        Ok(Self {
            identity,
            cache,
            service,
            current: Mutex::new(None),
        })
    }

    /// Get the client identity.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Get the shared cache.
    pub fn cache(&self) -> &Arc<DeferredCache<Token, A>> {
        &self.cache
    }

    /// Get the remote service.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Token currently held, without touching the cache.
    pub async fn current_token(&self) -> Option<Token> {
        self.current.lock().await.clone()
    }

    /// Install a newly acquired token and write it through to the cache.
    ///
    /// With auto-persist enabled this waits for the durable write.
    pub async fn set_token(&self, token: Token) -> OAuth2Result<()> {
        let mut current = self.current.lock().await;
        *current = Some(token.clone());
        self.write_through(Some(token)).await
    }

    /// Attach the authorization header for the held token.
    ///
    /// Never consults the cache; a manager that has not been populated fails with
    /// `NoCurrentToken`.
    pub async fn sign_request(&self, request: HttpRequest) -> OAuth2Result<HttpRequest> {
        let current = self.current.lock().await;
        let token = current
            .as_ref()
            .ok_or(AuthorizationError::NoCurrentToken)?;
        Ok(request.with_header("authorization", token.authorization_header()))
    }

    /// Return a non-expired token, pulling from the cache and refreshing as needed.
    pub async fn ensure_fresh(&self) -> OAuth2Result<Token> {
        let mut current = self.current.lock().await;
        let token = self.populate(&mut current)?;

        if !token.is_expired() {
            return Ok(token);
        }

        debug!(identity = %self.identity, "access token expired");
        self.refresh_locked(&mut current, &token).await
    }

    /// Refresh regardless of expiry.
    pub async fn refresh(&self) -> OAuth2Result<Token> {
        let mut current = self.current.lock().await;
        let token = self.populate(&mut current)?;
        self.refresh_locked(&mut current, &token).await
    }

    /// Ensure a fresh token, sign `request` with it and send it.
    ///
    /// Nothing is sent if either step fails.
    pub async fn send_request(&self, request: HttpRequest) -> OAuth2Result<HttpResponse> {
        self.ensure_fresh().await?;
        let request = self.sign_request(request).await?;

        self.service
            .execute(request)
            .await
            .map_err(|e| RemoteError::Service(e).into())
    }

    /// Revoke the held token where the provider supports it, then drop the identity from the
    /// cache.
    ///
    /// The cache entry is deleted even when revocation fails; the revocation error is still
    /// returned. With auto-persist enabled this waits for the durable write.
    pub async fn logout(&self) -> OAuth2Result<()> {
        let mut current = self.current.lock().await;
        let token = current.take().or_else(|| self.cache.fetch(&self.identity));

        let revoked = match token {
            Some(token) if self.service.supports_revocation() => self
                .service
                .revoke(token.access_token())
                .await
                .map_err(|e| {
                    warn!(identity = %self.identity, error = %e, "token revocation failed");
                    OAuth2Error::from(RemoteError::RevokeFailed(e))
                }),
            _ => Ok(()),
        };

        let deleted = self.write_through(None).await;
        info!(identity = %self.identity, "logged out");

        revoked?;
        deleted
    }

    fn populate(&self, current: &mut MutexGuard<'_, Option<Token>>) -> OAuth2Result<Token> {
        if current.is_none() {
            **current = self.cache.fetch(&self.identity);
        }

        (**current).clone().ok_or_else(|| {
            AuthorizationError::NotAuthorized {
                identity: self.identity.clone(),
            }
            .into()
        })
    }

    /// Store `token` under the identity, or delete the entry when `None`.
    async fn write_through(&self, token: Option<Token>) -> OAuth2Result<()> {
        if !self.cache.auto_persist() {
            return match token {
                Some(token) => self.cache.store(&self.identity, token),
                None => self.cache.delete(&self.identity),
            };
        }

        let cache = Arc::clone(&self.cache);
        let identity = self.identity.clone();
        tokio::task::spawn_blocking(move || match token {
            Some(token) => cache.store(&identity, token),
            None => cache.delete(&identity),
        })
        .await
        .map_err(|e| StorageError::PersistFailed {
            message: e.to_string(),
        })?
    }

    async fn refresh_locked(
        &self,
        current: &mut MutexGuard<'_, Option<Token>>,
        stale: &Token,
    ) -> OAuth2Result<Token> {
        let refresh_token = stale
            .refresh_token()
            .ok_or(AuthorizationError::MissingRefreshToken)?;

        let refreshed = self
            .service
            .refresh(refresh_token)
            .await
            .map_err(|e| {
                warn!(identity = %self.identity, error = %e, "token refresh failed");
                RemoteError::RefreshFailed(e)
            })?
            .or_refresh_token(refresh_token);

        **current = Some(refreshed.clone());
        self.write_through(Some(refreshed.clone())).await?;

        info!(
            identity = %self.identity,
            expires_at = %refreshed.expires_at(),
            "refreshed access token"
        );
        Ok(refreshed)
    }
}
