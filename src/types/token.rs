//! Token Types
//!
//! The immutable credential value plus its provider and persisted JSON shapes.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Token response from authorization server.
#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    pub access_token: String,
    /// Token type (usually "Bearer").
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Expires in seconds.
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub expires_in: Option<i64>,
    /// Refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Granted scopes.
    #[serde(default)]
    pub scope: Option<String>,
    /// Additional fields.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// An access credential with its expiry fixed at construction.
///
/// A refreshed credential is always a new `Token`; nothing here mutates after construction.
/// Instants are kept at millisecond precision so the persisted form reproduces them exactly.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    scope: String,
    expires_in: i64,
    expires_at: DateTime<Utc>,
}

impl Token {
    /// Create a token issued now.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        token_type: impl Into<String>,
        scope: impl Into<String>,
        expires_in: i64,
    ) -> Self {
        Self::issued_at(
            access_token,
            refresh_token,
            token_type,
            scope,
            expires_in,
            Utc::now(),
        )
    }

    /// Create a token issued at the given instant. Lifetimes <= 0 expire at the issue instant.
    pub fn issued_at(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        token_type: impl Into<String>,
        scope: impl Into<String>,
        expires_in: i64,
        issued_at: DateTime<Utc>,
    ) -> Self {
        let issued_at = truncate_to_millis(issued_at);
        let expires_at = if expires_in <= 0 {
            issued_at
        } else {
            TimeDelta::try_seconds(expires_in)
                .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        };

        Self::with_expiry(
            access_token,
            refresh_token,
            token_type,
            scope,
            expires_in,
            expires_at,
        )
    }

    /// Rebuild a token from raw fields, including an already-known expiry instant.
    pub fn with_expiry(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        token_type: impl Into<String>,
        scope: impl Into<String>,
        expires_in: i64,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
            token_type: token_type.into(),
            scope: scope.into(),
            expires_in,
            expires_at: truncate_to_millis(expires_at),
        }
    }

    /// Create from a token endpoint response, issued now. A missing `expires_in` counts as 0.
    pub fn from_response(response: &TokenResponse) -> Self {
        Self::new(
            response.access_token.clone(),
            response.refresh_token.clone(),
            response.token_type.clone(),
            response.scope.clone().unwrap_or_default(),
            response.expires_in.unwrap_or(0),
        )
    }

    /// Same credential with `refresh_token` filled in when this one carries none.
    pub(crate) fn or_refresh_token(self, refresh_token: &str) -> Self {
        if self.refresh_token.is_some() {
            return self;
        }
        Self {
            refresh_token: Some(refresh_token.to_string()).filter(|t| !t.is_empty()),
            ..self
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Granted scopes split on whitespace.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope.split_whitespace().collect()
    }

    /// Lifetime in seconds as granted.
    pub fn expires_in(&self) -> i64 {
        self.expires_in
    }

    /// Absolute expiry instant.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if has refresh token.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Check if token is expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry against an explicit instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Get remaining lifetime, `None` once expired.
    pub fn remaining_lifetime(&self) -> Option<std::time::Duration> {
        (self.expires_at - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
    }

    /// Value for the `Authorization` header.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(instant.timestamp_millis()).unwrap_or(instant)
}

/// Persisted JSON shape of a [`Token`].
///
/// Every field is written on save. On read unknown fields are ignored, missing text fields become
/// empty, and an unparseable `expires_in` becomes 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    #[serde(default, deserialize_with = "lenient_string")]
    pub access_token: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub token_type: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub expires_in: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub refresh_token: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub scope: String,
    /// Expiry as epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_optional_i64")]
    pub expiration_date: Option<i64>,
}

impl StoredToken {
    /// Rebuild the token. Without `expiration_date` the expiry is recomputed from now.
    pub fn into_token(self) -> Token {
        let refresh_token = Some(self.refresh_token);
        match self
            .expiration_date
            .and_then(DateTime::<Utc>::from_timestamp_millis)
        {
            Some(expires_at) => Token::with_expiry(
                self.access_token,
                refresh_token,
                self.token_type,
                self.scope,
                self.expires_in,
                expires_at,
            ),
            None => Token::new(
                self.access_token,
                refresh_token,
                self.token_type,
                self.scope,
                self.expires_in,
            ),
        }
    }
}

impl From<&Token> for StoredToken {
    fn from(token: &Token) -> Self {
        Self {
            access_token: token.access_token.clone(),
            token_type: token.token_type.clone(),
            expires_in: token.expires_in,
            refresh_token: token.refresh_token.clone().unwrap_or_default(),
            scope: token.scope.clone(),
            expiration_date: Some(token.expires_at.timestamp_millis()),
        }
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(lenient_optional_i64(deserializer)?.unwrap_or(0))
}

fn lenient_optional_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<i64>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
