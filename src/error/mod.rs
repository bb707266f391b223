//! Credential Error Types
//!
//! Error hierarchy for the token cache, lifecycle manager and authorization flow.

use std::time::Duration;
use thiserror::Error;

/// Root error type for credential operations.
#[derive(Error, Debug)]
pub enum OAuth2Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl OAuth2Error {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "OAUTH2_CONFIG",
            Self::Validation(_) => "OAUTH2_VALIDATION",
            Self::Authorization(_) => "OAUTH2_AUTH",
            Self::Remote(_) => "OAUTH2_REMOTE",
            Self::Storage(_) => "OAUTH2_STORAGE",
        }
    }

    /// Check if the failure is transient.
    ///
    /// Advisory only: nothing in this crate retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.service_error().is_retryable(),
            Self::Storage(StorageError::PersistFailed { .. }) => true,
            Self::Storage(StorageError::LoadFailed { .. }) => true,
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Remote(e) => e.service_error().retry_after(),
            _ => None,
        }
    }

    /// Check if error requires running the authorization flow again.
    pub fn needs_reauth(&self) -> bool {
        match self {
            Self::Authorization(_) => true,
            Self::Remote(RemoteError::RefreshFailed(ServiceError::Provider { error, .. })) => {
                error == "invalid_grant"
            }
            Self::Remote(RemoteError::Service(ServiceError::Provider { error, .. })) => {
                error == "access_denied"
            }
            _ => false,
        }
    }
}

/// Configuration error.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Caller-side contract violation. Nothing is mutated when one of these is returned.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Refusing to store data for an empty identity")]
    InvalidIdentity,

    #[error("Redirect URL did not contain the 'state' query parameter")]
    MissingState,

    #[error("State parameter mismatch (possible CSRF attack)")]
    StateMismatch { expected: String, received: String },

    #[error("Redirect URL did not contain the 'code' query parameter")]
    MissingCode,

    #[error("Malformed redirect URL: {url}")]
    MalformedUrl { url: String },
}

/// Missing or unusable credentials. Only recoverable by authorizing again.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Client with id {identity} is not authorized")]
    NotAuthorized { identity: String },

    #[error("Cannot sign request: no current token")]
    NoCurrentToken,

    #[error("Token expired and carries no refresh token")]
    MissingRefreshToken,
}

/// Failure reported by the remote OAuth service, tagged with the operation that hit it.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Service responded with error: {0}")]
    Service(ServiceError),

    #[error("Authorization code exchange failed: {0}")]
    ExchangeFailed(ServiceError),

    #[error("Token refresh failed: {0}")]
    RefreshFailed(ServiceError),

    #[error("Token revocation failed: {0}")]
    RevokeFailed(ServiceError),
}

impl RemoteError {
    /// Underlying service failure.
    pub fn service_error(&self) -> &ServiceError {
        match self {
            Self::Service(e)
            | Self::ExchangeFailed(e)
            | Self::RefreshFailed(e)
            | Self::RevokeFailed(e) => e,
        }
    }
}

/// Error raised by a remote OAuth collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{error}{}", .description.as_ref().map(|d| format!(": {}", d)).unwrap_or_default())]
    Provider {
        error: String,
        description: Option<String>,
        uri: Option<String>,
    },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Unexpected redirect to: {location}")]
    UnexpectedRedirect { location: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },
}

impl ServiceError {
    /// Build a provider error from its `error` code alone.
    pub fn provider(error: impl Into<String>) -> Self {
        Self::Provider {
            error: error.into(),
            description: None,
            uri: None,
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Provider { error, .. } => {
                error == "server_error" || error == "temporarily_unavailable"
            }
            Self::UnexpectedStatus { status } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }

    /// Get retry-after duration if applicable.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::UnexpectedStatus { status: 429 } => Some(Duration::from_secs(60)),
            _ => None,
        }
    }
}

/// Durable-layer failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Persist failed: {message}")]
    PersistFailed { message: String },

    #[error("Load failed: {message}")]
    LoadFailed { message: String },

    #[error("Corrupt entry: {message}")]
    Corrupt { message: String },
}

/// Result type for credential operations.
pub type OAuth2Result<T> = Result<T, OAuth2Error>;

/// OAuth2 error response from provider.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct OAuth2ErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(default)]
    pub error_uri: Option<String>,
}

impl From<OAuth2ErrorResponse> for ServiceError {
    fn from(response: OAuth2ErrorResponse) -> Self {
        Self::Provider {
            error: response.error,
            description: response.error_description,
            uri: response.error_uri,
        }
    }
}

/// Parse error response from HTTP body.
pub fn parse_error_response(body: &str) -> Option<OAuth2ErrorResponse> {
    serde_json::from_str(body).ok()
}

/// Create error from a non-success HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> ServiceError {
    match parse_error_response(body) {
        Some(response) => response.into(),
        None => ServiceError::UnexpectedStatus { status },
    }
}

/// Get user-friendly error message.
pub fn get_user_message(error: &OAuth2Error) -> String {
    match error {
        OAuth2Error::Authorization(AuthorizationError::NotAuthorized { .. })
        | OAuth2Error::Authorization(AuthorizationError::NoCurrentToken) => {
            "You are not signed in. Please sign in again.".to_string()
        }
        OAuth2Error::Authorization(AuthorizationError::MissingRefreshToken) => {
            "Your session cannot be renewed. Please sign in again.".to_string()
        }
        OAuth2Error::Remote(RemoteError::RefreshFailed(_)) => {
            "Failed to refresh your session. Please try again.".to_string()
        }
        OAuth2Error::Remote(RemoteError::Service(ServiceError::Provider { error, .. }))
            if error == "access_denied" =>
        {
            "Access was denied. Please try signing in again and grant the requested permissions."
                .to_string()
        }
        OAuth2Error::Validation(ValidationError::StateMismatch { .. }) => {
            "Security validation failed. Please restart the sign-in process.".to_string()
        }
        OAuth2Error::Remote(e) if matches!(e.service_error(), ServiceError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        OAuth2Error::Storage(_) => {
            "Your credentials could not be saved or read. Please try again.".to_string()
        }
        _ => "An authentication error occurred. Please try again.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_per_category() {
        let cases = [
            (
                OAuth2Error::from(ConfigurationError::MissingRequired {
                    field: "client_id".to_string(),
                }),
                "OAUTH2_CONFIG",
            ),
            (OAuth2Error::from(ValidationError::InvalidIdentity), "OAUTH2_VALIDATION"),
            (OAuth2Error::from(AuthorizationError::NoCurrentToken), "OAUTH2_AUTH"),
            (
                OAuth2Error::from(RemoteError::Service(ServiceError::UnexpectedStatus {
                    status: 500,
                })),
                "OAUTH2_REMOTE",
            ),
            (
                OAuth2Error::from(StorageError::Corrupt {
                    message: "bad".to_string(),
                }),
                "OAUTH2_STORAGE",
            ),
        ];

        for (error, code) in cases {
            assert_eq!(error.error_code(), code);
        }
    }

    #[test]
    fn test_error_is_retryable() {
        let timeout = OAuth2Error::Remote(RemoteError::RefreshFailed(ServiceError::Timeout {
            timeout: Duration::from_secs(30),
        }));
        assert!(timeout.is_retryable());

        let denied = OAuth2Error::Remote(RemoteError::Service(ServiceError::provider(
            "access_denied",
        )));
        assert!(!denied.is_retryable());

        assert!(OAuth2Error::Storage(StorageError::PersistFailed {
            message: "disk full".to_string()
        })
        .is_retryable());
        assert!(!OAuth2Error::Validation(ValidationError::InvalidIdentity).is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let error = OAuth2Error::Remote(RemoteError::ExchangeFailed(
            ServiceError::UnexpectedStatus { status: 429 },
        ));
        assert_eq!(error.retry_after(), Some(Duration::from_secs(60)));

        let error = OAuth2Error::Authorization(AuthorizationError::NoCurrentToken);
        assert_eq!(error.retry_after(), None);
    }

    #[test]
    fn test_needs_reauth() {
        assert!(OAuth2Error::Authorization(AuthorizationError::MissingRefreshToken).needs_reauth());
        assert!(OAuth2Error::Remote(RemoteError::RefreshFailed(ServiceError::provider(
            "invalid_grant"
        )))
        .needs_reauth());
        assert!(!OAuth2Error::Remote(RemoteError::RefreshFailed(
            ServiceError::ConnectionFailed {
                message: "reset".to_string()
            }
        ))
        .needs_reauth());
    }

    #[test]
    fn test_parse_error_response() {
        let body = r#"{"error":"invalid_grant","error_description":"The token is expired"}"#;
        let response = parse_error_response(body).unwrap();
        assert_eq!(response.error, "invalid_grant");
        assert_eq!(
            response.error_description,
            Some("The token is expired".to_string())
        );
    }

    #[test]
    fn test_create_error_from_response() {
        let error = create_error_from_response(400, r#"{"error":"invalid_grant"}"#);
        assert_eq!(error, ServiceError::provider("invalid_grant"));
        assert_eq!(error.to_string(), "invalid_grant");

        let error = create_error_from_response(503, "<html>down</html>");
        assert_eq!(error, ServiceError::UnexpectedStatus { status: 503 });
        assert!(error.is_retryable());
    }

    #[test]
    fn test_provider_error_display_includes_description() {
        let error = ServiceError::Provider {
            error: "access_denied".to_string(),
            description: Some("User denied".to_string()),
            uri: None,
        };
        assert_eq!(error.to_string(), "access_denied: User denied");
    }

    #[test]
    fn test_user_message() {
        let error = OAuth2Error::Validation(ValidationError::StateMismatch {
            expected: "a".to_string(),
            received: "b".to_string(),
        });
        assert!(get_user_message(&error).contains("Security validation"));
    }
}
