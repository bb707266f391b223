//! Callback Types
//!
//! Query parameters carried by the authorization redirect.

use url::Url;

use crate::error::ValidationError;

/// Callback parameters from authorization redirect.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallbackParams {
    /// Authorization code (if success).
    pub code: Option<String>,
    /// State parameter.
    pub state: Option<String>,
    /// Error code (if authorization failed).
    pub error: Option<String>,
    /// Error description.
    pub error_description: Option<String>,
    /// Error URI.
    pub error_uri: Option<String>,
}

impl CallbackParams {
    /// Parse callback parameters from URL. The first occurrence of a repeated key wins.
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();

        for (key, value) in url.query_pairs() {
            let slot = match key.as_ref() {
                "code" => &mut params.code,
                "state" => &mut params.state,
                "error" => &mut params.error,
                "error_description" => &mut params.error_description,
                "error_uri" => &mut params.error_uri,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }

    /// Parse callback parameters from URL string.
    pub fn from_url_str(url_str: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(url_str).map_err(|_| ValidationError::MalformedUrl {
            url: url_str.to_string(),
        })?;
        Ok(Self::from_url(&url))
    }

    /// Check if callback contains an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Check if callback is successful.
    pub fn is_success(&self) -> bool {
        self.code.is_some() && self.error.is_none()
    }
}

/// Whether `url` is the final redirect of the flow, i.e. it targets the registered callback.
pub fn is_final_redirect_url(url: &str, redirect_uri: &str) -> bool {
    !redirect_uri.is_empty() && url.starts_with(redirect_uri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_params_from_url() {
        let url = Url::parse("https://example.com/callback?code=abc123&state=xyz789").unwrap();
        let params = CallbackParams::from_url(&url);

        assert_eq!(params.code, Some("abc123".to_string()));
        assert_eq!(params.state, Some("xyz789".to_string()));
        assert!(params.error.is_none());
        assert!(params.is_success());
    }

    #[test]
    fn test_callback_params_error() {
        let params = CallbackParams::from_url_str(
            "https://example.com/callback?error=access_denied&error_description=User%20denied",
        )
        .unwrap();

        assert!(params.code.is_none());
        assert_eq!(params.error, Some("access_denied".to_string()));
        assert_eq!(params.error_description, Some("User denied".to_string()));
        assert!(params.is_error());
        assert!(!params.is_success());
    }

    #[test]
    fn test_repeated_key_keeps_first() {
        let params = CallbackParams::from_url_str("https://cb?state=S1&state=S2").unwrap();
        assert_eq!(params.state, Some("S1".to_string()));
    }

    #[test]
    fn test_malformed_url() {
        let err = CallbackParams::from_url_str("not a url").unwrap_err();
        assert_eq!(
            err,
            ValidationError::MalformedUrl {
                url: "not a url".to_string()
            }
        );
    }

    #[test]
    fn test_is_final_redirect_url() {
        let callback = "https://myapp.com/callback";
        assert!(is_final_redirect_url(
            "https://myapp.com/callback?code=1&state=2",
            callback
        ));
        assert!(!is_final_redirect_url("https://provider.com/login", callback));
        assert!(!is_final_redirect_url("https://anything", ""));
    }
}
