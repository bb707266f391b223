//! Authorization Types
//!
//! Types for the authorization-code flow.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optional overrides for the authorization request.
#[derive(Clone, Debug, Default)]
pub struct AuthorizationParams {
    /// Requested scopes (overrides the configured defaults).
    pub scopes: Option<Vec<String>>,
    /// Prompt behavior.
    pub prompt: Option<Prompt>,
    /// Additional query parameters.
    pub extra_params: BTreeMap<String, String>,
}

/// Authorization request handed to the user agent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// The authorization URL to redirect the user to.
    pub url: String,
    /// Anti-forgery state; must come back unchanged on the redirect.
    pub state: String,
}

/// Prompt behavior for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// Do not display any authentication or consent UI.
    None,
    /// Force re-authentication.
    Login,
    /// Force consent screen.
    Consent,
    /// Force account selection.
    SelectAccount,
}

impl Prompt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Login => "login",
            Self::Consent => "consent",
            Self::SelectAccount => "select_account",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_as_str() {
        assert_eq!(Prompt::None.as_str(), "none");
        assert_eq!(Prompt::Login.as_str(), "login");
        assert_eq!(Prompt::Consent.as_str(), "consent");
        assert_eq!(Prompt::SelectAccount.as_str(), "select_account");
    }

    #[test]
    fn test_authorization_params_default() {
        let params = AuthorizationParams::default();
        assert!(params.scopes.is_none());
        assert!(params.prompt.is_none());
        assert!(params.extra_params.is_empty());
    }
}
