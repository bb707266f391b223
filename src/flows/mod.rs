//! OAuth2 Flows
//!
//! Credential acquisition flows.
//!
//! - **Authorization Code Flow** (RFC 6749 Section 4.1): authorization request, redirect
//!   validation and code exchange

pub mod authorization_code;

pub use authorization_code::{AuthorizationCodeFlow, AuthorizationCodeFlowImpl};
