//! Builders
//!
//! Fluent builder patterns for OAuth2 configuration and clients.

pub mod config;

pub use config::{oauth2_config, OAuth2ConfigBuilder};
