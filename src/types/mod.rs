//! Credential Types
//!
//! Data types shared by the cache, lifecycle manager and authorization flow.

pub mod auth;
pub mod callback;
pub mod config;
pub mod token;

pub use auth::*;
pub use callback::*;
pub use config::*;
pub use token::*;
