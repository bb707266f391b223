//! Core Components
//!
//! HTTP transport, the remote OAuth service, and anti-forgery state generation.

pub mod service;
pub mod state;
pub mod transport;

pub use service::*;
pub use state::*;
pub use transport::*;
