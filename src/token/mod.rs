//! Token Management
//!
//! Credential storage and lifecycle.
//!
//! This module provides:
//!
//! - **Storage**: persistence adapters and the media behind them
//! - **Deferred Cache**: identity-keyed in-memory store with explicit persist/load
//! - **Lifecycle Manager**: one live, refreshed credential per identity

pub mod cache;
pub mod manager;
pub mod storage;

// Storage
pub use storage::{
    create_file_token_adapter, create_memory_token_adapter, FileBackend, JsonTokenAdapter,
    MemoryBackend, PersistenceAdapter, StorageBackend,
};

// Deferred Cache
pub use cache::DeferredCache;

// Lifecycle Manager
pub use manager::TokenLifecycleManager;
