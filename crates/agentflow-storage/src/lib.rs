//! AgentFlow Storage - Memory persistence boundary
//!
//! The runtime persists every memory mutation through [`MemoryRepository`]
//! before yielding an event, so a crash-restart observes a coherent state.
//! Durable backends live behind this trait; [`InMemoryRepository`] is the
//! process-local reference implementation used by tests and embedders.

mod in_memory;
mod repository;

pub use in_memory::InMemoryRepository;
pub use repository::MemoryRepository;

use thiserror::Error;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
