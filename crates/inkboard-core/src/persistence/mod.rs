//! Boundary to the external persistence API.
//!
//! The interactive core never awaits persistence. The store records what
//! changed as [`PersistOp`]s; a [`PersistenceForwarder`] drains them and hands
//! back a future for the host to drive.

mod forwarder;
mod memory;

pub use forwarder::{PersistenceForwarder, compact_ops};
pub use memory::MemoryPersistence;

use crate::shapes::{Shape, ShapeId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Persistence error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// One pending change for the persistence API.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    Upsert(Shape),
    Delete(ShapeId),
}

impl PersistOp {
    pub fn id(&self) -> ShapeId {
        match self {
            PersistOp::Upsert(shape) => shape.id(),
            PersistOp::Delete(id) => *id,
        }
    }
}

/// External shape persistence, addressed by whiteboard file id.
///
/// Note: On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait PersistenceApi: Send + Sync {
    /// Load every shape of a file.
    fn load_shapes(&self, file_id: &str) -> BoxFuture<'_, PersistenceResult<Vec<Shape>>>;

    /// Save a single shape.
    fn save_shape(&self, file_id: &str, shape: &Shape) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Save a batch of upserts and deletions.
    fn save_shapes(&self, file_id: &str, delta: &[PersistOp]) -> BoxFuture<'_, PersistenceResult<()>>;
}

/// External shape persistence (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait PersistenceApi {
    /// Load every shape of a file.
    fn load_shapes(&self, file_id: &str) -> BoxFuture<'_, PersistenceResult<Vec<Shape>>>;

    /// Save a single shape.
    fn save_shape(&self, file_id: &str, shape: &Shape) -> BoxFuture<'_, PersistenceResult<()>>;

    /// Save a batch of upserts and deletions.
    fn save_shapes(&self, file_id: &str, delta: &[PersistOp]) -> BoxFuture<'_, PersistenceResult<()>>;
}
