//! In-memory persistence implementation.

use super::{BoxFuture, PersistOp, PersistenceApi, PersistenceError, PersistenceResult};
use crate::shapes::{Shape, ShapeId};
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory persistence for testing and ephemeral use.
///
/// Shapes are kept as JSON so records round-trip the same way they would
/// through a remote API.
#[derive(Default)]
pub struct MemoryPersistence {
    files: RwLock<HashMap<String, HashMap<ShapeId, String>>>,
    failing: AtomicBool,
}

impl MemoryPersistence {
    /// Create a new empty memory persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following save fail with an IO error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of shapes stored for a file.
    pub fn shape_count(&self, file_id: &str) -> usize {
        self.files
            .read()
            .map(|files| files.get(file_id).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    fn check_available(&self) -> PersistenceResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io("backend unavailable".to_string()));
        }
        Ok(())
    }

    fn write(&self, file_id: &str, delta: &[PersistOp]) -> PersistenceResult<()> {
        self.check_available()?;
        let mut encoded = Vec::with_capacity(delta.len());
        for op in delta {
            match op {
                PersistOp::Upsert(shape) => encoded.push((shape.id(), Some(serde_json::to_string(shape)?))),
                PersistOp::Delete(id) => encoded.push((*id, None)),
            }
        }
        let mut files = self
            .files
            .write()
            .map_err(|e| PersistenceError::Other(format!("Lock error: {}", e)))?;
        let file = files.entry(file_id.to_string()).or_default();
        for (id, record) in encoded {
            match record {
                Some(json) => {
                    file.insert(id, json);
                }
                None => {
                    file.remove(&id);
                }
            }
        }
        Ok(())
    }
}

impl PersistenceApi for MemoryPersistence {
    fn load_shapes(&self, file_id: &str) -> BoxFuture<'_, PersistenceResult<Vec<Shape>>> {
        let file_id = file_id.to_string();
        Box::pin(async move {
            let files = self
                .files
                .read()
                .map_err(|e| PersistenceError::Other(format!("Lock error: {}", e)))?;
            let file = files.get(&file_id).ok_or(PersistenceError::NotFound(file_id.clone()))?;
            file.values()
                .map(|json| serde_json::from_str(json).map_err(PersistenceError::from))
                .collect()
        })
    }

    fn save_shape(&self, file_id: &str, shape: &Shape) -> BoxFuture<'_, PersistenceResult<()>> {
        let file_id = file_id.to_string();
        let op = PersistOp::Upsert(shape.clone());
        Box::pin(async move { self.write(&file_id, std::slice::from_ref(&op)) })
    }

    fn save_shapes(&self, file_id: &str, delta: &[PersistOp]) -> BoxFuture<'_, PersistenceResult<()>> {
        let file_id = file_id.to_string();
        let delta = delta.to_vec();
        Box::pin(async move { self.write(&file_id, &delta) })
    }
}
