//! Fire-and-forget forwarding of store changes to the persistence API.

use super::{BoxFuture, PersistOp, PersistenceApi, PersistenceResult};
use crate::store::ShapeStore;
use std::sync::Arc;

/// Keep only the newest op per shape, ordered by when that op was recorded.
pub fn compact_ops(ops: Vec<PersistOp>) -> Vec<PersistOp> {
    let mut compacted: Vec<PersistOp> = Vec::with_capacity(ops.len());
    for op in ops {
        compacted.retain(|existing| existing.id() != op.id());
        compacted.push(op);
    }
    compacted
}

/// Drains a store's outbox into a [`PersistenceApi`].
///
/// Local state stays authoritative: a failed save is logged and reported to
/// whoever drives the returned future, but nothing is rolled back or retried.
pub struct PersistenceForwarder<P: PersistenceApi> {
    api: Arc<P>,
    file_id: String,
}

impl<P: PersistenceApi + 'static> PersistenceForwarder<P> {
    pub fn new(api: Arc<P>, file_id: impl Into<String>) -> Self {
        Self { api, file_id: file_id.into() }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Fetch the file's shapes and replace the store contents with them.
    pub fn load_into<'a>(&'a self, store: &'a mut ShapeStore) -> BoxFuture<'a, PersistenceResult<usize>> {
        Box::pin(async move {
            let shapes = self.api.load_shapes(&self.file_id).await?;
            let count = shapes.len();
            store.load(shapes);
            log::debug!("loaded {} shapes for {}", count, self.file_id);
            Ok(count)
        })
    }

    /// Take the pending changes and return a future that sends them.
    ///
    /// The outbox is drained immediately, so the store can keep mutating while
    /// the host drives the future. Resolves to the number of ops sent.
    pub fn flush(&self, store: &mut ShapeStore) -> BoxFuture<'static, PersistenceResult<usize>> {
        let ops = compact_ops(store.take_outbox());
        let api = Arc::clone(&self.api);
        let file_id = self.file_id.clone();
        Box::pin(async move {
            let count = ops.len();
            let result = match ops.as_slice() {
                [] => return Ok(0),
                [PersistOp::Upsert(shape)] => api.save_shape(&file_id, shape).await,
                delta => api.save_shapes(&file_id, delta).await,
            };
            match result {
                Ok(()) => Ok(count),
                Err(err) => {
                    log::warn!("Failed to persist {} changes to {}: {}", count, file_id, err);
                    Err(err)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryPersistence, PersistenceError};
    use crate::shapes::{Rectangle, Shape, ShapePatch, ShapeUpdate};
    use kurbo::Point;

    #[test]
    fn test_compact_keeps_latest() {
        let rect: Shape = Rectangle::new(Point::ZERO, 10.0, 10.0).into();
        let other: Shape = Rectangle::new(Point::ZERO, 20.0, 20.0).into();
        let ops = vec![
            PersistOp::Upsert(rect.clone()),
            PersistOp::Upsert(other.clone()),
            PersistOp::Delete(rect.id()),
        ];
        assert_eq!(compact_ops(ops), vec![PersistOp::Upsert(other), PersistOp::Delete(rect.id())]);
    }

    #[test]
    fn test_flush_round_trip() {
        let api = Arc::new(MemoryPersistence::new());
        let forwarder = PersistenceForwarder::new(Arc::clone(&api), "board");
        let mut store = ShapeStore::new();
        let rect: Shape = Rectangle::new(Point::ZERO, 10.0, 10.0).into();
        let id = rect.id();
        store.insert(rect);
        store.apply_updates(vec![ShapeUpdate::new(id, ShapePatch { width: Some(40.0), ..Default::default() })]);

        let sent = pollster::block_on(forwarder.flush(&mut store)).unwrap();
        assert_eq!(sent, 1);
        assert_eq!(store.pending_ops(), 0);
        assert_eq!(pollster::block_on(forwarder.flush(&mut store)).unwrap(), 0);

        let mut restored = ShapeStore::new();
        assert_eq!(pollster::block_on(forwarder.load_into(&mut restored)).unwrap(), 1);
        assert_eq!(restored.get(id), store.get(id));
    }

    #[test]
    fn test_failure_keeps_local_state() {
        let api = Arc::new(MemoryPersistence::new());
        let forwarder = PersistenceForwarder::new(Arc::clone(&api), "board");
        let mut store = ShapeStore::new();
        let rect: Shape = Rectangle::new(Point::ZERO, 10.0, 10.0).into();
        let id = rect.id();
        store.insert(rect);

        api.set_failing(true);
        let result = pollster::block_on(forwarder.flush(&mut store));
        assert!(matches!(result, Err(PersistenceError::Io(_))));
        assert!(store.contains(id));
        assert_eq!(api.shape_count("board"), 0);
    }
}
