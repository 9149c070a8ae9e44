//! The authoritative shape collection and its mutation API.

use crate::attachment::LinkBatch;
use crate::config::{CommitThresholds, MAX_UNDO_HISTORY};
use crate::persistence::PersistOp;
use crate::shapes::{ArrowEnd, Shape, ShapeId, ShapeUpdate, non_empty_refs};
use std::collections::{HashMap, HashSet};

/// Read access to shapes by id.
pub trait ShapeLookup {
    fn shape(&self, id: ShapeId) -> Option<&Shape>;
}

impl ShapeLookup for HashMap<ShapeId, Shape> {
    fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.get(&id)
    }
}

/// A snapshot of store state for undo/redo.
#[derive(Debug, Clone)]
struct StoreSnapshot {
    shapes: HashMap<ShapeId, Shape>,
    z_order: Vec<ShapeId>,
}

/// All committed shapes, keyed by id, with their stacking order.
///
/// Every mutation is applied as one batch: a single undo snapshot, a single
/// revision bump, and one outbox entry per touched shape for the persistence
/// forwarder to drain.
#[derive(Debug, Clone)]
pub struct ShapeStore {
    shapes: HashMap<ShapeId, Shape>,
    /// Back to front.
    z_order: Vec<ShapeId>,
    undo_stack: Vec<StoreSnapshot>,
    redo_stack: Vec<StoreSnapshot>,
    max_undo: usize,
    thresholds: CommitThresholds,
    outbox: Vec<PersistOp>,
    revision: u64,
    /// While set, mutations share the snapshot taken by `begin_gesture`.
    gesture_open: bool,
}

impl Default for ShapeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeStore {
    pub fn new() -> Self {
        Self::with_limits(CommitThresholds::default(), MAX_UNDO_HISTORY)
    }

    pub fn with_limits(thresholds: CommitThresholds, max_undo: usize) -> Self {
        Self {
            shapes: HashMap::new(),
            z_order: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo,
            thresholds,
            outbox: Vec::new(),
            revision: 0,
            gesture_open: false,
        }
    }

    pub fn thresholds(&self) -> &CommitThresholds {
        &self.thresholds
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.shapes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Incremented once per applied batch.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Shapes back to front.
    pub fn shapes_ordered(&self) -> impl DoubleEndedIterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    /// Shapes front to back, for hit-testing.
    pub fn shapes_top_first(&self) -> impl Iterator<Item = &Shape> {
        self.shapes_ordered().rev()
    }

    pub fn z_order(&self) -> &[ShapeId] {
        &self.z_order
    }

    /// Drain pending persistence operations.
    pub fn take_outbox(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_ops(&self) -> usize {
        self.outbox.len()
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            shapes: self.shapes.clone(),
            z_order: self.z_order.clone(),
        }
    }

    /// Push current state to undo stack (call before making changes).
    fn push_undo(&mut self) {
        let snapshot = self.snapshot();
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_undo {
            self.undo_stack.remove(0);
        }
    }

    fn checkpoint(&mut self) {
        if !self.gesture_open {
            self.push_undo();
        }
    }

    fn commit(&mut self) {
        self.revision += 1;
    }

    /// Take one undo snapshot for a whole interactive gesture.
    pub fn begin_gesture(&mut self) {
        if !self.gesture_open {
            self.push_undo();
            self.gesture_open = true;
        }
    }

    pub fn end_gesture(&mut self) {
        self.gesture_open = false;
    }

    fn upsert(&mut self, id: ShapeId) {
        if let Some(shape) = self.shapes.get(&id) {
            self.outbox.push(PersistOp::Upsert(shape.clone()));
        }
    }

    /// Keep every shape's `z_index` equal to its position; returns the ids that changed.
    fn renumber(&mut self) -> Vec<ShapeId> {
        let mut changed = Vec::new();
        for (index, id) in self.z_order.iter().enumerate() {
            if let Some(shape) = self.shapes.get_mut(id) {
                let z = index as i64;
                if shape.meta().z_index != z {
                    shape.meta_mut().z_index = z;
                    changed.push(*id);
                }
            }
        }
        changed
    }

    /// Add a committed shape on top. Shapes below their commit threshold are rejected.
    pub fn insert(&mut self, shape: Shape) -> bool {
        self.insert_with_updates(shape, Vec::new())
    }

    /// Add a shape and apply follow-up updates (e.g. attachment links) as one batch.
    pub fn insert_with_updates(&mut self, mut shape: Shape, updates: Vec<ShapeUpdate>) -> bool {
        if !shape.meets_commit_threshold(&self.thresholds) {
            log::debug!("rejecting {} {}: below commit threshold", shape.kind(), shape.id());
            return false;
        }
        let id = shape.id();
        if self.shapes.contains_key(&id) {
            log::debug!("rejecting {} {}: id already present", shape.kind(), id);
            return false;
        }
        self.checkpoint();
        shape.meta_mut().addable = true;
        shape.meta_mut().z_index = self.z_order.len() as i64;
        self.z_order.push(id);
        self.shapes.insert(id, shape);

        let mut touched = self.apply_batch(updates);
        if !touched.contains(&id) {
            touched.insert(0, id);
        }
        for id in touched {
            self.upsert(id);
        }
        self.commit();
        true
    }

    /// Merge partial updates into their targets as one batch. Unknown ids are skipped.
    /// Returns the number of shapes changed.
    pub fn apply_updates(&mut self, updates: Vec<ShapeUpdate>) -> usize {
        let updates: Vec<ShapeUpdate> = ShapeUpdate::coalesce(updates)
            .into_iter()
            .filter(|u| !u.patch.is_empty())
            .collect();
        if !updates.iter().any(|u| self.shapes.contains_key(&u.id)) {
            return 0;
        }
        self.checkpoint();
        let touched = self.apply_batch(updates);
        let count = touched.len();
        for id in touched {
            self.upsert(id);
        }
        self.commit();
        count
    }

    fn apply_batch(&mut self, updates: Vec<ShapeUpdate>) -> Vec<ShapeId> {
        let mut touched = Vec::new();
        let mut restack = false;
        for update in ShapeUpdate::coalesce(updates) {
            let Some(shape) = self.shapes.get_mut(&update.id) else {
                log::trace!("update for missing shape {}, skipping", update.id);
                continue;
            };
            update.patch.apply_to(shape);
            restack |= update.patch.z_index.is_some();
            if !touched.contains(&update.id) {
                touched.push(update.id);
            }
        }
        if restack {
            let shapes = &self.shapes;
            self.z_order
                .sort_by_key(|id| shapes.get(id).map_or(i64::MAX, |s| s.meta().z_index));
            for id in self.renumber() {
                if !touched.contains(&id) {
                    touched.push(id);
                }
            }
        }
        touched
    }

    /// Remove shapes, first repairing every attachment that names them.
    ///
    /// Arrows lose the ends bound to deleted shapes and targets lose the
    /// back-references of deleted arrows; emptied collections become `None`.
    /// Returns the ids actually removed.
    pub fn delete_many(&mut self, ids: &[ShapeId]) -> Vec<ShapeId> {
        let doomed: HashSet<ShapeId> = ids.iter().copied().filter(|id| self.shapes.contains_key(id)).collect();
        if doomed.is_empty() {
            return Vec::new();
        }
        self.checkpoint();

        let mut batch = LinkBatch::new(&self.shapes);
        for arrow in self.shapes.values().filter_map(Shape::as_arrow) {
            for end in ArrowEnd::BOTH {
                let Some(target) = arrow.attached_to(end) else {
                    continue;
                };
                if doomed.contains(&arrow.id) || doomed.contains(&target) {
                    batch.unlink(arrow.id, end);
                }
            }
        }
        let repairs: Vec<ShapeUpdate> = batch
            .into_updates()
            .into_iter()
            .filter(|u| !doomed.contains(&u.id))
            .collect();
        let mut touched = self.apply_batch(repairs);

        // Back-references to deleted arrows that had no matching link.
        for shape in self.shapes.values_mut().filter(|s| !doomed.contains(&s.id())) {
            let id = shape.id();
            let Some(slot) = shape.arrow_props_mut() else {
                continue;
            };
            if let Some(refs) = slot.take() {
                let before = refs.len();
                let kept: Vec<_> = refs.into_iter().filter(|r| !doomed.contains(&r.arrow_id)).collect();
                if kept.len() != before && !touched.contains(&id) {
                    touched.push(id);
                }
                *slot = non_empty_refs(kept);
            }
        }
        if !touched.is_empty() {
            log::debug!("repaired {} shapes while deleting {}", touched.len(), doomed.len());
        }

        let removed: Vec<ShapeId> = self.z_order.iter().copied().filter(|id| doomed.contains(id)).collect();
        for id in &removed {
            self.shapes.remove(id);
        }
        self.z_order.retain(|id| !doomed.contains(id));
        for id in self.renumber() {
            if !touched.contains(&id) {
                touched.push(id);
            }
        }

        for id in touched {
            self.upsert(id);
        }
        self.outbox.extend(removed.iter().copied().map(PersistOp::Delete));
        self.commit();
        removed
    }

    fn restack(&mut self, id: ShapeId, reorder: impl FnOnce(&mut Vec<ShapeId>) -> bool) -> bool {
        if !self.shapes.contains_key(&id) {
            return false;
        }
        let mut order = self.z_order.clone();
        if !reorder(&mut order) {
            return false;
        }
        self.checkpoint();
        self.z_order = order;
        for id in self.renumber() {
            self.upsert(id);
        }
        self.commit();
        true
    }

    /// Bring a shape to the front (topmost).
    pub fn bring_to_front(&mut self, id: ShapeId) -> bool {
        self.restack(id, |order| {
            if order.last() == Some(&id) {
                return false;
            }
            order.retain(|&shape_id| shape_id != id);
            order.push(id);
            true
        })
    }

    /// Send a shape to the back (bottommost).
    pub fn send_to_back(&mut self, id: ShapeId) -> bool {
        self.restack(id, |order| {
            if order.first() == Some(&id) {
                return false;
            }
            order.retain(|&shape_id| shape_id != id);
            order.insert(0, id);
            true
        })
    }

    /// Move a shape one layer forward (towards front).
    pub fn bring_forward(&mut self, id: ShapeId) -> bool {
        self.restack(id, |order| match order.iter().position(|&shape_id| shape_id == id) {
            Some(pos) if pos + 1 < order.len() => {
                order.swap(pos, pos + 1);
                true
            }
            _ => false,
        })
    }

    /// Move a shape one layer backward (towards back).
    pub fn send_backward(&mut self, id: ShapeId) -> bool {
        self.restack(id, |order| match order.iter().position(|&shape_id| shape_id == id) {
            Some(pos) if pos > 0 => {
                order.swap(pos, pos - 1);
                true
            }
            _ => false,
        })
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Undo the last batch. Returns false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.undo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.redo_stack.push(current);
        self.restore(snapshot);
        true
    }

    /// Redo the last undone batch. Returns false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(snapshot) = self.redo_stack.pop() else {
            return false;
        };
        let current = self.snapshot();
        self.undo_stack.push(current);
        self.restore(snapshot);
        true
    }

    /// Swap in a snapshot and queue the difference for persistence.
    fn restore(&mut self, snapshot: StoreSnapshot) {
        self.gesture_open = false;
        let previous = std::mem::replace(&mut self.shapes, snapshot.shapes);
        self.z_order = snapshot.z_order;
        for id in previous.keys().filter(|id| !self.shapes.contains_key(id)) {
            self.outbox.push(PersistOp::Delete(*id));
        }
        let changed: Vec<ShapeId> = self
            .z_order
            .iter()
            .copied()
            .filter(|id| previous.get(id) != self.shapes.get(id))
            .collect();
        for id in changed {
            self.upsert(id);
        }
        self.commit();
    }

    /// Replace the contents with shapes from persistence.
    ///
    /// Shapes are stacked by their stored `z_index`; empty link collections
    /// become `None` and links naming shapes that are not present are dropped.
    /// History and outbox are cleared.
    pub fn load(&mut self, shapes: Vec<Shape>) {
        let mut shapes = shapes;
        shapes.sort_by_key(|s| s.meta().z_index);
        self.shapes.clear();
        self.z_order.clear();
        for mut shape in shapes {
            shape.normalize_links();
            let id = shape.id();
            if self.shapes.insert(id, shape).is_none() {
                self.z_order.push(id);
            }
        }
        self.prune_dangling_links();
        self.renumber();
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.outbox.clear();
        self.gesture_open = false;
        self.commit();
    }

    /// Drop every link side whose counterpart is missing.
    fn prune_dangling_links(&mut self) {
        let shapes = &self.shapes;
        let linked = |arrow_id: ShapeId, end: ArrowEnd, target_id: ShapeId| {
            let arrow_side = shapes
                .get(&arrow_id)
                .and_then(Shape::as_arrow)
                .is_some_and(|a| a.attached_to(end) == Some(target_id));
            let target_side = shapes
                .get(&target_id)
                .and_then(Shape::arrow_props)
                .is_some_and(|refs| refs.iter().any(|r| r.is_for(arrow_id, end)));
            arrow_side && target_side
        };

        let mut dead_ends = Vec::new();
        let mut dead_refs = Vec::new();
        for shape in shapes.values() {
            if let Some(arrow) = shape.as_arrow() {
                for end in ArrowEnd::BOTH {
                    if let Some(target) = arrow.attached_to(end) {
                        if !linked(arrow.id, end, target) {
                            dead_ends.push((arrow.id, end));
                        }
                    }
                }
            }
            for r in shape.arrow_props().unwrap_or_default() {
                if !linked(r.arrow_id, r.position, shape.id()) {
                    dead_refs.push((shape.id(), r.arrow_id, r.position));
                }
            }
        }

        for (arrow_id, end) in dead_ends {
            let Some(arrow) = self.shapes.get_mut(&arrow_id).and_then(Shape::as_arrow_mut) else {
                continue;
            };
            log::trace!("dropping dangling {end:?} link of arrow {arrow_id}");
            if let Some(mut attached) = arrow.attached {
                attached.set(end, None);
                arrow.attached = attached.non_empty();
            }
        }
        for (shape_id, arrow_id, end) in dead_refs {
            let Some(slot) = self.shapes.get_mut(&shape_id).and_then(Shape::arrow_props_mut) else {
                continue;
            };
            log::trace!("dropping dangling reference to arrow {arrow_id} on {shape_id}");
            if let Some(refs) = slot.take() {
                *slot = non_empty_refs(refs.into_iter().filter(|r| !r.is_for(arrow_id, end)).collect());
            }
        }
    }

    /// Serialize the shapes, back to front.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let shapes: Vec<&Shape> = self.shapes_ordered().collect();
        serde_json::to_string_pretty(&shapes)
    }

    /// Deserialize a store from [`ShapeStore::to_json`] output.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let shapes: Vec<Shape> = serde_json::from_str(json)?;
        let mut store = Self::new();
        store.load(shapes);
        Ok(store)
    }
}

impl ShapeLookup for ShapeStore {
    fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::LinkBatch;
    use crate::geometry::best_connection_points;
    use crate::shapes::{Arrow, AttachedShape, Rectangle, ShapePatch};
    use kurbo::Point;

    fn rect(x: f64, y: f64) -> Shape {
        Rectangle::new(Point::new(x, y), 100.0, 100.0).into()
    }

    /// Insert `arrow` linked from `from` to `to`.
    fn connect(store: &mut ShapeStore, from: ShapeId, to: ShapeId) -> ShapeId {
        let best = best_connection_points(store.get(from), store.get(to));
        let (start, end) = (best.from.unwrap(), best.to.unwrap());
        let arrow = Arrow::new(start.point, end.point);
        let id = arrow.id;
        let updates = {
            let mut batch = LinkBatch::new(&*store);
            batch.seed_arrow(&arrow);
            batch.link(id, ArrowEnd::Start, from, start);
            batch.link(id, ArrowEnd::End, to, end);
            batch.into_updates()
        };
        assert!(store.insert_with_updates(arrow.into(), updates));
        id
    }

    fn assert_no_dangling(store: &ShapeStore) {
        for shape in store.shapes_ordered() {
            for r in shape.arrow_props().unwrap_or_default() {
                let arrow = store.get(r.arrow_id).and_then(Shape::as_arrow).unwrap();
                assert_eq!(arrow.attached_to(r.position), Some(shape.id()));
            }
            if let Some(attached) = shape.as_arrow().and_then(|a| a.attached) {
                assert!(!attached.is_empty());
                for end in ArrowEnd::BOTH {
                    if let Some(t) = attached.get(end) {
                        assert!(store.contains(t));
                    }
                }
            }
            if let Some(refs) = shape.arrow_props() {
                assert!(!refs.is_empty());
            }
        }
    }

    #[test]
    fn test_insert_rejects_below_threshold() {
        let mut store = ShapeStore::new();
        let tiny: Shape = Rectangle::new(Point::ZERO, 2.0, 2.0).into();
        assert!(!store.insert(tiny));
        assert!(store.is_empty());
        assert!(!store.can_undo());

        let ok = rect(0.0, 0.0);
        let id = ok.id();
        assert!(store.insert(ok));
        assert!(store.get(id).unwrap().is_addable());
        assert_eq!(store.take_outbox().len(), 1);
    }

    #[test]
    fn test_apply_updates_skips_missing() {
        let mut store = ShapeStore::new();
        let shape = rect(0.0, 0.0);
        let id = shape.id();
        store.insert(shape);
        store.take_outbox();

        let updates = vec![
            ShapeUpdate::new(uuid::Uuid::new_v4(), ShapePatch { width: Some(5.0), ..Default::default() }),
            ShapeUpdate::new(id, ShapePatch { custom_edge_radius: Some(8.0), ..Default::default() }),
        ];
        assert_eq!(store.apply_updates(updates), 1);
        let Some(Shape::Rectangle(r)) = store.get(id) else { panic!("Expected Rectangle shape") };
        assert!((r.corner_radius - 8.0).abs() < f64::EPSILON);
        assert_eq!(store.take_outbox().len(), 1);

        let revision = store.revision();
        assert_eq!(store.apply_updates(vec![ShapeUpdate::points(uuid::Uuid::new_v4(), vec![])]), 0);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_z_index_update_restacks() {
        let mut store = ShapeStore::new();
        let (a, b, c) = (rect(0.0, 0.0), rect(10.0, 0.0), rect(20.0, 0.0));
        let (ia, ib, ic) = (a.id(), b.id(), c.id());
        store.insert(a);
        store.insert(b);
        store.insert(c);
        store.apply_updates(vec![ShapeUpdate::new(ic, ShapePatch { z_index: Some(-1), ..Default::default() })]);
        assert_eq!(store.z_order(), &[ic, ia, ib]);
        let zs: Vec<i64> = store.shapes_ordered().map(|s| s.meta().z_index).collect();
        assert_eq!(zs, vec![0, 1, 2]);
    }

    #[test]
    fn test_z_order_ops() {
        let mut store = ShapeStore::new();
        let (a, b) = (rect(0.0, 0.0), rect(50.0, 50.0));
        let (ia, ib) = (a.id(), b.id());
        store.insert(a);
        store.insert(b);
        assert_eq!(store.z_order(), &[ia, ib]);

        assert!(store.bring_to_front(ia));
        assert_eq!(store.z_order(), &[ib, ia]);
        assert!(!store.bring_forward(ia));
        assert!(store.send_backward(ia));
        assert_eq!(store.z_order(), &[ia, ib]);
        assert!(!store.send_to_back(ia));
        assert_eq!(store.get(ib).unwrap().meta().z_index, 1);
        let top: Vec<ShapeId> = store.shapes_top_first().map(Shape::id).collect();
        assert_eq!(top, vec![ib, ia]);
    }

    #[test]
    fn test_delete_target_cascades_to_all_arrows() {
        let mut store = ShapeStore::new();
        let hub = rect(200.0, 200.0);
        let hub_id = hub.id();
        store.insert(hub);
        let mut arrows = Vec::new();
        for (x, y) in [(0.0, 200.0), (400.0, 200.0), (200.0, 0.0)] {
            let spoke = rect(x, y);
            let spoke_id = spoke.id();
            store.insert(spoke);
            arrows.push((connect(&mut store, spoke_id, hub_id), spoke_id));
        }
        assert_eq!(store.get(hub_id).unwrap().arrow_props().unwrap().len(), 3);
        assert_no_dangling(&store);
        store.take_outbox();

        assert_eq!(store.delete_many(&[hub_id]), vec![hub_id]);
        assert!(!store.contains(hub_id));
        for (arrow_id, spoke_id) in &arrows {
            let arrow = store.get(*arrow_id).and_then(Shape::as_arrow).unwrap();
            assert_eq!(arrow.attached, Some(AttachedShape { start: Some(*spoke_id), end: None }));
        }
        assert_no_dangling(&store);

        let ops = store.take_outbox();
        assert!(ops.contains(&PersistOp::Delete(hub_id)));
        assert!(ops.iter().filter(|op| matches!(op, PersistOp::Upsert(_))).count() >= 3);
    }

    #[test]
    fn test_delete_arrow_clears_back_references() {
        let mut store = ShapeStore::new();
        let (a, b) = (rect(0.0, 0.0), rect(300.0, 0.0));
        let (ia, ib) = (a.id(), b.id());
        store.insert(a);
        store.insert(b);
        let arrow = connect(&mut store, ia, ib);

        store.delete_many(&[arrow]);
        assert!(store.get(ia).unwrap().arrow_props().is_none());
        assert!(store.get(ib).unwrap().arrow_props().is_none());
        assert_no_dangling(&store);
    }

    #[test]
    fn test_delete_both_sides_together() {
        let mut store = ShapeStore::new();
        let (a, b) = (rect(0.0, 0.0), rect(300.0, 0.0));
        let (ia, ib) = (a.id(), b.id());
        store.insert(a);
        store.insert(b);
        let arrow = connect(&mut store, ia, ib);

        let removed = store.delete_many(&[ia, arrow, uuid::Uuid::new_v4()]);
        assert_eq!(removed.len(), 2);
        assert!(store.get(ib).unwrap().arrow_props().is_none());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(ib).unwrap().meta().z_index, 0);
    }

    #[test]
    fn test_undo_restores_links() {
        let mut store = ShapeStore::new();
        let (a, b) = (rect(0.0, 0.0), rect(300.0, 0.0));
        let (ia, ib) = (a.id(), b.id());
        store.insert(a);
        store.insert(b);
        let arrow = connect(&mut store, ia, ib);
        store.delete_many(&[ib]);
        store.take_outbox();

        assert!(store.undo());
        assert!(store.contains(ib));
        let attached = store.get(arrow).and_then(Shape::as_arrow).and_then(|a| a.attached).unwrap();
        assert_eq!(attached.end, Some(ib));
        assert_no_dangling(&store);
        assert!(store.take_outbox().iter().any(|op| op.id() == ib));

        assert!(store.redo());
        assert!(!store.contains(ib));
        assert!(store.take_outbox().contains(&PersistOp::Delete(ib)));
    }

    #[test]
    fn test_gesture_takes_single_snapshot() {
        let mut store = ShapeStore::new();
        let shape = rect(0.0, 0.0);
        let id = shape.id();
        store.insert(shape);

        store.begin_gesture();
        for x in 1..=5 {
            let patch = ShapePatch { position: Some(Point::new(f64::from(x), 0.0)), ..Default::default() };
            store.apply_updates(vec![ShapeUpdate::new(id, patch)]);
        }
        store.end_gesture();

        assert!(store.undo());
        let Some(Shape::Rectangle(r)) = store.get(id) else { panic!("Expected Rectangle shape") };
        assert_eq!(r.position, Point::ZERO);
    }

    #[test]
    fn test_json_round_trip_keeps_order() {
        let mut store = ShapeStore::new();
        let (a, b) = (rect(0.0, 0.0), rect(300.0, 0.0));
        let (ia, ib) = (a.id(), b.id());
        store.insert(a);
        store.insert(b);
        connect(&mut store, ia, ib);
        store.send_to_back(ib);

        let json = store.to_json().unwrap();
        let loaded = ShapeStore::from_json(&json).unwrap();
        assert_eq!(loaded.z_order(), store.z_order());
        assert_no_dangling(&loaded);
        assert!(!loaded.can_undo());
        assert_eq!(loaded.pending_ops(), 0);
    }

    #[test]
    fn test_load_drops_dangling_links() {
        let mut target = Rectangle::new(Point::ZERO, 100.0, 100.0);
        let mut arrow = Arrow::new(Point::new(100.0, 50.0), Point::new(300.0, 50.0));
        arrow.attached = Some(AttachedShape { start: Some(target.id), end: Some(uuid::Uuid::new_v4()) });
        target.arrow_props = Some(vec![crate::shapes::ArrowAttachment {
            arrow_id: uuid::Uuid::new_v4(),
            anchor: Point::new(100.0, 50.0),
            position: ArrowEnd::Start,
            direction: crate::shapes::AnchorDirection::Right,
        }]);
        let arrow_id = arrow.id;
        let target_id = target.id;

        let mut store = ShapeStore::new();
        store.load(vec![target.into(), arrow.into()]);
        // Neither side has a counterpart, so both are dropped.
        assert!(store.get(arrow_id).and_then(Shape::as_arrow).unwrap().attached.is_none());
        assert!(store.get(target_id).unwrap().arrow_props().is_none());
    }

    #[test]
    fn test_load_collapses_empty_link_collections() {
        let mut target = Rectangle::new(Point::ZERO, 100.0, 100.0);
        target.arrow_props = Some(vec![]);
        let mut arrow = Arrow::new(Point::new(100.0, 50.0), Point::new(300.0, 50.0));
        arrow.attached = Some(AttachedShape::default());
        let (target_id, arrow_id) = (target.id, arrow.id);

        let mut store = ShapeStore::new();
        store.load(vec![target.into(), arrow.into()]);
        assert!(store.get(target_id).unwrap().arrow_props().is_none());
        assert!(store.get(arrow_id).and_then(Shape::as_arrow).unwrap().attached.is_none());
        assert_no_dangling(&store);
    }

    #[test]
    fn test_empty_refs_update_stored_as_none() {
        let mut store = ShapeStore::new();
        let shape = rect(0.0, 0.0);
        let id = shape.id();
        store.insert(shape);

        assert_eq!(store.apply_updates(vec![ShapeUpdate::arrow_props(id, Some(vec![]))]), 1);
        assert!(store.get(id).unwrap().arrow_props().is_none());
        assert_no_dangling(&store);
    }
}
