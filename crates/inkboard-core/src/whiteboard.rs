//! Whiteboard controller: routes pointer and keyboard events through the tool,
//! proximity, attachment and transform layers into the shape store.

use crate::attachment::{LinkBatch, check_detachments, recompute_attached_arrows};
use crate::config::EngineConfig;
use crate::geometry::best_connection_points;
use crate::persistence::PersistOp;
use crate::proximity::{AttachmentSuggestion, EraserSession, Instant, SuggestionTracker};
use crate::render::{RenderItem, RenderSurface};
use crate::selection::{CombinedStyle, SelectionPurpose, SelectionState, StyleChange};
use crate::shapes::arrow::set_polyline_endpoint;
use crate::shapes::{Arrow, ArrowEnd, Shape, ShapeId, ShapeStyle, ShapeUpdate};
use crate::store::ShapeStore;
use crate::tools::{ToolKind, ToolManager};
use crate::transform::{LiveTransform, normalize_many, translation};
use kurbo::{Point, Vec2};

/// Point count reported to the suggestion tracker for each arrow end.
fn end_point_count(end: ArrowEnd) -> usize {
    match end {
        ArrowEnd::Start => 1,
        ArrowEnd::End => 2,
    }
}

/// The whiteboard: committed shapes, selection, the active tool and the
/// transient gesture state around them.
pub struct Whiteboard {
    store: ShapeStore,
    selection: SelectionState,
    tools: ToolManager,
    config: EngineConfig,
    suggestions: SuggestionTracker,
    eraser: EraserSession,
    /// Attachment target under the pointer when the current arrow was started.
    arrow_start_target: Option<ShapeId>,
    surface: Option<Box<dyn RenderSurface>>,
}

impl Default for Whiteboard {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Whiteboard {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: ShapeStore::with_limits(config.commit_thresholds(), config.max_undo_history),
            selection: SelectionState::default(),
            tools: ToolManager::new(config.commit_thresholds()),
            suggestions: SuggestionTracker::new(config.suggestion_interval()),
            eraser: EraserSession::default(),
            arrow_start_target: None,
            surface: None,
            config,
        }
    }

    pub fn store(&self) -> &ShapeStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Attach the rendering surface and push the current shapes to it.
    pub fn set_surface(&mut self, surface: Box<dyn RenderSurface>) {
        self.surface = Some(surface);
        self.publish();
    }

    /// Switch tools, abandoning any gesture in progress.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.tools.set_tool(tool);
        self.suggestions.clear();
        self.arrow_start_target = None;
        if self.eraser.is_active() {
            self.eraser.cancel();
            self.selection.clear();
        }
        self.publish();
    }

    /// Style for shapes drawn from now on.
    pub fn set_style(&mut self, style: ShapeStyle) {
        self.tools.set_style(style);
    }

    /// Push the ordered shape list, plus any preview, to the surface.
    fn publish(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let dimmed = self.config.pending_delete_opacity;
        let mut items: Vec<RenderItem<'_>> = self
            .store
            .shapes_ordered()
            .map(|shape| RenderItem {
                shape,
                opacity: shape.style().opacity * self.selection.display_opacity(shape.id(), dimmed),
            })
            .collect();
        if let Some(preview) = self.tools.preview() {
            items.push(RenderItem { shape: preview, opacity: preview.style().opacity });
        }
        surface.shapes_changed(&items);
    }

    // --- Pointer gestures ---

    pub fn pointer_down(&mut self, point: Point, now: Instant) {
        match self.tools.current_tool {
            ToolKind::Eraser => {
                self.eraser.begin();
                self.sweep_eraser(point);
                self.publish();
            }
            tool if tool.draws_shapes() => {
                self.tools.begin(point);
                self.arrow_start_target = None;
                if tool == ToolKind::Arrow {
                    self.suggestions.clear();
                    self.suggestions.update(
                        now,
                        self.store.shapes_top_first(),
                        point,
                        1,
                        self.config.snap_threshold,
                        None,
                    );
                    self.arrow_start_target = self.suggestions.current().and_then(|s| s.shape_id);
                }
                self.publish();
            }
            _ => {}
        }
    }

    /// Returns a new attachment suggestion when the target under an arrow end changed.
    pub fn pointer_move(&mut self, point: Point, now: Instant) -> Option<AttachmentSuggestion> {
        if self.eraser.is_active() {
            if self.sweep_eraser(point) {
                self.publish();
            }
            return None;
        }
        if !self.tools.is_active() {
            return None;
        }
        self.tools.update(point);
        let mut suggestion = None;
        if self.tools.current_tool == ToolKind::Arrow {
            let count = self.tools.preview().and_then(Shape::points).map_or(0, <[_]>::len);
            suggestion = self.suggestions.update(
                now,
                self.store.shapes_top_first(),
                point,
                count,
                self.config.snap_threshold,
                None,
            );
        }
        self.publish();
        suggestion
    }

    /// Finish the gesture. Returns the id of a newly committed shape.
    pub fn pointer_up(&mut self, point: Point) -> Option<ShapeId> {
        if self.eraser.is_active() {
            self.sweep_eraser(point);
            let ids = self.eraser.finish();
            self.delete_shapes(&ids);
            return None;
        }
        if !self.tools.is_active() {
            return None;
        }
        let committed = match self.tools.end(point) {
            Some(Shape::Arrow(arrow)) => {
                self.suggestions.refresh(
                    self.store.shapes_top_first(),
                    point,
                    arrow.points.len(),
                    self.config.snap_threshold,
                    None,
                );
                let end_target = self.suggestions.current().and_then(|s| s.shape_id);
                let start_target = self.arrow_start_target.take();
                self.suggestions.clear();
                self.commit_arrow(arrow, start_target, end_target)
            }
            Some(shape) => {
                let id = shape.id();
                self.store.insert(shape).then_some(id)
            }
            None => None,
        };
        self.arrow_start_target = None;
        self.publish();
        committed
    }

    /// Insert a drawn arrow together with its links, as one batch. The arrow is
    /// discarded if snapping its ends to the anchors leaves it below the commit threshold.
    fn commit_arrow(&mut self, arrow: Arrow, start: Option<ShapeId>, end: Option<ShapeId>) -> Option<ShapeId> {
        let id = arrow.id;
        let end = end.filter(|target| Some(*target) != start);
        let best = best_connection_points(
            start.and_then(|target| self.store.get(target)),
            end.and_then(|target| self.store.get(target)),
        );
        let updates = {
            let mut batch = LinkBatch::new(&self.store);
            batch.seed_arrow(&arrow);
            if let (Some(target), Some(anchor)) = (start, best.from) {
                batch.link(id, ArrowEnd::Start, target, anchor);
            }
            if let (Some(target), Some(anchor)) = (end, best.to) {
                batch.link(id, ArrowEnd::End, target, anchor);
            }
            batch.into_updates()
        };
        let mut linked: Shape = arrow.clone().into();
        for update in updates.iter().filter(|u| u.id == id) {
            update.patch.apply_to(&mut linked);
        }
        if !linked.meets_commit_threshold(self.store.thresholds()) {
            log::debug!("discarding arrow {id}: too short once snapped to its anchors");
            return None;
        }
        self.store.insert_with_updates(arrow.into(), updates).then_some(id)
    }

    /// Returns true when the sweep marked new shapes.
    fn sweep_eraser(&mut self, point: Point) -> bool {
        let added = self
            .eraser
            .sweep(self.store.shapes_top_first(), point, self.config.eraser_threshold);
        if added > 0 {
            self.selection
                .select_many(self.eraser.hits().iter().copied(), SelectionPurpose::ForDeleting);
        }
        added > 0
    }

    // --- Drag and transform ---

    /// Move shapes by `delta` during a drag. Attached arrows follow.
    /// The whole drag shares one undo snapshot until [`Whiteboard::drag_end`].
    pub fn drag_move(&mut self, ids: &[ShapeId], delta: Vec2) -> usize {
        let moves: Vec<ShapeUpdate> = ids
            .iter()
            .filter_map(|id| self.store.get(*id))
            .filter(|shape| !shape.is_locked() && shape.meta().draggable)
            .filter_map(|shape| translation(shape, delta))
            .collect();
        if moves.is_empty() {
            return 0;
        }
        let moved: Vec<ShapeId> = moves.iter().map(|u| u.id).collect();
        self.store.begin_gesture();
        let count = self.store.apply_updates(moves);
        self.follow_attached_arrows(&moved);
        self.publish();
        count
    }

    /// Finish a drag: detach arrow ends that drifted too far from their anchors.
    pub fn drag_end(&mut self, ids: &[ShapeId]) {
        if let Some(updates) = check_detachments(ids, &self.store, self.config.max_arrow_limit) {
            self.store.apply_updates(updates);
        }
        self.store.end_gesture();
        self.publish();
    }

    /// Commit the live transforms of a multi-selection as one undo step.
    ///
    /// Each node is normalized and reset in place; attached arrows then follow
    /// their targets and drifted ends detach.
    pub fn transform_end(&mut self, nodes: &mut [(ShapeId, LiveTransform)]) -> usize {
        let min_size = self.config.min_normalized_size;
        let store = &self.store;
        let pairs = nodes.iter_mut().filter_map(|(id, live)| {
            store
                .get(*id)
                .filter(|shape| !shape.is_locked())
                .map(|shape| (shape, live))
        });
        let updates = normalize_many(pairs, min_size);
        if updates.is_empty() {
            return 0;
        }
        let ids: Vec<ShapeId> = updates.iter().map(|u| u.id).collect();
        self.store.begin_gesture();
        let count = self.store.apply_updates(updates);
        self.follow_attached_arrows(&ids);
        if let Some(detach) = check_detachments(&ids, &self.store, self.config.max_arrow_limit) {
            self.store.apply_updates(detach);
        }
        self.store.end_gesture();
        self.publish();
        count
    }

    /// Re-anchor arrows bound to each moved shape. Applied shape by shape so an
    /// arrow bound at both ends sees the first end's move before the second.
    fn follow_attached_arrows(&mut self, moved: &[ShapeId]) {
        for id in moved {
            let updates = match self.store.get(*id) {
                Some(shape) if shape.is_attachable() => recompute_attached_arrows(shape, &self.store),
                _ => continue,
            };
            if !updates.is_empty() {
                self.store.apply_updates(updates);
            }
        }
    }

    // --- Arrow endpoint editing ---

    /// Drag one end of a committed arrow. Returns a suggestion when the target under it changed.
    pub fn drag_arrow_endpoint(
        &mut self,
        arrow_id: ShapeId,
        end: ArrowEnd,
        point: Point,
        now: Instant,
    ) -> Option<AttachmentSuggestion> {
        let arrow = self
            .store
            .get(arrow_id)
            .and_then(Shape::as_arrow)
            .filter(|arrow| !arrow.meta.locked)?;
        let mut points = arrow.points.clone();
        set_polyline_endpoint(&mut points, end, point);
        self.store.begin_gesture();
        self.store.apply_updates(vec![ShapeUpdate::points(arrow_id, points)]);
        let suggestion = self.suggestions.update(
            now,
            self.store.shapes_top_first(),
            point,
            end_point_count(end),
            self.config.snap_threshold,
            None,
        );
        self.publish();
        suggestion
    }

    /// Drop a dragged arrow end: attach it to the shape under it, otherwise
    /// keep or drop the existing link depending on how far the end moved.
    /// The shape bound to the other end is never a target.
    pub fn release_arrow_endpoint(&mut self, arrow_id: ShapeId, end: ArrowEnd, point: Point) {
        self.suggestions.refresh(
            self.store.shapes_top_first(),
            point,
            end_point_count(end),
            self.config.snap_threshold,
            None,
        );
        let opposite = self
            .store
            .get(arrow_id)
            .and_then(Shape::as_arrow)
            .and_then(|arrow| arrow.attached_to(end.opposite()));
        let target = self
            .suggestions
            .current()
            .and_then(|s| s.shape_id)
            .filter(|target| Some(*target) != opposite);
        self.suggestions.clear();

        if let Some(target) = target {
            self.store.begin_gesture();
            let updates = match self.store.get(arrow_id).and_then(Shape::as_arrow) {
                Some(arrow) => {
                    let other = arrow.attached_to(end.opposite()).and_then(|id| self.store.get(id));
                    let target_shape = self.store.get(target);
                    let anchor = match end {
                        ArrowEnd::Start => best_connection_points(target_shape, other).from,
                        ArrowEnd::End => best_connection_points(other, target_shape).to,
                    };
                    let mut batch = LinkBatch::new(&self.store);
                    batch.seed_arrow(arrow);
                    if let Some(anchor) = anchor {
                        batch.link(arrow_id, end, target, anchor);
                    }
                    batch.into_updates()
                }
                None => Vec::new(),
            };
            self.store.apply_updates(updates);
        }
        if let Some(detach) = check_detachments(&[arrow_id], &self.store, self.config.max_arrow_limit) {
            self.store.apply_updates(detach);
        }
        self.store.end_gesture();
        self.publish();
    }

    // --- Selection ---

    pub fn select(&mut self, ids: &[ShapeId], purpose: SelectionPurpose) {
        let ids = ids.iter().copied().filter(|id| self.store.contains(*id));
        self.selection.select_many(ids, purpose);
        self.publish();
    }

    pub fn add_to_selection(&mut self, id: ShapeId) {
        if self.store.contains(id) {
            self.selection.add(id);
            self.publish();
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.publish();
    }

    /// Delete key: remove the selection and everything bound to it.
    pub fn key_delete(&mut self) -> Vec<ShapeId> {
        let ids = self.selection.ids().to_vec();
        self.delete_shapes(&ids)
    }

    /// Delete shapes, unlinking any arrows bound to them. Returns the removed ids.
    pub fn delete_shapes(&mut self, ids: &[ShapeId]) -> Vec<ShapeId> {
        let removed = if ids.is_empty() { Vec::new() } else { self.store.delete_many(ids) };
        self.selection.clear();
        self.publish();
        removed
    }

    pub fn combined_style(&self) -> CombinedStyle {
        self.selection.combined_style(&self.store)
    }

    /// Write one style value to every selected shape it applies to.
    pub fn apply_style(&mut self, change: StyleChange) -> usize {
        let updates = self.selection.style_updates(&change, &self.store);
        let count = self.store.apply_updates(updates);
        if count > 0 {
            self.publish();
        }
        count
    }

    // --- Z-order ---

    pub fn bring_to_front(&mut self, id: ShapeId) -> bool {
        self.restack(id, ShapeStore::bring_to_front)
    }

    pub fn send_to_back(&mut self, id: ShapeId) -> bool {
        self.restack(id, ShapeStore::send_to_back)
    }

    pub fn bring_forward(&mut self, id: ShapeId) -> bool {
        self.restack(id, ShapeStore::bring_forward)
    }

    pub fn send_backward(&mut self, id: ShapeId) -> bool {
        self.restack(id, ShapeStore::send_backward)
    }

    fn restack(&mut self, id: ShapeId, op: fn(&mut ShapeStore, ShapeId) -> bool) -> bool {
        let changed = op(&mut self.store, id);
        if changed {
            self.publish();
        }
        changed
    }

    // --- History and loading ---

    pub fn undo(&mut self) -> bool {
        let changed = self.store.undo();
        if changed {
            self.selection.retain_existing(&self.store);
            self.publish();
        }
        changed
    }

    pub fn redo(&mut self) -> bool {
        let changed = self.store.redo();
        if changed {
            self.selection.retain_existing(&self.store);
            self.publish();
        }
        changed
    }

    /// Replace the board with loaded shapes.
    pub fn load(&mut self, shapes: Vec<Shape>) {
        self.tools.cancel();
        self.eraser.cancel();
        self.suggestions.clear();
        self.store.load(shapes);
        self.selection.clear();
        self.publish();
    }

    /// Mutable access for the persistence forwarder.
    pub fn store_mut(&mut self) -> &mut ShapeStore {
        &mut self.store
    }

    pub fn take_outbox(&mut self) -> Vec<PersistOp> {
        self.store.take_outbox()
    }
}
