//! Arrow ↔ shape attachment bookkeeping.
//!
//! The link between a connector and the shapes its ends sit on is stored
//! twice: as [`AttachedShape`] on the arrow and as an [`ArrowAttachment`] entry
//! in the target's `arrow_props`. Nothing here mutates the store; every
//! operation returns [`ShapeUpdate`]s built through a [`LinkBatch`], which keeps
//! working copies of both sides so several edits to the same shape compose.

use crate::geometry::{Anchor, anchor_point, best_connection_points};
use crate::shapes::arrow::set_polyline_endpoint;
use crate::shapes::{
    AnchorDirection, Arrow, ArrowAttachment, ArrowEnd, AttachedShape, Shape, ShapeId, ShapePatch,
    ShapeUpdate, non_empty_refs,
};
use crate::store::ShapeLookup;
use kurbo::Point;

struct ArrowEdit {
    id: ShapeId,
    attached: AttachedShape,
    points: Vec<Point>,
    attached_dirty: bool,
    points_dirty: bool,
}

struct TargetEdit {
    id: ShapeId,
    refs: Vec<ArrowAttachment>,
    dirty: bool,
}

/// Accumulates link edits against a read-only view of the shapes.
pub struct LinkBatch<'a, L: ShapeLookup + ?Sized> {
    shapes: &'a L,
    arrows: Vec<ArrowEdit>,
    targets: Vec<TargetEdit>,
}

impl<'a, L: ShapeLookup + ?Sized> LinkBatch<'a, L> {
    pub fn new(shapes: &'a L) -> Self {
        Self { shapes, arrows: Vec::new(), targets: Vec::new() }
    }

    /// Start from an arrow that is not in the store yet.
    pub fn seed_arrow(&mut self, arrow: &Arrow) {
        self.arrows.retain(|a| a.id != arrow.id);
        self.arrows.push(ArrowEdit {
            id: arrow.id,
            attached: arrow.attached.unwrap_or_default(),
            points: arrow.points.clone(),
            attached_dirty: false,
            points_dirty: false,
        });
    }

    fn arrow_edit(&mut self, id: ShapeId) -> Option<&mut ArrowEdit> {
        if let Some(idx) = self.arrows.iter().position(|a| a.id == id) {
            return self.arrows.get_mut(idx);
        }
        let shapes = self.shapes;
        let Some(arrow) = shapes.shape(id).and_then(Shape::as_arrow) else {
            log::trace!("arrow {id} not found, skipping");
            return None;
        };
        self.arrows.push(ArrowEdit {
            id,
            attached: arrow.attached.unwrap_or_default(),
            points: arrow.points.clone(),
            attached_dirty: false,
            points_dirty: false,
        });
        self.arrows.last_mut()
    }

    fn target_edit(&mut self, id: ShapeId) -> Option<&mut TargetEdit> {
        if let Some(idx) = self.targets.iter().position(|t| t.id == id) {
            return self.targets.get_mut(idx);
        }
        let shapes = self.shapes;
        let Some(shape) = shapes.shape(id).filter(|s| s.is_attachable()) else {
            log::trace!("attachment target {id} not found, skipping");
            return None;
        };
        self.targets.push(TargetEdit {
            id,
            refs: shape.arrow_props().map(<[_]>::to_vec).unwrap_or_default(),
            dirty: false,
        });
        self.targets.last_mut()
    }

    /// Current working copy of an arrow's attachment.
    pub fn attached(&mut self, arrow_id: ShapeId) -> Option<AttachedShape> {
        self.arrow_edit(arrow_id).map(|a| a.attached)
    }

    /// Remove the binding of one arrow end from both sides.
    pub fn unlink(&mut self, arrow_id: ShapeId, end: ArrowEnd) -> bool {
        let Some(arrow) = self.arrow_edit(arrow_id) else {
            return false;
        };
        let Some(shape_id) = arrow.attached.get(end) else {
            return false;
        };
        arrow.attached.set(end, None);
        arrow.attached_dirty = true;
        if let Some(target) = self.target_edit(shape_id) {
            let before = target.refs.len();
            target.refs.retain(|r| !r.is_for(arrow_id, end));
            target.dirty |= target.refs.len() != before;
        }
        log::debug!("detached {end:?} of arrow {arrow_id} from {shape_id}");
        true
    }

    /// Bind an arrow end to `target_id` at `anchor`, replacing any previous binding of that end.
    /// The arrow endpoint is moved onto the anchor.
    pub fn link(&mut self, arrow_id: ShapeId, end: ArrowEnd, target_id: ShapeId, anchor: Anchor) -> bool {
        if arrow_id == target_id || self.target_edit(target_id).is_none() {
            return false;
        }
        if self.arrow_edit(arrow_id).is_none() {
            return false;
        }
        self.unlink(arrow_id, end);
        if let Some(arrow) = self.arrow_edit(arrow_id) {
            arrow.attached.set(end, Some(target_id));
            arrow.attached_dirty = true;
        }
        self.move_endpoint(arrow_id, end, anchor.point);
        if let Some(target) = self.target_edit(target_id) {
            target.refs.push(ArrowAttachment {
                arrow_id,
                anchor: anchor.point,
                position: end,
                direction: anchor.direction,
            });
            target.dirty = true;
        }
        true
    }

    /// Move one arrow end, marking the arrow dirty only if the point changes.
    pub fn move_endpoint(&mut self, arrow_id: ShapeId, end: ArrowEnd, point: Point) {
        let Some(arrow) = self.arrow_edit(arrow_id) else {
            return;
        };
        if endpoint_of(&arrow.points, end) == Some(point) {
            return;
        }
        set_polyline_endpoint(&mut arrow.points, end, point);
        arrow.points_dirty = true;
    }

    /// Record a new anchor for an existing back-reference.
    pub fn refresh_anchor(&mut self, target_id: ShapeId, arrow_id: ShapeId, end: ArrowEnd, anchor: Anchor) {
        let Some(target) = self.target_edit(target_id) else {
            return;
        };
        for r in target.refs.iter_mut().filter(|r| r.is_for(arrow_id, end)) {
            if r.anchor != anchor.point || r.direction != anchor.direction {
                r.anchor = anchor.point;
                r.direction = anchor.direction;
                target.dirty = true;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.arrows.iter().any(|a| a.attached_dirty || a.points_dirty)
            && !self.targets.iter().any(|t| t.dirty)
    }

    /// Emit one update per changed shape. Empty collections become `None`.
    pub fn into_updates(self) -> Vec<ShapeUpdate> {
        let mut updates = Vec::new();
        for arrow in self.arrows {
            if !arrow.attached_dirty && !arrow.points_dirty {
                continue;
            }
            let patch = ShapePatch {
                attached: arrow.attached_dirty.then(|| arrow.attached.non_empty()),
                points: arrow.points_dirty.then_some(arrow.points),
                ..Default::default()
            };
            updates.push(ShapeUpdate::new(arrow.id, patch));
        }
        for target in self.targets.into_iter().filter(|t| t.dirty) {
            updates.push(ShapeUpdate::arrow_props(target.id, non_empty_refs(target.refs)));
        }
        updates
    }
}

fn endpoint_of(points: &[Point], end: ArrowEnd) -> Option<Point> {
    match end {
        ArrowEnd::Start => points.first().copied(),
        ArrowEnd::End => points.last().copied(),
    }
}

/// Re-anchor every arrow end bound to `moved`.
///
/// Each end is placed with [`best_connection_points`] against the shape on the
/// arrow's other end (or alone, when that end is free). Only the bound end is
/// moved. The back-references on `moved` are refreshed with the new anchors.
pub fn recompute_attached_arrows<L: ShapeLookup + ?Sized>(moved: &Shape, shapes: &L) -> Vec<ShapeUpdate> {
    let Some(refs) = moved.arrow_props() else {
        return Vec::new();
    };
    let mut batch = LinkBatch::new(shapes);
    for r in refs {
        let Some(arrow) = shapes.shape(r.arrow_id).and_then(Shape::as_arrow) else {
            log::trace!("arrow {} referenced by {} is gone", r.arrow_id, moved.id());
            continue;
        };
        let other = arrow
            .attached_to(r.position.opposite())
            .filter(|id| *id != moved.id())
            .and_then(|id| shapes.shape(id));
        let anchor = match r.position {
            ArrowEnd::Start => best_connection_points(Some(moved), other).from,
            ArrowEnd::End => best_connection_points(other, Some(moved)).to,
        };
        let Some(anchor) = anchor else {
            continue;
        };
        batch.move_endpoint(arrow.id, r.position, anchor.point);
        batch.refresh_anchor(moved.id(), arrow.id, r.position, anchor);
    }
    batch.into_updates()
}

/// An arrow end whose live distance to its target exceeded the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detachment {
    pub arrow_id: ShapeId,
    pub end: ArrowEnd,
    pub shape_id: ShapeId,
}

/// Ends of `arrow` that have drifted more than `limit` from their target's anchor.
pub fn find_detachments<L: ShapeLookup + ?Sized>(arrow: &Arrow, shapes: &L, limit: f64) -> Vec<Detachment> {
    let Some(attached) = arrow.attached else {
        return Vec::new();
    };
    let mut found = Vec::new();
    for end in ArrowEnd::BOTH {
        let Some(shape_id) = attached.get(end) else {
            continue;
        };
        let Some(shape) = shapes.shape(shape_id) else {
            log::trace!("attachment target {shape_id} of arrow {} is gone", arrow.id);
            continue;
        };
        let Some(endpoint) = arrow.endpoint(end) else {
            continue;
        };
        let direction = shape
            .arrow_props()
            .and_then(|refs| refs.iter().find(|r| r.is_for(arrow.id, end)))
            .map_or(AnchorDirection::Center, |r| r.direction);
        let distance = anchor_point(shape, direction).distance(endpoint);
        if distance.is_finite() && distance > limit {
            found.push(Detachment { arrow_id: arrow.id, end, shape_id });
        }
    }
    found
}

/// Build the two-sided removal batch for a set of detachments.
pub fn detachment_updates<L: ShapeLookup + ?Sized>(detachments: &[Detachment], shapes: &L) -> Option<Vec<ShapeUpdate>> {
    let mut batch = LinkBatch::new(shapes);
    for d in detachments {
        batch.unlink(d.arrow_id, d.end);
    }
    if batch.is_empty() { None } else { Some(batch.into_updates()) }
}

/// Detach whichever ends of `arrow` exceed `limit`; `None` when nothing changes.
pub fn check_detachment<L: ShapeLookup + ?Sized>(arrow: &Arrow, shapes: &L, limit: f64) -> Option<Vec<ShapeUpdate>> {
    detachment_updates(&find_detachments(arrow, shapes, limit), shapes)
}

/// Check every arrow among `ids`, and every arrow bound to a shape among `ids`,
/// and detach as one batch.
pub fn check_detachments<L: ShapeLookup + ?Sized>(ids: &[ShapeId], shapes: &L, limit: f64) -> Option<Vec<ShapeUpdate>> {
    let mut arrow_ids: Vec<ShapeId> = Vec::new();
    let mut push = |id: ShapeId| {
        if !arrow_ids.contains(&id) {
            arrow_ids.push(id);
        }
    };
    for id in ids {
        match shapes.shape(*id) {
            Some(Shape::Arrow(arrow)) => push(arrow.id),
            Some(shape) => shape.arrow_props().unwrap_or_default().iter().for_each(|r| push(r.arrow_id)),
            None => log::trace!("detachment check for missing shape {id}"),
        }
    }
    let detachments: Vec<Detachment> = arrow_ids
        .iter()
        .filter_map(|id| shapes.shape(*id).and_then(Shape::as_arrow))
        .flat_map(|arrow| find_detachments(arrow, shapes, limit))
        .collect();
    detachment_updates(&detachments, shapes)
}

/// Check every arrow bound to `shape` and detach as one batch.
pub fn check_shape_detachments<L: ShapeLookup + ?Sized>(shape: &Shape, shapes: &L, limit: f64) -> Option<Vec<ShapeUpdate>> {
    check_detachments(&[shape.id()], shapes, limit)
}
