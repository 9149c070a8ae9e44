//! Pointer proximity: attachment suggestions while drawing connectors and
//! eraser hit-testing.
//!
//! Both consumers walk shapes highest z-order first.

use crate::geometry::{is_near_edge, is_near_shape};
use crate::shapes::{ArrowEnd, Shape, ShapeId};
use kurbo::Point;
use std::time::Duration;

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::Instant;
#[cfg(target_arch = "wasm32")]
pub use web_time::Instant;

/// Timestamp gate: lets one call through per `interval`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    interval: Duration,
    last: Option<Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Returns true and records `now` if the interval has elapsed since the last acquisition.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        let ready = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if ready {
            self.last = Some(now);
        }
        ready
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

/// First attachable, unlocked shape whose edge is within `threshold` of `point`.
/// `shapes` must yield highest z-order first.
pub fn find_attachment_target<'a>(
    shapes: impl IntoIterator<Item = &'a Shape>,
    point: Point,
    threshold: f64,
    exclude: Option<ShapeId>,
) -> Option<&'a Shape> {
    shapes.into_iter().find(|shape| {
        shape.is_attachable()
            && !shape.is_locked()
            && Some(shape.id()) != exclude
            && is_near_edge(point, shape, threshold)
    })
}

/// Which arrow end a suggestion applies to, from the in-progress point count.
pub fn suggested_end(point_count: usize) -> ArrowEnd {
    if point_count <= 1 { ArrowEnd::Start } else { ArrowEnd::End }
}

/// Current attachment suggestion for a connector being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSuggestion {
    /// `None` when the pointer is near no target.
    pub shape_id: Option<ShapeId>,
    pub end: ArrowEnd,
}

impl AttachmentSuggestion {
    pub fn is_near(&self) -> bool {
        self.shape_id.is_some()
    }
}

/// Emits attachment suggestions only when the target changes, at a bounded rate.
#[derive(Debug, Clone)]
pub struct SuggestionTracker {
    limiter: RateLimiter,
    current: Option<AttachmentSuggestion>,
}

impl SuggestionTracker {
    pub fn new(interval: Duration) -> Self {
        Self { limiter: RateLimiter::new(interval), current: None }
    }

    pub fn current(&self) -> Option<AttachmentSuggestion> {
        self.current
    }

    /// Rate-limited recompute for pointer-move. Returns the new suggestion when it changed.
    pub fn update<'a>(
        &mut self,
        now: Instant,
        shapes: impl IntoIterator<Item = &'a Shape>,
        point: Point,
        point_count: usize,
        threshold: f64,
        exclude: Option<ShapeId>,
    ) -> Option<AttachmentSuggestion> {
        if !self.limiter.try_acquire(now) {
            return None;
        }
        self.refresh(shapes, point, point_count, threshold, exclude)
    }

    /// Unthrottled recompute, used when the gesture ends.
    pub fn refresh<'a>(
        &mut self,
        shapes: impl IntoIterator<Item = &'a Shape>,
        point: Point,
        point_count: usize,
        threshold: f64,
        exclude: Option<ShapeId>,
    ) -> Option<AttachmentSuggestion> {
        let target = find_attachment_target(shapes, point, threshold, exclude).map(Shape::id);
        let suggestion = AttachmentSuggestion { shape_id: target, end: suggested_end(point_count) };
        let changed = self.current.map(|c| c.shape_id) != Some(suggestion.shape_id);
        self.current = Some(suggestion);
        if changed {
            log::trace!("attachment suggestion {:?} for {:?}", suggestion.shape_id, suggestion.end);
            Some(suggestion)
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.limiter.reset();
    }
}

/// Accumulates shapes touched by an eraser gesture.
#[derive(Debug, Clone, Default)]
pub struct EraserSession {
    active: bool,
    hits: Vec<ShapeId>,
}

impl EraserSession {
    pub fn begin(&mut self) {
        self.active = true;
        self.hits.clear();
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn hits(&self) -> &[ShapeId] {
        &self.hits
    }

    /// Add every unlocked shape near `point`. Returns how many were new.
    pub fn sweep<'a>(&mut self, shapes: impl IntoIterator<Item = &'a Shape>, point: Point, threshold: f64) -> usize {
        if !self.active {
            return 0;
        }
        let before = self.hits.len();
        for shape in shapes {
            if !shape.is_locked() && !self.hits.contains(&shape.id()) && is_near_shape(point, shape, threshold) {
                self.hits.push(shape.id());
            }
        }
        self.hits.len() - before
    }

    /// End the gesture and hand back the accumulated ids.
    pub fn finish(&mut self) -> Vec<ShapeId> {
        self.active = false;
        std::mem::take(&mut self.hits)
    }

    pub fn cancel(&mut self) {
        self.active = false;
        self.hits.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Arrow, Ellipse, Freehand, Rectangle};
    use std::collections::HashSet;

    #[test]
    fn test_rate_limiter() {
        let start = Instant::now();
        let mut limiter = RateLimiter::new(Duration::from_millis(100));
        assert!(limiter.try_acquire(start));
        assert!(!limiter.try_acquire(start + Duration::from_millis(50)));
        assert!(limiter.try_acquire(start + Duration::from_millis(100)));
        assert!(!limiter.try_acquire(start + Duration::from_millis(150)));
        limiter.reset();
        assert!(limiter.try_acquire(start + Duration::from_millis(150)));
    }

    #[test]
    fn test_target_prefers_topmost() {
        let below: Shape = Rectangle::new(Point::ZERO, 100.0, 100.0).into();
        let above: Shape = Rectangle::new(Point::ZERO, 100.0, 100.0).into();
        let found = find_attachment_target([&above, &below], Point::new(50.0, 2.0), 10.0, None);
        assert_eq!(found.map(Shape::id), Some(above.id()));
        let found = find_attachment_target([&above, &below], Point::new(50.0, 2.0), 10.0, Some(above.id()));
        assert_eq!(found.map(Shape::id), Some(below.id()));
    }

    #[test]
    fn test_target_skips_paths_and_locked() {
        let arrow: Shape = Arrow::new(Point::new(0.0, 0.0), Point::new(100.0, 0.0)).into();
        let mut locked: Shape = Rectangle::new(Point::ZERO, 100.0, 100.0).into();
        locked.meta_mut().locked = true;
        assert!(find_attachment_target([&arrow, &locked], Point::new(50.0, 0.0), 10.0, None).is_none());
    }

    #[test]
    fn test_suggested_end() {
        assert_eq!(suggested_end(0), ArrowEnd::Start);
        assert_eq!(suggested_end(1), ArrowEnd::Start);
        assert_eq!(suggested_end(2), ArrowEnd::End);
    }

    #[test]
    fn test_tracker_emits_only_on_change() {
        let t0 = Instant::now();
        let ellipse: Shape = Ellipse::new(Point::new(100.0, 100.0), 50.0, 50.0).into();
        let shapes = [&ellipse];
        let mut tracker = SuggestionTracker::new(Duration::from_millis(100));

        let first = tracker.update(t0, shapes, Point::new(152.0, 100.0), 2, 10.0, None).unwrap();
        assert_eq!(first.shape_id, Some(ellipse.id()));
        assert_eq!(first.end, ArrowEnd::End);

        // Throttled.
        assert!(tracker.update(t0 + Duration::from_millis(10), shapes, Point::ZERO, 2, 10.0, None).is_none());
        // Same target, no emission.
        assert!(tracker.update(t0 + Duration::from_millis(120), shapes, Point::new(148.0, 100.0), 2, 10.0, None).is_none());
        // Leaving the edge is a change.
        let left = tracker.update(t0 + Duration::from_millis(240), shapes, Point::ZERO, 2, 10.0, None).unwrap();
        assert!(!left.is_near());
        assert!(tracker.current().is_some_and(|c| !c.is_near()));
    }

    #[test]
    fn test_tracker_refresh_bypasses_limiter() {
        let t0 = Instant::now();
        let rect: Shape = Rectangle::new(Point::ZERO, 100.0, 100.0).into();
        let mut tracker = SuggestionTracker::new(Duration::from_secs(10));
        assert!(tracker.update(t0, [&rect], Point::new(500.0, 500.0), 1, 10.0, None).is_some());
        let s = tracker.refresh([&rect], Point::new(0.0, 50.0), 1, 10.0, None).unwrap();
        assert_eq!(s.shape_id, Some(rect.id()));
        assert_eq!(s.end, ArrowEnd::Start);
    }

    #[test]
    fn test_eraser_collects_regardless_of_order() {
        let a: Shape = Rectangle::new(Point::new(0.0, 0.0), 50.0, 50.0).into();
        let b: Shape = Freehand::from_points(vec![
            Point::new(200.0, 0.0),
            Point::new(210.0, 10.0),
            Point::new(220.0, 20.0),
        ])
        .into();
        let c: Shape = Rectangle::new(Point::new(500.0, 500.0), 50.0, 50.0).into();
        let shapes = [&a, &b, &c];

        let mut forward = EraserSession::default();
        forward.begin();
        forward.sweep(shapes, Point::new(2.0, 25.0), 10.0);
        forward.sweep(shapes, Point::new(210.0, 12.0), 10.0);
        forward.sweep(shapes, Point::new(2.0, 25.0), 10.0);
        let forward: HashSet<_> = forward.finish().into_iter().collect();

        let mut backward = EraserSession::default();
        backward.begin();
        backward.sweep(shapes, Point::new(210.0, 12.0), 10.0);
        backward.sweep(shapes, Point::new(2.0, 25.0), 10.0);
        let backward: HashSet<_> = backward.finish().into_iter().collect();

        let expected: HashSet<_> = [a.id(), b.id()].into_iter().collect();
        assert_eq!(forward, expected);
        assert_eq!(backward, expected);
    }

    #[test]
    fn test_eraser_inactive_and_locked() {
        let mut locked: Shape = Rectangle::new(Point::ZERO, 50.0, 50.0).into();
        let mut session = EraserSession::default();
        assert_eq!(session.sweep([&locked], Point::new(2.0, 25.0), 10.0), 0);
        session.begin();
        locked.meta_mut().locked = true;
        assert_eq!(session.sweep([&locked], Point::new(2.0, 25.0), 10.0), 0);
        assert!(session.finish().is_empty());
        assert!(!session.is_active());
    }
}
