//! Arrow (connector) shape.

use super::freehand::points_bounds;
use super::{ArrowEnd, AttachedShape, ShapeId, ShapeKind, ShapeMeta, ShapeStyle, ShapeTrait};
use crate::config::CommitThresholds;
use crate::geometry::point_distance;
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A connector arrow: a polyline whose last point carries the arrowhead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub(crate) id: ShapeId,
    /// Ordered points, first is the start and last is the head.
    pub points: Vec<Point>,
    /// True while the arrow is still being drawn.
    #[serde(default)]
    pub is_drawing: bool,
    /// Shapes the two ends are bound to.
    #[serde(default)]
    pub attached: Option<AttachedShape>,
    /// Curve tension (0 = straight segments).
    #[serde(default)]
    pub tension: f64,
    /// Size of the arrowhead.
    pub head_size: f64,
    /// Style properties.
    pub style: ShapeStyle,
    #[serde(default)]
    pub meta: ShapeMeta,
}

impl Arrow {
    pub const DEFAULT_HEAD_SIZE: f64 = 15.0;

    /// Create a new two-point arrow.
    pub fn new(start: Point, end: Point) -> Self {
        Self::from_points(vec![start, end])
    }

    /// Create an arrow from multiple points.
    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            id: Uuid::new_v4(),
            points,
            is_drawing: false,
            attached: None,
            tension: 0.0,
            head_size: Self::DEFAULT_HEAD_SIZE,
            style: ShapeStyle::default(),
            meta: ShapeMeta::default(),
        }
    }

    /// Begin drawing an arrow at a single point.
    pub fn drawing_from(start: Point) -> Self {
        let mut arrow = Self::from_points(vec![start]);
        arrow.is_drawing = true;
        arrow
    }

    pub fn start(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn end(&self) -> Option<Point> {
        self.points.last().copied()
    }

    pub fn endpoint(&self, end: ArrowEnd) -> Option<Point> {
        match end {
            ArrowEnd::Start => self.start(),
            ArrowEnd::End => self.end(),
        }
    }

    /// Move one end of the arrow. A single-point arrow grows a second point for `End`.
    pub fn set_endpoint(&mut self, end: ArrowEnd, point: Point) {
        set_polyline_endpoint(&mut self.points, end, point);
    }

    /// Shape bound to the given end, if any.
    pub fn attached_to(&self, end: ArrowEnd) -> Option<ShapeId> {
        self.attached.as_ref().and_then(|a| a.get(end))
    }

    /// Get the direction vector of the last segment (normalized).
    pub fn direction(&self) -> Vec2 {
        let n = self.points.len();
        if n < 2 {
            return Vec2::new(1.0, 0.0);
        }
        let d = self.points[n - 1] - self.points[n - 2];
        let len = d.hypot();
        if len < f64::EPSILON {
            Vec2::new(1.0, 0.0)
        } else {
            d / len
        }
    }

    /// Total length of the polyline.
    pub fn length(&self) -> f64 {
        (0..self.points.len().saturating_sub(1))
            .map(|i| point_distance(&self.points, i))
            .sum()
    }
}

/// Replace the first or last point; a single-point list grows for `End`.
pub(crate) fn set_polyline_endpoint(points: &mut Vec<Point>, end: ArrowEnd, point: Point) {
    match (end, points.len()) {
        (_, 0) => points.push(point),
        (ArrowEnd::Start, _) => points[0] = point,
        (ArrowEnd::End, 1) => points.push(point),
        (ArrowEnd::End, n) => points[n - 1] = point,
    }
}

impl ShapeTrait for Arrow {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Arrow
    }

    fn bounds(&self) -> Rect {
        // Leave room for the arrowhead wings.
        let pad = self.head_size / 2.0 + self.style.stroke_width / 2.0;
        points_bounds(&self.points).inflate(pad, pad)
    }

    fn style(&self) -> &ShapeStyle {
        &self.style
    }

    fn style_mut(&mut self) -> &mut ShapeStyle {
        &mut self.style
    }

    fn meta(&self) -> &ShapeMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ShapeMeta {
        &mut self.meta
    }

    fn meets_commit_threshold(&self, thresholds: &CommitThresholds) -> bool {
        self.points.len() >= 2 && point_distance(&self.points, 0) > thresholds.min_arrow_length
    }
}
