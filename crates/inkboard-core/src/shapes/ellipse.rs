//! Ellipse shape.

use super::{ArrowAttachment, ShapeId, ShapeKind, ShapeMeta, ShapeStyle, ShapeTrait};
use crate::config::CommitThresholds;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ellipse shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub(crate) id: ShapeId,
    /// Center point.
    pub center: Point,
    /// Horizontal radius.
    pub radius_x: f64,
    /// Vertical radius.
    pub radius_y: f64,
    /// Rotation angle in degrees, clockwise around the center.
    #[serde(default)]
    pub rotation: f64,
    /// Style properties.
    pub style: ShapeStyle,
    #[serde(default)]
    pub meta: ShapeMeta,
    /// Arrows terminating on this ellipse.
    #[serde(default)]
    pub arrow_props: Option<Vec<ArrowAttachment>>,
}

impl Ellipse {
    /// Create a new ellipse.
    pub fn new(center: Point, radius_x: f64, radius_y: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            center,
            radius_x,
            radius_y,
            rotation: 0.0,
            style: ShapeStyle::default(),
            meta: ShapeMeta::default(),
            arrow_props: None,
        }
    }

    /// Create a circle.
    pub fn circle(center: Point, radius: f64) -> Self {
        Self::new(center, radius, radius)
    }

    /// Create an ellipse from a bounding rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.center(), rect.width() / 2.0, rect.height() / 2.0)
    }

    /// Reshape to fit a bounding rectangle.
    pub fn set_rect(&mut self, rect: Rect) {
        self.center = rect.center();
        self.radius_x = rect.width() / 2.0;
        self.radius_y = rect.height() / 2.0;
    }

    pub fn width(&self) -> f64 {
        self.radius_x * 2.0
    }

    pub fn height(&self) -> f64 {
        self.radius_y * 2.0
    }

    /// Distance from the center to the outline along the direction of `angle` (radians).
    pub fn radius_at(&self, angle: f64) -> f64 {
        let (sin, cos) = angle.sin_cos();
        let denom = ((self.radius_y * cos).powi(2) + (self.radius_x * sin).powi(2)).sqrt();
        if denom < f64::EPSILON {
            return 0.0;
        }
        self.radius_x * self.radius_y / denom
    }
}

impl ShapeTrait for Ellipse {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Ellipse
    }

    fn bounds(&self) -> Rect {
        Rect::new(
            self.center.x - self.radius_x,
            self.center.y - self.radius_y,
            self.center.x + self.radius_x,
            self.center.y + self.radius_y,
        )
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
        self.width() > thresholds.min_shape_extent || self.height() > thresholds.min_shape_extent
    }
}
