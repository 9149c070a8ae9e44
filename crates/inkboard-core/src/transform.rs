//! Transform normalization.
//!
//! While a drag/resize/rotate gesture is running, the host keeps a
//! [`LiveTransform`] per node instead of touching shape fields. When the
//! gesture ends that state is folded into persisted geometry and the live
//! transform is reset, so later reads are not double-scaled.

use crate::shapes::{Shape, ShapePatch, ShapeUpdate};
use kurbo::{Affine, Point, Vec2};

/// Ephemeral transform of one node.
///
/// For boxes `(x, y)` is the node position (top-left, or center for
/// ellipses). For path shapes it is the offset of the enclosing group, which
/// starts at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveTransform {
    pub x: f64,
    pub y: f64,
    /// Degrees.
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew_x: f64,
    pub skew_y: f64,
}

impl Default for LiveTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LiveTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        skew_x: 0.0,
        skew_y: 0.0,
    };

    /// The resting transform of a shape: its own position and rotation, unit scale.
    pub fn for_shape(shape: &Shape) -> Self {
        let origin = match shape {
            Shape::Rectangle(r) => r.position,
            Shape::Ellipse(e) => e.center,
            Shape::Text(t) => t.position,
            Shape::Freehand(_) | Shape::Arrow(_) => Point::ZERO,
        };
        Self {
            x: origin.x,
            y: origin.y,
            rotation: shape.rotation(),
            ..Self::IDENTITY
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.rotation, self.scale_x, self.scale_y, self.skew_x, self.skew_y]
            .iter()
            .all(|v| v.is_finite())
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Absolute transform: translate, then rotate, skew and scale about the node origin.
    pub fn to_affine(&self) -> Affine {
        Affine::translate((self.x, self.y))
            * Affine::rotate(self.rotation.to_radians())
            * Affine::skew(self.skew_x, self.skew_y)
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }
}

/// Fold `live` into `shape`'s persisted geometry and reset `live`.
///
/// Boxes get rounded width/height (floored at `min_size`), position and
/// rotation. Path shapes get every point remapped through the live transform,
/// which is then reset to identity. Returns `None` when the input is not
/// finite, when the transform is degenerate, or when nothing changes.
pub fn normalize(shape: &Shape, live: &mut LiveTransform, min_size: f64) -> Option<ShapeUpdate> {
    if !live.is_finite() {
        log::trace!("ignoring non-finite transform for {}", shape.id());
        return None;
    }
    let patch = match shape {
        Shape::Rectangle(r) => box_patch(live, r.width, r.height, min_size),
        Shape::Text(t) => box_patch(live, t.width, t.height, min_size),
        Shape::Ellipse(e) => box_patch(live, e.width(), e.height(), min_size),
        Shape::Freehand(_) | Shape::Arrow(_) => {
            let affine = live.to_affine();
            if affine.determinant().abs() < f64::EPSILON {
                log::trace!("ignoring degenerate transform for {}", shape.id());
                return None;
            }
            let points = shape.points().unwrap_or_default();
            let mapped: Vec<Point> = points.iter().map(|p| affine * *p).collect();
            *live = LiveTransform::IDENTITY;
            ShapePatch { points: Some(mapped), ..Default::default() }
        }
    };

    let mut normalized = shape.clone();
    patch.apply_to(&mut normalized);
    if normalized == *shape {
        return None;
    }
    Some(ShapeUpdate::new(shape.id(), patch))
}

fn box_patch(live: &mut LiveTransform, width: f64, height: f64, min_size: f64) -> ShapePatch {
    let width = (width * live.scale_x.abs()).max(min_size).round();
    let height = (height * live.scale_y.abs()).max(min_size).round();
    let position = Point::new(live.x.round(), live.y.round());
    let rotation = live.rotation.round();
    *live = LiveTransform {
        x: position.x,
        y: position.y,
        rotation,
        ..LiveTransform::IDENTITY
    };
    ShapePatch {
        position: Some(position),
        width: Some(width),
        height: Some(height),
        rotation: Some(rotation),
        ..Default::default()
    }
}

/// Normalize every node of a multi-selection independently; the caller applies
/// the result as one batch.
pub fn normalize_many<'a>(
    nodes: impl IntoIterator<Item = (&'a Shape, &'a mut LiveTransform)>,
    min_size: f64,
) -> Vec<ShapeUpdate> {
    nodes
        .into_iter()
        .filter_map(|(shape, live)| normalize(shape, live, min_size))
        .collect()
}

/// Update that moves a shape by `delta`. `None` for a non-finite or zero delta.
pub fn translation(shape: &Shape, delta: Vec2) -> Option<ShapeUpdate> {
    if !delta.is_finite() || delta == Vec2::ZERO {
        return None;
    }
    let patch = match shape {
        Shape::Rectangle(r) => ShapePatch { position: Some(r.position + delta), ..Default::default() },
        Shape::Ellipse(e) => ShapePatch { position: Some(e.center + delta), ..Default::default() },
        Shape::Text(t) => ShapePatch { position: Some(t.position + delta), ..Default::default() },
        Shape::Freehand(_) | Shape::Arrow(_) => {
            let points = shape.points().unwrap_or_default();
            ShapePatch {
                points: Some(points.iter().map(|p| *p + delta).collect()),
                ..Default::default()
            }
        }
    };
    Some(ShapeUpdate::new(shape.id(), patch))
}
