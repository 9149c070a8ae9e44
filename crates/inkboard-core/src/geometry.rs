//! Anchor and proximity geometry.
//!
//! Pure functions over shapes: where an arrow meets a shape's boundary, which
//! pair of anchors joins two shapes most directly, and whether a point lies
//! close to a shape's outline. Anchors are computed on the axis-aligned box;
//! rotation is not taken into account.

use crate::shapes::{AnchorDirection, Shape, point_to_polyline_dist};
use kurbo::{Point, Rect};

/// A resolved anchor: where on the shape, and which named side it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub point: Point,
    pub direction: AnchorDirection,
}

/// Result of [`best_connection_points`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConnectionPoints {
    pub from: Option<Anchor>,
    pub to: Option<Anchor>,
}

fn box_anchor(rect: Rect, direction: AnchorDirection) -> Point {
    let center = rect.center();
    match direction {
        AnchorDirection::Top => Point::new(center.x, rect.y0),
        AnchorDirection::Right => Point::new(rect.x1, center.y),
        AnchorDirection::Bottom => Point::new(center.x, rect.y1),
        AnchorDirection::Left => Point::new(rect.x0, center.y),
        AnchorDirection::Center => center,
    }
}

/// Point on the shape's boundary for the named direction.
///
/// Boxes use the midpoint of the edge, ellipses the end of the radius along
/// that axis. Variants without a closed outline fall back to their center.
pub fn anchor_point(shape: &Shape, direction: AnchorDirection) -> Point {
    match shape {
        Shape::Rectangle(r) => box_anchor(r.as_rect(), direction),
        Shape::Text(t) => box_anchor(t.as_rect(), direction),
        Shape::Ellipse(e) => match direction {
            AnchorDirection::Top => Point::new(e.center.x, e.center.y - e.radius_y),
            AnchorDirection::Right => Point::new(e.center.x + e.radius_x, e.center.y),
            AnchorDirection::Bottom => Point::new(e.center.x, e.center.y + e.radius_y),
            AnchorDirection::Left => Point::new(e.center.x - e.radius_x, e.center.y),
            AnchorDirection::Center => e.center,
        },
        Shape::Freehand(_) | Shape::Arrow(_) => shape.bounds().center(),
    }
}

fn anchor(shape: &Shape, direction: AnchorDirection) -> Anchor {
    Anchor { point: anchor_point(shape, direction), direction }
}

/// Pick the anchor pair joining `source` to `target` most directly.
///
/// With both shapes present, all 4×4 edge pairs are compared and the first
/// minimum in TOP, RIGHT, BOTTOM, LEFT order wins. With one side present only
/// that side's CENTER anchor is returned.
pub fn best_connection_points(source: Option<&Shape>, target: Option<&Shape>) -> ConnectionPoints {
    match (source, target) {
        (Some(source), Some(target)) => {
            let mut best: Option<(f64, Anchor, Anchor)> = None;
            for from_dir in AnchorDirection::EDGES {
                let from = anchor(source, from_dir);
                for to_dir in AnchorDirection::EDGES {
                    let to = anchor(target, to_dir);
                    let dist = from.point.distance(to.point);
                    if !dist.is_finite() {
                        continue;
                    }
                    if best.is_none_or(|(d, _, _)| dist < d) {
                        best = Some((dist, from, to));
                    }
                }
            }
            match best {
                Some((_, from, to)) => ConnectionPoints { from: Some(from), to: Some(to) },
                None => ConnectionPoints::default(),
            }
        }
        (Some(source), None) => ConnectionPoints {
            from: Some(anchor(source, AnchorDirection::Center)),
            to: None,
        },
        (None, Some(target)) => ConnectionPoints {
            from: None,
            to: Some(anchor(target, AnchorDirection::Center)),
        },
        (None, None) => ConnectionPoints::default(),
    }
}

/// Whether `point` lies within `threshold` of the shape's outline.
///
/// Ellipses compare the point's distance from the center with the radius in
/// that direction. Boxes test each edge separately; an edge only counts while
/// the point is within its span, extended by `threshold` at both ends.
/// Variants without a closed outline are never near an edge.
pub fn is_near_edge(point: Point, shape: &Shape, threshold: f64) -> bool {
    if !point.is_finite() || !threshold.is_finite() {
        return false;
    }
    match shape {
        Shape::Rectangle(r) => near_box_edge(point, r.as_rect(), threshold),
        Shape::Text(t) => near_box_edge(point, t.as_rect(), threshold),
        Shape::Ellipse(e) => {
            if e.radius_x <= 0.0 || e.radius_y <= 0.0 {
                return false;
            }
            let offset = point - e.center;
            let radius = e.radius_at(offset.y.atan2(offset.x));
            (offset.hypot() - radius).abs() <= threshold
        }
        Shape::Freehand(_) | Shape::Arrow(_) => false,
    }
}

fn near_box_edge(point: Point, rect: Rect, threshold: f64) -> bool {
    let within_x = point.x >= rect.x0 - threshold && point.x <= rect.x1 + threshold;
    let within_y = point.y >= rect.y0 - threshold && point.y <= rect.y1 + threshold;

    let top = (point.y - rect.y0).abs() <= threshold && within_x;
    let bottom = (point.y - rect.y1).abs() <= threshold && within_x;
    let left = (point.x - rect.x0).abs() <= threshold && within_y;
    let right = (point.x - rect.x1).abs() <= threshold && within_y;

    top || bottom || left || right
}

/// Eraser hit test: outline proximity for closed shapes, polyline distance
/// (widened by half the stroke) for paths.
pub fn is_near_shape(point: Point, shape: &Shape, threshold: f64) -> bool {
    match shape.points() {
        Some(points) => {
            let reach = threshold + shape.style().stroke_width / 2.0;
            point_to_polyline_dist(point, points) <= reach
        }
        None => is_near_edge(point, shape, threshold),
    }
}

/// Distance between the point at `index` and the one after it; 0 when either is missing.
pub fn point_distance(points: &[Point], index: usize) -> f64 {
    let next = index.checked_add(1).and_then(|i| points.get(i));
    match (points.get(index), next) {
        (Some(a), Some(b)) => a.distance(*b),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Arrow, Ellipse, Freehand, Rectangle, Text};

    fn rect(x: f64, y: f64, w: f64, h: f64) -> Shape {
        Rectangle::new(Point::new(x, y), w, h).into()
    }

    #[test]
    fn test_rectangle_anchors() {
        let r = rect(0.0, 0.0, 100.0, 50.0);
        assert_eq!(anchor_point(&r, AnchorDirection::Top), Point::new(50.0, 0.0));
        assert_eq!(anchor_point(&r, AnchorDirection::Right), Point::new(100.0, 25.0));
        assert_eq!(anchor_point(&r, AnchorDirection::Bottom), Point::new(50.0, 50.0));
        assert_eq!(anchor_point(&r, AnchorDirection::Left), Point::new(0.0, 25.0));
        assert_eq!(anchor_point(&r, AnchorDirection::Center), Point::new(50.0, 25.0));
    }

    #[test]
    fn test_ellipse_anchors() {
        let e: Shape = Ellipse::new(Point::new(100.0, 100.0), 40.0, 20.0).into();
        assert_eq!(anchor_point(&e, AnchorDirection::Top), Point::new(100.0, 80.0));
        assert_eq!(anchor_point(&e, AnchorDirection::Right), Point::new(140.0, 100.0));
        assert_eq!(anchor_point(&e, AnchorDirection::Center), Point::new(100.0, 100.0));
    }

    #[test]
    fn test_unsupported_variant_anchors_at_center() {
        let mut free = Freehand::from_points(vec![Point::new(0.0, 0.0), Point::new(10.0, 20.0)]);
        free.style.stroke_width = 0.0;
        let shape: Shape = free.into();
        assert_eq!(anchor_point(&shape, AnchorDirection::Top), Point::new(5.0, 10.0));
    }

    #[test]
    fn test_side_by_side_rectangles_use_facing_edges() {
        let left = rect(0.0, 0.0, 100.0, 100.0);
        let right = rect(200.0, 0.0, 100.0, 100.0);
        let best = best_connection_points(Some(&left), Some(&right));
        assert_eq!(best.from.unwrap().direction, AnchorDirection::Right);
        assert_eq!(best.to.unwrap().direction, AnchorDirection::Left);
        assert_eq!(best.from.unwrap().point, Point::new(100.0, 50.0));
        assert_eq!(best.to.unwrap().point, Point::new(200.0, 50.0));
    }

    #[test]
    fn test_stacked_rectangles_use_bottom_to_top() {
        let upper = rect(0.0, 0.0, 100.0, 100.0);
        let lower = rect(0.0, 300.0, 100.0, 100.0);
        let best = best_connection_points(Some(&upper), Some(&lower));
        assert_eq!(best.from.unwrap().direction, AnchorDirection::Bottom);
        assert_eq!(best.to.unwrap().direction, AnchorDirection::Top);
    }

    #[test]
    fn test_tie_goes_to_first_in_enumeration_order() {
        // Identical shapes: every same-side pair has distance 0, TOP/TOP comes first.
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let b = rect(0.0, 0.0, 100.0, 100.0);
        let best = best_connection_points(Some(&a), Some(&b));
        assert_eq!(best.from.unwrap().direction, AnchorDirection::Top);
        assert_eq!(best.to.unwrap().direction, AnchorDirection::Top);
    }

    #[test]
    fn test_one_sided_returns_center_only() {
        let a = rect(0.0, 0.0, 100.0, 100.0);
        let only_source = best_connection_points(Some(&a), None);
        assert_eq!(only_source.from.unwrap().direction, AnchorDirection::Center);
        assert!(only_source.to.is_none());

        let only_target = best_connection_points(None, Some(&a));
        assert!(only_target.from.is_none());
        assert_eq!(only_target.to.unwrap().point, Point::new(50.0, 50.0));

        assert_eq!(best_connection_points(None, None), ConnectionPoints::default());
    }

    #[test]
    fn test_near_rectangle_edges() {
        let r = rect(0.0, 0.0, 100.0, 100.0);
        assert!(is_near_edge(Point::new(50.0, 5.0), &r, 10.0));
        assert!(is_near_edge(Point::new(108.0, 50.0), &r, 10.0));
        // Deep inside is not near any edge.
        assert!(!is_near_edge(Point::new(50.0, 50.0), &r, 10.0));
        // On the line of the top edge but past its extended span.
        assert!(!is_near_edge(Point::new(130.0, 0.0), &r, 10.0));
        // Within the extension at the corner.
        assert!(is_near_edge(Point::new(-8.0, 2.0), &r, 10.0));
    }

    #[test]
    fn test_near_text_box() {
        let t: Shape = Text::new(Point::new(0.0, 0.0), "hello".to_string()).into();
        let b = t.bounds();
        assert!(is_near_edge(Point::new(b.x1 + 3.0, b.center().y), &t, 10.0));
    }

    #[test]
    fn test_near_ellipse_outline() {
        let e: Shape = Ellipse::new(Point::new(0.0, 0.0), 50.0, 25.0).into();
        assert!(is_near_edge(Point::new(55.0, 0.0), &e, 10.0));
        assert!(is_near_edge(Point::new(0.0, -30.0), &e, 10.0));
        assert!(!is_near_edge(Point::new(0.0, 0.0), &e, 10.0));
        assert!(!is_near_edge(Point::new(80.0, 0.0), &e, 10.0));
    }

    #[test]
    fn test_paths_are_never_near_edge() {
        let a: Shape = Arrow::new(Point::ZERO, Point::new(100.0, 0.0)).into();
        assert!(!is_near_edge(Point::new(50.0, 0.0), &a, 10.0));
        assert!(is_near_shape(Point::new(50.0, 5.0), &a, 10.0));
        assert!(!is_near_shape(Point::new(50.0, 40.0), &a, 10.0));
    }

    #[test]
    fn test_nan_point_is_never_near() {
        let r = rect(0.0, 0.0, 100.0, 100.0);
        assert!(!is_near_edge(Point::new(f64::NAN, 0.0), &r, 10.0));
    }

    #[test]
    fn test_point_distance() {
        let pts = [Point::new(0.0, 0.0), Point::new(3.0, 4.0)];
        assert!((point_distance(&pts, 0) - 5.0).abs() < f64::EPSILON);
        assert_eq!(point_distance(&pts, 1), 0.0);
        assert_eq!(point_distance(&pts, usize::MAX), 0.0);
        assert_eq!(point_distance(&[], 0), 0.0);
    }
}
