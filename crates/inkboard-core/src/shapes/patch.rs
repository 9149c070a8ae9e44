//! Partial shape updates.
//!
//! Every mutation of a committed shape goes through a [`ShapeUpdate`]: the
//! interactive components compute patches and the store merges them. Fields
//! that do not apply to a variant are ignored.

use super::{
    ArrowAttachment, AttachedShape, SerializableColor, Shape, ShapeId, StrokeStyle, TextAlign, non_empty_refs,
};
use kurbo::Point;
use serde_json::{Map, Value};

/// Sparse set of shape fields. `None` leaves a field untouched.
///
/// The nested options on `fill_color`, `arrow_props` and `attached` distinguish
/// "leave alone" (`None`) from "clear" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapePatch {
    /// Top-left for boxes, center for ellipses.
    pub position: Option<Point>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    /// Degrees.
    pub rotation: Option<f64>,
    pub points: Option<Vec<Point>>,
    pub z_index: Option<i64>,
    pub locked: Option<bool>,
    pub draggable: Option<bool>,
    pub is_drawing: Option<bool>,
    pub stroke_color: Option<SerializableColor>,
    pub stroke_width: Option<f64>,
    pub fill_color: Option<Option<SerializableColor>>,
    pub stroke_style: Option<StrokeStyle>,
    pub opacity: Option<f64>,
    /// Arrow tension or rectangle corner radius.
    pub custom_edge_radius: Option<f64>,
    /// Deep-merged into the shape's property bag; `null` values delete keys.
    pub custom_properties: Option<Value>,
    pub content: Option<String>,
    pub align: Option<TextAlign>,
    pub font_size: Option<f64>,
    pub arrow_props: Option<Option<Vec<ArrowAttachment>>>,
    pub attached: Option<Option<AttachedShape>>,
}

impl ShapePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge `other` on top of `self`; fields set in `other` win.
    pub fn merge(&mut self, other: ShapePatch) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            position,
            width,
            height,
            rotation,
            points,
            z_index,
            locked,
            draggable,
            is_drawing,
            stroke_color,
            stroke_width,
            fill_color,
            stroke_style,
            opacity,
            custom_edge_radius,
            content,
            align,
            font_size,
            arrow_props,
            attached,
        );
        match (&mut self.custom_properties, other.custom_properties) {
            (Some(Value::Object(mine)), Some(incoming)) => merge_custom_properties(mine, &incoming),
            (slot, Some(incoming)) => *slot = Some(incoming),
            (_, None) => {}
        }
    }

    /// Apply to a shape in place.
    pub fn apply_to(&self, shape: &mut Shape) {
        if let Some(z) = self.z_index {
            shape.meta_mut().z_index = z;
        }
        if let Some(locked) = self.locked {
            shape.meta_mut().locked = locked;
        }
        if let Some(draggable) = self.draggable {
            shape.meta_mut().draggable = draggable;
        }
        if let Some(props) = &self.custom_properties {
            merge_custom_properties(&mut shape.meta_mut().custom_properties, props);
        }

        let style = shape.style_mut();
        if let Some(color) = self.stroke_color {
            style.stroke_color = color;
        }
        if let Some(width) = self.stroke_width {
            style.stroke_width = width;
        }
        if let Some(fill) = self.fill_color {
            style.fill_color = fill;
        }
        if let Some(stroke_style) = self.stroke_style {
            style.stroke_style = stroke_style;
        }
        if let Some(opacity) = self.opacity {
            style.opacity = opacity.clamp(0.0, 1.0);
        }

        match shape {
            Shape::Rectangle(r) => {
                if let Some(p) = self.position {
                    r.position = p;
                }
                if let Some(w) = self.width {
                    r.width = w;
                }
                if let Some(h) = self.height {
                    r.height = h;
                }
                if let Some(rot) = self.rotation {
                    r.rotation = rot;
                }
                if let Some(radius) = self.custom_edge_radius {
                    r.corner_radius = radius;
                }
                if let Some(refs) = &self.arrow_props {
                    r.arrow_props = refs.clone().and_then(non_empty_refs);
                }
            }
            Shape::Ellipse(e) => {
                if let Some(p) = self.position {
                    e.center = p;
                }
                if let Some(w) = self.width {
                    e.radius_x = w / 2.0;
                }
                if let Some(h) = self.height {
                    e.radius_y = h / 2.0;
                }
                if let Some(rot) = self.rotation {
                    e.rotation = rot;
                }
                if let Some(refs) = &self.arrow_props {
                    e.arrow_props = refs.clone().and_then(non_empty_refs);
                }
            }
            Shape::Text(t) => {
                if let Some(size) = self.font_size {
                    t.font_size = size;
                    t.fit_to_content();
                }
                if let Some(content) = &self.content {
                    t.set_content(content.clone());
                }
                if let Some(align) = self.align {
                    t.align = align;
                }
                if let Some(p) = self.position {
                    t.position = p;
                }
                if let Some(w) = self.width {
                    t.width = w;
                }
                if let Some(h) = self.height {
                    t.height = h;
                }
                if let Some(rot) = self.rotation {
                    t.rotation = rot;
                }
                if let Some(refs) = &self.arrow_props {
                    t.arrow_props = refs.clone().and_then(non_empty_refs);
                }
            }
            Shape::Freehand(f) => {
                if let Some(points) = &self.points {
                    f.points = points.clone();
                }
            }
            Shape::Arrow(a) => {
                if let Some(points) = &self.points {
                    a.points = points.clone();
                }
                if let Some(drawing) = self.is_drawing {
                    a.is_drawing = drawing;
                }
                if let Some(tension) = self.custom_edge_radius {
                    a.tension = tension;
                }
                if let Some(attached) = self.attached {
                    a.attached = attached.and_then(AttachedShape::non_empty);
                }
            }
        }
    }
}

/// A patch addressed to one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeUpdate {
    pub id: ShapeId,
    pub patch: ShapePatch,
}

impl ShapeUpdate {
    pub fn new(id: ShapeId, patch: ShapePatch) -> Self {
        Self { id, patch }
    }

    pub fn points(id: ShapeId, points: Vec<Point>) -> Self {
        Self::new(id, ShapePatch { points: Some(points), ..Default::default() })
    }

    pub fn arrow_props(id: ShapeId, refs: Option<Vec<ArrowAttachment>>) -> Self {
        Self::new(id, ShapePatch { arrow_props: Some(refs), ..Default::default() })
    }

    /// Fold updates addressed to the same shape into one, keeping first-seen order.
    pub fn coalesce(updates: Vec<ShapeUpdate>) -> Vec<ShapeUpdate> {
        let mut out: Vec<ShapeUpdate> = Vec::with_capacity(updates.len());
        for update in updates {
            match out.iter_mut().find(|u| u.id == update.id) {
                Some(existing) => existing.patch.merge(update.patch),
                None => out.push(update),
            }
        }
        out
    }
}

/// Deep-merge `incoming` into `target`. Nested objects merge recursively,
/// `null` removes the key, anything else replaces. Non-object input is ignored.
pub fn merge_custom_properties(target: &mut Map<String, Value>, incoming: &Value) {
    let Some(incoming) = incoming.as_object() else {
        log::trace!("ignoring non-object custom properties: {incoming}");
        return;
    };
    for (key, value) in incoming {
        match value {
            Value::Null => {
                target.remove(key);
            }
            Value::Object(_) => match target.get_mut(key) {
                Some(Value::Object(existing)) => merge_custom_properties(existing, value),
                _ => {
                    let mut fresh = Map::new();
                    merge_custom_properties(&mut fresh, value);
                    target.insert(key.clone(), Value::Object(fresh));
                }
            },
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Arrow, Ellipse, Rectangle};
    use serde_json::json;

    #[test]
    fn test_edge_radius_maps_per_variant() {
        let patch = ShapePatch { custom_edge_radius: Some(0.4), ..Default::default() };

        let mut rect: Shape = Rectangle::new(Point::ZERO, 10.0, 10.0).into();
        patch.apply_to(&mut rect);
        let Shape::Rectangle(r) = &rect else { panic!("Expected Rectangle shape") };
        assert!((r.corner_radius - 0.4).abs() < f64::EPSILON);

        let mut arrow: Shape = Arrow::new(Point::ZERO, Point::new(40.0, 0.0)).into();
        patch.apply_to(&mut arrow);
        let Shape::Arrow(a) = &arrow else { panic!("Expected Arrow shape") };
        assert!((a.tension - 0.4).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_properties_deep_merge() {
        let mut target = json!({"a": {"x": 1, "y": 2}, "b": 3}).as_object().unwrap().clone();
        merge_custom_properties(&mut target, &json!({"a": {"y": 5, "z": 6}, "b": null, "c": "new"}));
        assert_eq!(Value::Object(target), json!({"a": {"x": 1, "y": 5, "z": 6}, "c": "new"}));
    }

    #[test]
    fn test_ellipse_width_sets_radius() {
        let mut shape: Shape = Ellipse::new(Point::ZERO, 10.0, 10.0).into();
        ShapePatch { width: Some(50.0), height: Some(30.0), ..Default::default() }.apply_to(&mut shape);
        let Shape::Ellipse(e) = &shape else { panic!("Expected Ellipse shape") };
        assert!((e.radius_x - 25.0).abs() < f64::EPSILON);
        assert!((e.radius_y - 15.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clear_arrow_props() {
        let mut rect = Rectangle::new(Point::ZERO, 10.0, 10.0);
        rect.arrow_props = Some(vec![]);
        let mut shape: Shape = rect.into();
        ShapeUpdate::arrow_props(shape.id(), None).patch.apply_to(&mut shape);
        assert!(shape.arrow_props().is_none());
    }

    #[test]
    fn test_coalesce_merges_same_target() {
        let id = uuid::Uuid::new_v4();
        let updates = vec![
            ShapeUpdate::new(id, ShapePatch { width: Some(1.0), ..Default::default() }),
            ShapeUpdate::new(id, ShapePatch { height: Some(2.0), width: Some(3.0), ..Default::default() }),
        ];
        let merged = ShapeUpdate::coalesce(updates);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].patch.width, Some(3.0));
        assert_eq!(merged[0].patch.height, Some(2.0));
    }

    #[test]
    fn test_empty_link_collections_become_none() {
        let mut rect: Shape = Rectangle::new(Point::ZERO, 10.0, 10.0).into();
        ShapePatch { arrow_props: Some(Some(vec![])), ..Default::default() }.apply_to(&mut rect);
        assert!(rect.arrow_props().is_none());

        let mut arrow: Shape = Arrow::new(Point::ZERO, Point::new(40.0, 0.0)).into();
        ShapePatch { attached: Some(Some(AttachedShape::default())), ..Default::default() }.apply_to(&mut arrow);
        assert!(arrow.as_arrow().unwrap().attached.is_none());
    }

    #[test]
    fn test_font_size_refits_text_box() {
        let mut shape: Shape = crate::shapes::Text::new(Point::ZERO, "hello".to_string()).into();
        let before = shape.bounds();
        ShapePatch { font_size: Some(40.0), ..Default::default() }.apply_to(&mut shape);
        let after = shape.bounds();
        assert!((after.width() - before.width() * 2.0).abs() < 1e-9);
        assert!((after.height() - before.height() * 2.0).abs() < 1e-9);
    }
}
