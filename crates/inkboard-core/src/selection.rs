//! Selection state and style fan-out.

use crate::shapes::{SerializableColor, Shape, ShapeId, ShapePatch, ShapeUpdate, StrokeStyle};
use crate::store::ShapeLookup;
use serde_json::Value;

/// Why the current shapes are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionPurpose {
    #[default]
    Default,
    ForEditing,
    /// Marked by the eraser; rendered dimmed until the gesture ends.
    ForDeleting,
}

/// Selected shape ids and purpose. Transient; never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionState {
    ids: Vec<ShapeId>,
    purpose: SelectionPurpose,
}

impl SelectionState {
    pub fn ids(&self) -> &[ShapeId] {
        &self.ids
    }

    pub fn purpose(&self) -> SelectionPurpose {
        self.purpose
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.ids.contains(&id)
    }

    /// The selected id when exactly one shape is selected.
    pub fn single(&self) -> Option<ShapeId> {
        match self.ids.as_slice() {
            [id] => Some(*id),
            _ => None,
        }
    }

    /// Replace the selection with one shape.
    pub fn select(&mut self, id: ShapeId, purpose: SelectionPurpose) {
        self.ids.clear();
        self.ids.push(id);
        self.purpose = purpose;
    }

    /// Replace the selection with several shapes, dropping duplicates.
    pub fn select_many(&mut self, ids: impl IntoIterator<Item = ShapeId>, purpose: SelectionPurpose) {
        self.ids.clear();
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
        self.purpose = purpose;
    }

    /// Add to the selection, keeping the current purpose.
    pub fn add(&mut self, id: ShapeId) {
        if !self.ids.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn remove(&mut self, id: ShapeId) {
        self.ids.retain(|&selected| selected != id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.purpose = SelectionPurpose::Default;
    }

    /// Forget ids that no longer resolve.
    pub fn retain_existing<L: ShapeLookup + ?Sized>(&mut self, shapes: &L) {
        self.ids.retain(|id| shapes.shape(*id).is_some());
        if self.ids.is_empty() {
            self.purpose = SelectionPurpose::Default;
        }
    }

    /// Opacity multiplier for a shape: dimmed while pending deletion.
    pub fn display_opacity(&self, id: ShapeId, pending_delete_opacity: f64) -> f64 {
        if self.purpose == SelectionPurpose::ForDeleting && self.contains(id) {
            pending_delete_opacity
        } else {
            1.0
        }
    }

    /// Resolve each style property across the selected shapes.
    pub fn combined_style<L: ShapeLookup + ?Sized>(&self, shapes: &L) -> CombinedStyle {
        let selected: Vec<&Shape> = self.ids.iter().filter_map(|id| shapes.shape(*id)).collect();
        let styles = || selected.iter().map(|s| s.style());
        CombinedStyle {
            stroke_color: combine(styles().map(|s| s.stroke_color)),
            stroke_width: combine(styles().map(|s| s.stroke_width)),
            fill_color: combine(styles().map(|s| s.fill_color)),
            stroke_style: combine(styles().map(|s| s.stroke_style)),
            opacity: combine(styles().map(|s| s.opacity)),
            font_size: combine(selected.iter().filter_map(|s| match s {
                Shape::Text(t) => Some(t.font_size),
                _ => None,
            })),
        }
    }

    /// One update per selected shape, writing the same value to all of them.
    pub fn style_updates<L: ShapeLookup + ?Sized>(&self, change: &StyleChange, shapes: &L) -> Vec<ShapeUpdate> {
        self.ids
            .iter()
            .filter_map(|id| shapes.shape(*id))
            .filter(|shape| change.applies_to(shape))
            .map(|shape| ShapeUpdate::new(shape.id(), change.to_patch()))
            .collect()
    }
}

/// A property value across a selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StyleValue<T> {
    /// Every selected shape has this value.
    Uniform(T),
    /// Selected shapes disagree.
    Mixed,
}

impl<T> StyleValue<T> {
    pub fn is_mixed(&self) -> bool {
        matches!(self, StyleValue::Mixed)
    }

    pub fn uniform(self) -> Option<T> {
        match self {
            StyleValue::Uniform(value) => Some(value),
            StyleValue::Mixed => None,
        }
    }
}

/// `None` when no value is present at all.
fn combine<T: PartialEq>(mut values: impl Iterator<Item = T>) -> Option<StyleValue<T>> {
    let first = values.next()?;
    for value in values {
        if value != first {
            return Some(StyleValue::Mixed);
        }
    }
    Some(StyleValue::Uniform(first))
}

/// Style properties resolved across a selection; `None` where no selected shape has the property.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedStyle {
    pub stroke_color: Option<StyleValue<SerializableColor>>,
    pub stroke_width: Option<StyleValue<f64>>,
    pub fill_color: Option<StyleValue<Option<SerializableColor>>>,
    pub stroke_style: Option<StyleValue<StrokeStyle>>,
    pub opacity: Option<StyleValue<f64>>,
    pub font_size: Option<StyleValue<f64>>,
}

/// A single property change fanned out to the selection.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleChange {
    StrokeColor(SerializableColor),
    StrokeWidth(f64),
    FillColor(Option<SerializableColor>),
    StrokeStyle(StrokeStyle),
    Opacity(f64),
    FontSize(f64),
    /// Corner radius for rectangles, tension for arrows.
    EdgeRadius(f64),
    CustomProperties(Value),
}

impl StyleChange {
    fn applies_to(&self, shape: &Shape) -> bool {
        match self {
            StyleChange::FontSize(_) => matches!(shape, Shape::Text(_)),
            StyleChange::EdgeRadius(_) => matches!(shape, Shape::Rectangle(_) | Shape::Arrow(_)),
            _ => true,
        }
    }

    pub fn to_patch(&self) -> ShapePatch {
        let mut patch = ShapePatch::default();
        match self {
            StyleChange::StrokeColor(color) => patch.stroke_color = Some(*color),
            StyleChange::StrokeWidth(width) => patch.stroke_width = Some(*width),
            StyleChange::FillColor(fill) => patch.fill_color = Some(*fill),
            StyleChange::StrokeStyle(style) => patch.stroke_style = Some(*style),
            StyleChange::Opacity(opacity) => patch.opacity = Some(*opacity),
            StyleChange::FontSize(size) => patch.font_size = Some(*size),
            StyleChange::EdgeRadius(radius) => patch.custom_edge_radius = Some(*radius),
            StyleChange::CustomProperties(props) => patch.custom_properties = Some(props.clone()),
        }
        patch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Rectangle, Text};
    use kurbo::Point;
    use std::collections::HashMap;

    fn stroked(hex: &str) -> Shape {
        let mut rect = Rectangle::new(Point::ZERO, 10.0, 10.0);
        rect.style.stroke_color = SerializableColor::from_hex(hex).unwrap();
        rect.into()
    }

    fn store_of(shapes: &[Shape]) -> HashMap<ShapeId, Shape> {
        shapes.iter().map(|s| (s.id(), s.clone())).collect()
    }

    #[test]
    fn test_mixed_stroke_then_uniform_apply() {
        let (a, b) = (stroked("#000"), stroked("#FFF"));
        let mut shapes = store_of(&[a.clone(), b.clone()]);
        let mut selection = SelectionState::default();
        selection.select_many([a.id(), b.id()], SelectionPurpose::ForEditing);

        let combined = selection.combined_style(&shapes);
        assert!(combined.stroke_color.is_some_and(|v| v.is_mixed()));
        assert_eq!(combined.stroke_color, Some(StyleValue::Mixed));
        assert_eq!(combined.stroke_width, Some(StyleValue::Uniform(2.0)));
        assert_eq!(combined.font_size, None);

        let red = SerializableColor::from_hex("#F00").unwrap();
        let updates = selection.style_updates(&StyleChange::StrokeColor(red), &shapes);
        assert_eq!(updates.len(), 2);
        for u in &updates {
            if let Some(shape) = shapes.get_mut(&u.id) {
                u.patch.apply_to(shape);
            }
        }
        let combined = selection.combined_style(&shapes);
        assert_eq!(combined.stroke_color, Some(StyleValue::Uniform(red)));
    }

    #[test]
    fn test_font_size_only_for_text() {
        let rect = stroked("#000");
        let text: Shape = Text::new(Point::ZERO, "hi".to_string()).into();
        let shapes = store_of(&[rect.clone(), text.clone()]);
        let mut selection = SelectionState::default();
        selection.select_many([rect.id(), text.id()], SelectionPurpose::Default);

        assert_eq!(selection.combined_style(&shapes).font_size, Some(StyleValue::Uniform(20.0)));
        let updates = selection.style_updates(&StyleChange::FontSize(32.0), &shapes);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id, text.id());
    }

    #[test]
    fn test_pending_delete_opacity() {
        let id = uuid::Uuid::new_v4();
        let other = uuid::Uuid::new_v4();
        let mut selection = SelectionState::default();
        selection.select(id, SelectionPurpose::ForEditing);
        assert!((selection.display_opacity(id, 0.5) - 1.0).abs() < f64::EPSILON);
        selection.select_many([id, id], SelectionPurpose::ForDeleting);
        assert_eq!(selection.len(), 1);
        assert!((selection.display_opacity(id, 0.5) - 0.5).abs() < f64::EPSILON);
        assert!((selection.display_opacity(other, 0.5) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_retain_existing_resets_purpose() {
        let shapes: HashMap<ShapeId, Shape> = HashMap::new();
        let mut selection = SelectionState::default();
        selection.select(uuid::Uuid::new_v4(), SelectionPurpose::ForDeleting);
        selection.retain_existing(&shapes);
        assert!(selection.is_empty());
        assert_eq!(selection.purpose(), SelectionPurpose::Default);
    }

    #[test]
    fn test_empty_selection_has_no_style() {
        let shapes: HashMap<ShapeId, Shape> = HashMap::new();
        let selection = SelectionState::default();
        assert_eq!(selection.combined_style(&shapes), CombinedStyle::default());
    }
}
