//! Shape definitions for the whiteboard.

pub(crate) mod arrow;
mod ellipse;
mod freehand;
mod patch;
mod rectangle;
mod text;

pub use arrow::Arrow;
pub use ellipse::Ellipse;
pub use freehand::Freehand;
pub use patch::{ShapePatch, ShapeUpdate, merge_custom_properties};
pub use rectangle::Rectangle;
pub use text::{Text, TextAlign};

use crate::config::CommitThresholds;
use kurbo::{Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerializableColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl SerializableColor {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Parse `#rgb`, `#rrggbb` or `#rrggbbaa`. Returns `None` for anything else.
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        match hex.len() {
            3 => Some(Self::new(
                channel(0..1)? * 17,
                channel(1..2)? * 17,
                channel(2..3)? * 17,
                255,
            )),
            6 => Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Some(Self::new(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => None,
        }
    }

    /// Format as `#rrggbb`, or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl From<Color> for SerializableColor {
    fn from(color: Color) -> Self {
        let rgba = color.to_rgba8();
        Self {
            r: rgba.r,
            g: rgba.g,
            b: rgba.b,
            a: rgba.a,
        }
    }
}

impl From<SerializableColor> for Color {
    fn from(color: SerializableColor) -> Self {
        Color::from_rgba8(color.r, color.g, color.b, color.a)
    }
}

/// Stroke style for outlines and connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

impl StrokeStyle {
    /// Cycle to the next stroke style.
    pub fn next(self) -> Self {
        match self {
            StrokeStyle::Solid => StrokeStyle::Dashed,
            StrokeStyle::Dashed => StrokeStyle::Dotted,
            StrokeStyle::Dotted => StrokeStyle::Solid,
        }
    }
}

/// Style properties for shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color.
    pub stroke_color: SerializableColor,
    /// Stroke width.
    pub stroke_width: f64,
    /// Fill color (None = no fill).
    pub fill_color: Option<SerializableColor>,
    /// Dash pattern of the outline.
    #[serde(default)]
    pub stroke_style: StrokeStyle,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
}

fn default_opacity() -> f64 {
    1.0
}

impl ShapeStyle {
    /// Get the stroke color as a peniko Color.
    pub fn stroke(&self) -> Color {
        self.stroke_color.into()
    }

    /// Get the stroke color with opacity applied.
    pub fn stroke_with_opacity(&self, opacity: f64) -> Color {
        with_alpha(self.stroke_color, opacity)
    }

    /// Get the fill color as a peniko Color.
    pub fn fill(&self) -> Option<Color> {
        self.fill_color.map(|c| c.into())
    }

    /// Get the fill color with opacity applied.
    pub fn fill_with_opacity(&self, opacity: f64) -> Option<Color> {
        self.fill_color.map(|c| with_alpha(c, opacity))
    }
}

fn with_alpha(color: SerializableColor, opacity: f64) -> Color {
    let alpha = (f64::from(color.a) * opacity.clamp(0.0, 1.0)) as u8;
    Color::from_rgba8(color.r, color.g, color.b, alpha)
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self {
            stroke_color: SerializableColor::black(),
            stroke_width: 2.0,
            fill_color: None,
            stroke_style: StrokeStyle::default(),
            opacity: 1.0,
        }
    }
}

/// Metadata shared by every shape variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeMeta {
    /// Layer index; kept equal to the position in the store's z-order.
    #[serde(default)]
    pub z_index: i64,
    /// Locked shapes ignore drags, transforms and the eraser.
    #[serde(default)]
    pub locked: bool,
    /// Set once the shape has crossed its minimum-extent threshold.
    #[serde(default)]
    pub addable: bool,
    #[serde(default = "default_draggable")]
    pub draggable: bool,
    /// Free-form property bag, deep-merged on update.
    #[serde(default)]
    pub custom_properties: serde_json::Map<String, serde_json::Value>,
}

fn default_draggable() -> bool {
    true
}

impl Default for ShapeMeta {
    fn default() -> Self {
        Self {
            z_index: 0,
            locked: false,
            addable: false,
            draggable: true,
            custom_properties: serde_json::Map::new(),
        }
    }
}

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Discriminant of a [`Shape`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Freehand,
    Arrow,
    Text,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::Rectangle => "rectangle",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Freehand => "freehand",
            ShapeKind::Arrow => "arrow",
            ShapeKind::Text => "text",
        };
        f.write_str(name)
    }
}

/// Named anchor on a shape's boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnchorDirection {
    Top,
    Right,
    Bottom,
    Left,
    Center,
}

impl AnchorDirection {
    /// The four edge anchors in search order.
    pub const EDGES: [AnchorDirection; 4] = [
        AnchorDirection::Top,
        AnchorDirection::Right,
        AnchorDirection::Bottom,
        AnchorDirection::Left,
    ];
}

/// Which end of an arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArrowEnd {
    Start,
    End,
}

impl ArrowEnd {
    pub const BOTH: [ArrowEnd; 2] = [ArrowEnd::Start, ArrowEnd::End];

    pub fn opposite(self) -> Self {
        match self {
            ArrowEnd::Start => ArrowEnd::End,
            ArrowEnd::End => ArrowEnd::Start,
        }
    }
}

/// Back-reference stored on an attachment target, one per arrow end bound to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrowAttachment {
    pub arrow_id: ShapeId,
    /// Anchor coordinate on the target at the time of the last sync.
    pub anchor: Point,
    pub position: ArrowEnd,
    pub direction: AnchorDirection,
}

impl ArrowAttachment {
    /// Whether this entry refers to the given arrow end.
    pub fn is_for(&self, arrow_id: ShapeId, position: ArrowEnd) -> bool {
        self.arrow_id == arrow_id && self.position == position
    }
}

/// The shapes an arrow's two ends are bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<ShapeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<ShapeId>,
}

impl AttachedShape {
    pub fn get(&self, end: ArrowEnd) -> Option<ShapeId> {
        match end {
            ArrowEnd::Start => self.start,
            ArrowEnd::End => self.end,
        }
    }

    pub fn set(&mut self, end: ArrowEnd, id: Option<ShapeId>) {
        match end {
            ArrowEnd::Start => self.start = id,
            ArrowEnd::End => self.end = id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Collapse an empty attachment to `None`.
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }
}

/// Collapse an empty back-reference list to `None`.
pub fn non_empty_refs(refs: Vec<ArrowAttachment>) -> Option<Vec<ArrowAttachment>> {
    if refs.is_empty() { None } else { Some(refs) }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    point.distance(a + seg * t)
}

/// Minimum distance from a point to a polyline (sequence of connected segments).
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [only] => point.distance(*only),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> ShapeId;

    /// Get the variant discriminant.
    fn kind(&self) -> ShapeKind;

    /// Get the bounding box in world coordinates.
    fn bounds(&self) -> Rect;

    /// Get the style.
    fn style(&self) -> &ShapeStyle;

    /// Get mutable style.
    fn style_mut(&mut self) -> &mut ShapeStyle;

    /// Get the common metadata.
    fn meta(&self) -> &ShapeMeta;

    /// Get mutable common metadata.
    fn meta_mut(&mut self) -> &mut ShapeMeta;

    /// Whether the shape is large enough to be committed to the store.
    fn meets_commit_threshold(&self, thresholds: &CommitThresholds) -> bool;
}

/// Enum wrapper for all shape types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    Rectangle(Rectangle),
    Ellipse(Ellipse),
    Freehand(Freehand),
    Arrow(Arrow),
    Text(Text),
}

impl Shape {
    fn as_trait(&self) -> &dyn ShapeTrait {
        match self {
            Shape::Rectangle(s) => s,
            Shape::Ellipse(s) => s,
            Shape::Freehand(s) => s,
            Shape::Arrow(s) => s,
            Shape::Text(s) => s,
        }
    }

    fn as_trait_mut(&mut self) -> &mut dyn ShapeTrait {
        match self {
            Shape::Rectangle(s) => s,
            Shape::Ellipse(s) => s,
            Shape::Freehand(s) => s,
            Shape::Arrow(s) => s,
            Shape::Text(s) => s,
        }
    }

    pub fn id(&self) -> ShapeId {
        self.as_trait().id()
    }

    pub fn kind(&self) -> ShapeKind {
        self.as_trait().kind()
    }

    pub fn bounds(&self) -> Rect {
        self.as_trait().bounds()
    }

    pub fn style(&self) -> &ShapeStyle {
        self.as_trait().style()
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        self.as_trait_mut().style_mut()
    }

    pub fn meta(&self) -> &ShapeMeta {
        self.as_trait().meta()
    }

    pub fn meta_mut(&mut self) -> &mut ShapeMeta {
        self.as_trait_mut().meta_mut()
    }

    pub fn meets_commit_threshold(&self, thresholds: &CommitThresholds) -> bool {
        self.as_trait().meets_commit_threshold(thresholds)
    }

    /// Recompute the addable flag; returns the new value.
    pub fn refresh_addable(&mut self, thresholds: &CommitThresholds) -> bool {
        let addable = self.meets_commit_threshold(thresholds);
        self.meta_mut().addable = addable;
        addable
    }

    pub fn is_addable(&self) -> bool {
        self.meta().addable
    }

    pub fn is_locked(&self) -> bool {
        self.meta().locked
    }

    /// Whether connector arrows may bind to this shape.
    pub fn is_attachable(&self) -> bool {
        matches!(self, Shape::Rectangle(_) | Shape::Ellipse(_) | Shape::Text(_))
    }

    /// Arrow back-references, for attachment-capable shapes that have any.
    pub fn arrow_props(&self) -> Option<&[ArrowAttachment]> {
        match self {
            Shape::Rectangle(s) => s.arrow_props.as_deref(),
            Shape::Ellipse(s) => s.arrow_props.as_deref(),
            Shape::Text(s) => s.arrow_props.as_deref(),
            Shape::Freehand(_) | Shape::Arrow(_) => None,
        }
    }

    /// Mutable slot holding the arrow back-references; `None` for variants that cannot be targets.
    pub fn arrow_props_mut(&mut self) -> Option<&mut Option<Vec<ArrowAttachment>>> {
        match self {
            Shape::Rectangle(s) => Some(&mut s.arrow_props),
            Shape::Ellipse(s) => Some(&mut s.arrow_props),
            Shape::Text(s) => Some(&mut s.arrow_props),
            Shape::Freehand(_) | Shape::Arrow(_) => None,
        }
    }

    pub fn as_arrow(&self) -> Option<&Arrow> {
        match self {
            Shape::Arrow(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_arrow_mut(&mut self) -> Option<&mut Arrow> {
        match self {
            Shape::Arrow(a) => Some(a),
            _ => None,
        }
    }

    /// Collapse empty attachment collections to `None`.
    pub fn normalize_links(&mut self) {
        if let Shape::Arrow(a) = self {
            a.attached = a.attached.and_then(AttachedShape::non_empty);
        }
        if let Some(slot) = self.arrow_props_mut() {
            *slot = slot.take().and_then(non_empty_refs);
        }
    }

    /// Regenerate the shape's ID with a new unique identifier.
    /// Attachment links are dropped since they name the old id.
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        match self {
            Shape::Rectangle(s) => {
                s.id = new_id;
                s.arrow_props = None;
            }
            Shape::Ellipse(s) => {
                s.id = new_id;
                s.arrow_props = None;
            }
            Shape::Text(s) => {
                s.id = new_id;
                s.arrow_props = None;
            }
            Shape::Freehand(s) => s.id = new_id,
            Shape::Arrow(s) => {
                s.id = new_id;
                s.attached = None;
            }
        }
    }

    /// Get the rotation angle in degrees (0 for shapes that don't support rotation).
    pub fn rotation(&self) -> f64 {
        match self {
            Shape::Rectangle(r) => r.rotation,
            Shape::Ellipse(e) => e.rotation,
            Shape::Text(t) => t.rotation,
            Shape::Freehand(_) | Shape::Arrow(_) => 0.0,
        }
    }

    /// Polyline points for path-based variants.
    pub fn points(&self) -> Option<&[Point]> {
        match self {
            Shape::Freehand(f) => Some(&f.points),
            Shape::Arrow(a) => Some(&a.points),
            _ => None,
        }
    }
}

impl From<Rectangle> for Shape {
    fn from(shape: Rectangle) -> Self {
        Shape::Rectangle(shape)
    }
}

impl From<Ellipse> for Shape {
    fn from(shape: Ellipse) -> Self {
        Shape::Ellipse(shape)
    }
}

impl From<Freehand> for Shape {
    fn from(shape: Freehand) -> Self {
        Shape::Freehand(shape)
    }
}

impl From<Arrow> for Shape {
    fn from(shape: Arrow) -> Self {
        Shape::Arrow(shape)
    }
}

impl From<Text> for Shape {
    fn from(shape: Text) -> Self {
        Shape::Text(shape)
    }
}
