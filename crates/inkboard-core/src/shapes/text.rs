//! Text shape.

use super::{ArrowAttachment, ShapeId, ShapeKind, ShapeMeta, ShapeStyle, ShapeTrait};
use crate::config::CommitThresholds;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Horizontal alignment of text lines inside the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// A multi-line text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub(crate) id: ShapeId,
    /// Position (top-left corner of text bounding box).
    pub position: Point,
    /// Bounding box width.
    pub width: f64,
    /// Bounding box height.
    pub height: f64,
    /// The text content; lines are separated by `\n`.
    pub content: String,
    #[serde(default)]
    pub align: TextAlign,
    /// Font size in pixels.
    pub font_size: f64,
    /// Rotation angle in degrees, clockwise.
    #[serde(default)]
    pub rotation: f64,
    /// Style properties.
    pub style: ShapeStyle,
    #[serde(default)]
    pub meta: ShapeMeta,
    /// Arrows terminating on this text block.
    #[serde(default)]
    pub arrow_props: Option<Vec<ArrowAttachment>>,
}

impl Text {
    /// Default font size (M = Medium).
    pub const DEFAULT_FONT_SIZE: f64 = 20.0;

    /// Approximate glyph advance as a fraction of the font size.
    const CHAR_WIDTH_FACTOR: f64 = 0.6;

    const LINE_HEIGHT_FACTOR: f64 = 1.2;

    /// Create a new text shape sized to its content.
    pub fn new(position: Point, content: String) -> Self {
        let mut text = Self {
            id: Uuid::new_v4(),
            position,
            width: 0.0,
            height: 0.0,
            content,
            align: TextAlign::default(),
            font_size: Self::DEFAULT_FONT_SIZE,
            rotation: 0.0,
            style: ShapeStyle::default(),
            meta: ShapeMeta::default(),
            arrow_props: None,
        };
        text.fit_to_content();
        text
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.content.split('\n')
    }

    pub fn line_count(&self) -> usize {
        self.lines().count()
    }

    /// Replace the content and grow the box to fit it.
    pub fn set_content(&mut self, content: String) {
        self.content = content;
        self.fit_to_content();
    }

    /// Recompute the box from the content, never shrinking below one empty line.
    pub fn fit_to_content(&mut self) {
        let longest = self.lines().map(|l| l.chars().count()).max().unwrap_or(0).max(1);
        self.width = longest as f64 * self.font_size * Self::CHAR_WIDTH_FACTOR;
        self.height = self.line_count() as f64 * self.font_size * Self::LINE_HEIGHT_FACTOR;
    }

    pub fn as_rect(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.position.x + self.width,
            self.position.y + self.height,
        )
    }
}

impl ShapeTrait for Text {
    fn id(&self) -> ShapeId {
        self.id
    }

    fn kind(&self) -> ShapeKind {
        ShapeKind::Text
    }

    fn bounds(&self) -> Rect {
        self.as_rect()
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

    /// Text is placed with a click, so it is committable as soon as it exists.
    fn meets_commit_threshold(&self, _thresholds: &CommitThresholds) -> bool {
        true
    }
}
