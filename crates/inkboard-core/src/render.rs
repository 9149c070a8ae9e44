//! Boundary to the external rendering surface.

use crate::shapes::Shape;
use peniko::Color;

/// A shape as it should be painted: its own style plus selection-derived opacity.
#[derive(Debug, Clone, Copy)]
pub struct RenderItem<'a> {
    pub shape: &'a Shape,
    /// Final opacity, already multiplied with the shape's own.
    pub opacity: f64,
}

impl RenderItem<'_> {
    pub fn stroke(&self) -> Color {
        self.shape.style().stroke_with_opacity(self.opacity)
    }

    pub fn fill(&self) -> Option<Color> {
        self.shape.style().fill_with_opacity(self.opacity)
    }
}

/// Receives the full ordered shape list after every store change.
pub trait RenderSurface {
    /// `items` are back to front.
    fn shapes_changed(&mut self, items: &[RenderItem<'_>]);
}
