//! Tool system for the whiteboard.

use crate::config::CommitThresholds;
use crate::shapes::{Arrow, ArrowEnd, Ellipse, Freehand, Rectangle, Shape, ShapeStyle, Text};
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    #[default]
    Select,
    Rectangle,
    Ellipse,
    Arrow,
    Freehand,
    Text,
    Eraser,
}

impl ToolKind {
    /// Whether a pointer gesture with this tool produces a new shape.
    pub fn draws_shapes(self) -> bool {
        !matches!(self, ToolKind::Select | ToolKind::Eraser)
    }
}

/// State of a tool interaction.
#[derive(Debug, Clone, Default)]
pub enum ToolState {
    /// Tool is idle, waiting for interaction.
    #[default]
    Idle,
    /// Tool is actively being used (e.g., drawing a shape).
    Active {
        /// Starting point of the interaction.
        start: Point,
        /// Current point of the interaction.
        current: Point,
        /// Pending shape being drawn; not yet in the store.
        preview: Option<Shape>,
    },
}

/// Manages the current tool and the shape it is drawing.
#[derive(Debug, Clone)]
pub struct ToolManager {
    /// Currently selected tool.
    pub current_tool: ToolKind,
    /// Current state of the tool.
    pub state: ToolState,
    /// Current style to apply to new shapes.
    pub current_style: ShapeStyle,
    /// Corner radius for new rectangles (0 = sharp corners).
    pub corner_radius: f64,
    thresholds: CommitThresholds,
}

impl Default for ToolManager {
    fn default() -> Self {
        Self::new(CommitThresholds::default())
    }
}

impl ToolManager {
    pub fn new(thresholds: CommitThresholds) -> Self {
        Self {
            current_tool: ToolKind::default(),
            state: ToolState::default(),
            current_style: ShapeStyle::default(),
            corner_radius: 0.0,
            thresholds,
        }
    }

    /// Set the current tool, abandoning any interaction in progress.
    pub fn set_tool(&mut self, tool: ToolKind) {
        self.current_tool = tool;
        self.state = ToolState::Idle;
    }

    pub fn set_style(&mut self, style: ShapeStyle) {
        self.current_style = style;
    }

    /// Begin a tool interaction.
    pub fn begin(&mut self, point: Point) {
        let mut preview = self.create_shape(point);
        if let Some(shape) = &mut preview {
            shape.refresh_addable(&self.thresholds);
        }
        self.state = ToolState::Active { start: point, current: point, preview };
    }

    /// Update the current interaction and recompute the preview's addable flag.
    pub fn update(&mut self, point: Point) {
        let ToolState::Active { start, current, preview } = &mut self.state else {
            return;
        };
        *current = point;
        let Some(shape) = preview else {
            return;
        };
        match shape {
            Shape::Rectangle(rect) => rect.set_corners(*start, point),
            Shape::Ellipse(ellipse) => ellipse.set_rect(Rect::from_points(*start, point)),
            Shape::Arrow(arrow) => arrow.set_endpoint(ArrowEnd::End, point),
            Shape::Freehand(freehand) => {
                if freehand.points.last() != Some(&point) {
                    freehand.add_point(point);
                }
            }
            Shape::Text(_) => {}
        }
        shape.refresh_addable(&self.thresholds);
    }

    /// End the current interaction and return the drawn shape if it is addable.
    pub fn end(&mut self, point: Point) -> Option<Shape> {
        self.update(point);
        let ToolState::Active { preview, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        let mut shape = preview?;
        if let Shape::Arrow(arrow) = &mut shape {
            arrow.is_drawing = false;
        }
        if shape.is_addable() {
            Some(shape)
        } else {
            log::debug!("discarding {} below commit threshold", shape.kind());
            None
        }
    }

    /// Cancel the current interaction.
    pub fn cancel(&mut self) {
        self.state = ToolState::Idle;
    }

    /// Check if a tool interaction is active.
    pub fn is_active(&self) -> bool {
        matches!(self.state, ToolState::Active { .. })
    }

    /// The pending shape of the current interaction.
    pub fn preview(&self) -> Option<&Shape> {
        match &self.state {
            ToolState::Active { preview, .. } => preview.as_ref(),
            ToolState::Idle => None,
        }
    }

    fn create_shape(&self, start: Point) -> Option<Shape> {
        let mut shape: Shape = match self.current_tool {
            ToolKind::Rectangle => {
                let mut rect = Rectangle::from_corners(start, start);
                rect.corner_radius = self.corner_radius;
                rect.into()
            }
            ToolKind::Ellipse => Ellipse::from_rect(Rect::from_points(start, start)).into(),
            ToolKind::Arrow => Arrow::drawing_from(start).into(),
            ToolKind::Freehand => Freehand::from_points(vec![start]).into(),
            // Text is created at the click position with empty content
            ToolKind::Text => Text::new(start, String::new()).into(),
            ToolKind::Select | ToolKind::Eraser => return None,
        };
        *shape.style_mut() = self.current_style.clone();
        Some(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_selection() {
        let mut tm = ToolManager::default();
        assert_eq!(tm.current_tool, ToolKind::Select);

        tm.set_tool(ToolKind::Rectangle);
        assert_eq!(tm.current_tool, ToolKind::Rectangle);
        assert!(tm.current_tool.draws_shapes());
        assert!(!ToolKind::Eraser.draws_shapes());
    }

    #[test]
    fn test_rectangle_becomes_addable() {
        let mut tm = ToolManager::default();
        tm.set_tool(ToolKind::Rectangle);

        tm.begin(Point::new(0.0, 0.0));
        tm.update(Point::new(2.0, 2.0));
        assert!(!tm.preview().unwrap().is_addable());

        tm.update(Point::new(10.0, 10.0));
        assert!(tm.preview().unwrap().is_addable());

        let shape = tm.end(Point::new(10.0, 10.0));
        assert!(shape.is_some());
        assert!(!tm.is_active());
    }

    #[test]
    fn test_small_shape_is_discarded() {
        let mut tm = ToolManager::default();
        tm.set_tool(ToolKind::Ellipse);
        tm.begin(Point::new(0.0, 0.0));
        assert!(tm.end(Point::new(3.0, 3.0)).is_none());
    }

    #[test]
    fn test_arrow_drawing_flag_cleared_on_end() {
        let mut tm = ToolManager::default();
        tm.set_tool(ToolKind::Arrow);
        tm.begin(Point::new(0.0, 0.0));
        assert_eq!(tm.preview().and_then(Shape::points).map(<[_]>::len), Some(1));
        tm.update(Point::new(50.0, 0.0));
        let Some(Shape::Arrow(arrow)) = tm.end(Point::new(60.0, 0.0)) else {
            panic!("Expected Arrow shape")
        };
        assert!(!arrow.is_drawing);
        assert_eq!(arrow.points, vec![Point::new(0.0, 0.0), Point::new(60.0, 0.0)]);
    }

    #[test]
    fn test_freehand_needs_three_points() {
        let mut tm = ToolManager::default();
        tm.set_tool(ToolKind::Freehand);
        tm.begin(Point::new(0.0, 0.0));
        tm.update(Point::new(1.0, 1.0));
        assert!(!tm.preview().unwrap().is_addable());
        tm.update(Point::new(2.0, 2.0));
        assert!(tm.preview().unwrap().is_addable());
    }

    #[test]
    fn test_style_applied_to_new_shapes() {
        let mut tm = ToolManager::default();
        tm.set_tool(ToolKind::Rectangle);
        tm.current_style.stroke_width = 7.0;
        tm.begin(Point::ZERO);
        assert!((tm.preview().unwrap().style().stroke_width - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_select_tool_no_shape() {
        let mut tm = ToolManager::default();
        tm.set_tool(ToolKind::Select);

        tm.begin(Point::new(0.0, 0.0));
        assert!(tm.is_active());
        let shape = tm.end(Point::new(100.0, 100.0));
        assert!(shape.is_none());
    }
}
