//! Inkboard Core Library
//!
//! Platform-agnostic core of the Inkboard whiteboard: the shape model, the
//! arrow attachment graph, geometry, transform normalization, proximity
//! detection, the shape store and the selection coordinator.

pub mod attachment;
pub mod config;
pub mod geometry;
pub mod persistence;
pub mod proximity;
pub mod render;
pub mod selection;
pub mod shapes;
pub mod store;
pub mod tools;
pub mod transform;
pub mod whiteboard;

pub use attachment::{LinkBatch, check_detachment, check_detachments, recompute_attached_arrows};
pub use config::{CommitThresholds, ConfigError, EngineConfig};
pub use geometry::{Anchor, ConnectionPoints, anchor_point, best_connection_points, is_near_edge, is_near_shape};
pub use persistence::{MemoryPersistence, PersistOp, PersistenceApi, PersistenceError, PersistenceForwarder};
pub use proximity::{AttachmentSuggestion, EraserSession, SuggestionTracker};
pub use render::{RenderItem, RenderSurface};
pub use selection::{CombinedStyle, SelectionPurpose, SelectionState, StyleChange, StyleValue};
pub use shapes::{Shape, ShapeId, ShapePatch, ShapeStyle, ShapeUpdate};
pub use store::{ShapeLookup, ShapeStore};
pub use tools::{ToolKind, ToolManager};
pub use transform::{LiveTransform, normalize};
pub use whiteboard::Whiteboard;
