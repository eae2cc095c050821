//! Timeline - beat-grid settings, pointer gestures and their events
//!
//! Layers render as horizontal bars on whole grid cells; dragging a bar
//! previews a ghost and commits on release.

mod drag;
mod timeline;
pub mod timeline_events;
mod timeline_helpers;

pub use drag::{DragController, DragMode, DragOutcome, DragPhase, DragSession, MutationIntent};
pub use timeline::{TimelineSettings, BEATS_PER_BAR_CHOICES, MAX_ZOOM, MIN_ZOOM};
pub use timeline_helpers::{detect_drag_edge, pointer_delta_beats};
