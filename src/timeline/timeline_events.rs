//! Timeline events.

use std::path::PathBuf;

use super::drag::DragMode;
use crate::core::host::DuplicateMode;

// === Pointer (global capture) ===

/// Pointer pressed over a timeline row
#[derive(Clone, Debug)]
pub struct PointerPressedEvent {
    pub x: f64,
    pub row: usize,
}

#[derive(Clone, Debug)]
pub struct PointerMovedEvent {
    pub x: f64,
}

/// Pointer released anywhere, including outside the timeline
#[derive(Clone, Debug)]
pub struct PointerReleasedEvent {
    pub x: f64,
}

// === Host sync ===

/// Panel regained focus; the host composition may have changed
#[derive(Clone, Debug)]
pub struct FocusGainedEvent;

#[derive(Clone, Debug)]
pub struct ReloadCompositionEvent;

#[derive(Clone, Debug)]
pub struct DuplicateLayerEvent {
    pub layer_index: u32,
    pub count: u32,
    pub mode: DuplicateMode,
}

// === Toolbar ===

#[derive(Clone, Debug)]
pub struct BpmChangedEvent(pub f64);

#[derive(Clone, Debug)]
pub struct BeatsPerBarChangedEvent(pub u32);

#[derive(Clone, Debug)]
pub struct TimelineZoomInEvent;

#[derive(Clone, Debug)]
pub struct TimelineZoomOutEvent;

/// Timeline container resized (width at zoom 1.0)
#[derive(Clone, Debug)]
pub struct TimelineResizedEvent(pub f64);

#[derive(Clone, Debug)]
pub struct TimelineSnapChangedEvent(pub bool);

#[derive(Clone, Debug)]
pub struct DragModeChangedEvent(pub DragMode);

#[derive(Clone, Debug)]
pub struct ImportCompositionEvent(pub PathBuf);

#[derive(Clone, Debug)]
pub struct ExportCompositionEvent(pub PathBuf);
