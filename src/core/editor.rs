//! Editor - wires timeline input, the composition store and the host.
//!
//! Owns every piece of mutable editor state and is driven from one thread
//! (wrap it in `Arc<Mutex<_>>` to drive it from bus handlers, see [`bind`]).
//!
//! Commit sequence for a drag:
//! 1. `DragController::release` updates the store (optimistic)
//! 2. the move/scale call goes to the host through the gate
//! 3. on `success` the composition is refetched and replaces the snapshot
//!
//! Host failures become [`Notice`]s; the local edit is not rolled back.
//!
//! [`bind`]: Editor::bind

use log::{debug, info, warn};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::event_bus::{EventBus, Subscription};
use super::host::{DuplicateMode, HostCall, HostClient, HostReply, HostResponse, SyncError};
use super::store::CompositionStore;
use crate::entities::{GeometryError, LayerGeometry};
use crate::timeline::timeline_events::*;
use crate::timeline::{detect_drag_edge, DragController, DragMode, DragOutcome, TimelineSettings};

/// User-visible, non-fatal message
#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    Sync(SyncError),
    Geometry(GeometryError),
    /// Import/export failure (message includes the context chain)
    File(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::Sync(e) => write!(f, "{}", e),
            Notice::Geometry(e) => write!(f, "{}", e),
            Notice::File(e) => write!(f, "{}", e),
        }
    }
}

pub struct Editor {
    store: CompositionStore,
    drag: DragController,
    host: HostClient,
    settings: TimelineSettings,
    notices: Vec<Notice>,
}

impl Editor {
    pub fn new(host: HostClient, settings: TimelineSettings) -> Self {
        let settings = settings.normalized();
        Self {
            store: CompositionStore::new(settings.grid_inputs()),
            drag: DragController::new(),
            host,
            settings,
            notices: Vec::new(),
        }
    }

    pub fn store(&self) -> &CompositionStore {
        &self.store
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    /// Preview geometry of the active drag, if any.
    pub fn ghost(&self) -> Option<&LayerGeometry> {
        self.drag.ghost()
    }

    /// Loading indicator: a host request is in flight.
    pub fn is_busy(&self) -> bool {
        self.host.is_busy()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, notice: Notice) {
        warn!("{}", notice);
        self.notices.push(notice);
    }

    // === Host requests ===

    fn submit(&mut self, call: HostCall) -> bool {
        match self.host.submit(call) {
            Ok(()) => true,
            Err(e) => {
                self.notify(Notice::Sync(e));
                false
            }
        }
    }

    /// Refetch the composition from the host (explicit reload).
    pub fn refresh(&mut self) -> bool {
        self.submit(HostCall::QueryComposition)
    }

    /// Panel regained focus: refetch unless a request is already running.
    pub fn focus_gained(&mut self) {
        if self.host.is_busy() {
            debug!("Focus refetch skipped, host busy");
            return;
        }
        self.refresh();
    }

    /// Ask the host to place `count` copies of a layer on the beat grid.
    pub fn duplicate_layer(&mut self, layer_index: u32, count: u32, mode: DuplicateMode) -> bool {
        if count == 0 {
            return false;
        }
        let bpm = self.settings.bpm;
        self.submit(HostCall::DuplicateLayer { layer_index, bpm, count, mode })
    }

    fn handle_response(&mut self, response: HostResponse) {
        let HostResponse { call, result } = response;
        match result {
            Ok(HostReply::Composition(comp)) => self.store.replace(comp),
            Ok(HostReply::Done) => {
                debug!("Host applied {}, refetching", call.name());
                self.refresh();
            }
            // Query failures keep the last snapshot on screen
            Err(e) => self.notify(Notice::Sync(e)),
        }
    }

    /// Handle host replies that have arrived; never blocks.
    pub fn poll_host(&mut self) {
        while let Some(response) = self.host.poll() {
            self.handle_response(response);
        }
    }

    /// Block until the host has answered everything, including follow-up refetches.
    pub fn wait_idle(&mut self) {
        while let Some(response) = self.host.wait() {
            self.handle_response(response);
        }
    }

    // === Pointer ===

    /// Press at `x` on timeline row `row`. Starts a drag when over a layer.
    pub fn pointer_pressed(&mut self, x: f64, row: usize) -> bool {
        let Some(geometry) = self.store.layer_at_row(row) else {
            return false;
        };
        let Some(edge) = detect_drag_edge(x, geometry.bounds_px(), self.settings.edge_threshold_px) else {
            return false;
        };
        let index = geometry.index;
        self.drag
            .begin(index, edge, x, self.settings.drag_mode, self.settings.snap_enabled)
    }

    pub fn pointer_moved(&mut self, x: f64) {
        if self.drag.is_dragging() {
            self.drag.update(x, &self.store);
        }
    }

    /// Release anywhere ends the gesture. Commits are refused while the host is busy.
    pub fn pointer_released(&mut self, x: f64) {
        if !self.drag.is_dragging() {
            return;
        }
        if self.host.is_busy() {
            self.drag.cancel();
            self.notify(Notice::Sync(SyncError::HostBusy));
            return;
        }

        match self.drag.release(x, &mut self.store) {
            DragOutcome::Committed(intent) => {
                self.submit(intent.to_host_call());
            }
            // Nothing is laid out on an empty grid; not worth a notice
            DragOutcome::Rejected(GeometryError::DegenerateGrid) => debug!("Drag on empty grid ignored"),
            DragOutcome::Rejected(e) => self.notify(Notice::Geometry(e)),
            DragOutcome::Cancelled | DragOutcome::NotDragging => {}
        }
    }

    // === Settings ===

    fn apply_settings(&mut self) {
        self.store.set_inputs(self.settings.grid_inputs());
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        if self.settings.set_bpm(bpm) {
            self.apply_settings();
        }
    }

    pub fn set_beats_per_bar(&mut self, beats_per_bar: u32) {
        if self.settings.set_beats_per_bar(beats_per_bar) {
            self.apply_settings();
        }
    }

    pub fn zoom_in(&mut self) {
        self.settings.zoom_in();
        self.apply_settings();
    }

    pub fn zoom_out(&mut self) {
        self.settings.zoom_out();
        self.apply_settings();
    }

    pub fn set_base_width(&mut self, width_px: f64) {
        if width_px.is_finite() && width_px > 0.0 {
            self.settings.base_width_px = width_px;
            self.apply_settings();
        }
    }

    pub fn set_snap(&mut self, enabled: bool) {
        self.settings.snap_enabled = enabled;
    }

    /// Takes effect on the next press; an active drag keeps its mode.
    pub fn set_drag_mode(&mut self, mode: DragMode) {
        self.settings.drag_mode = mode;
    }

    // === Interchange ===

    pub fn import_file(&mut self, path: &Path) -> bool {
        match self.store.import_from_file(path) {
            Ok(()) => true,
            Err(e) => {
                self.notify(Notice::File(format!("{:#}", e)));
                false
            }
        }
    }

    pub fn export_file(&mut self, path: &Path) -> bool {
        match self.store.export_to_file(path) {
            Ok(written) => {
                info!("Composition written to {}", written.display());
                true
            }
            Err(e) => {
                self.notify(Notice::File(format!("{:#}", e)));
                false
            }
        }
    }

    // === Event wiring ===

    /// Subscribe `editor` to pointer, focus and toolbar events on `bus`.
    ///
    /// Handlers live as long as the returned subscriptions; drop them when
    /// the owning view goes away. Pointer handlers are global, so a release
    /// outside the timeline still ends the drag.
    #[must_use = "dropping the subscriptions detaches the editor"]
    pub fn bind(editor: &Arc<Mutex<Editor>>, bus: &EventBus) -> Vec<Subscription> {
        fn on<E, F>(bus: &EventBus, editor: &Arc<Mutex<Editor>>, f: F) -> Subscription
        where
            E: crate::core::event_bus::Event,
            F: Fn(&mut Editor, &E) + Send + Sync + 'static,
        {
            let editor = Arc::clone(editor);
            bus.subscribe::<E, _>(move |event| {
                let mut editor = editor.lock().unwrap_or_else(|e| e.into_inner());
                f(&mut editor, event);
            })
        }

        vec![
            on(bus, editor, |ed, e: &PointerPressedEvent| {
                ed.pointer_pressed(e.x, e.row);
            }),
            on(bus, editor, |ed, e: &PointerMovedEvent| ed.pointer_moved(e.x)),
            on(bus, editor, |ed, e: &PointerReleasedEvent| ed.pointer_released(e.x)),
            on(bus, editor, |ed, _: &FocusGainedEvent| ed.focus_gained()),
            on(bus, editor, |ed, _: &ReloadCompositionEvent| {
                ed.refresh();
            }),
            on(bus, editor, |ed, e: &DuplicateLayerEvent| {
                ed.duplicate_layer(e.layer_index, e.count, e.mode);
            }),
            on(bus, editor, |ed, e: &BpmChangedEvent| ed.set_bpm(e.0)),
            on(bus, editor, |ed, e: &BeatsPerBarChangedEvent| ed.set_beats_per_bar(e.0)),
            on(bus, editor, |ed, _: &TimelineZoomInEvent| ed.zoom_in()),
            on(bus, editor, |ed, _: &TimelineZoomOutEvent| ed.zoom_out()),
            on(bus, editor, |ed, e: &TimelineResizedEvent| ed.set_base_width(e.0)),
            on(bus, editor, |ed, e: &TimelineSnapChangedEvent| ed.set_snap(e.0)),
            on(bus, editor, |ed, e: &DragModeChangedEvent| ed.set_drag_mode(e.0)),
            on(bus, editor, |ed, e: &ImportCompositionEvent| {
                ed.import_file(&e.0);
            }),
            on(bus, editor, |ed, e: &ExportCompositionEvent| {
                ed.export_file(&e.0);
            }),
        ]
    }
}
