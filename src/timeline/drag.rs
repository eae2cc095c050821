//! Drag controller - pointer gestures against one layer.
//!
//! ```text
//!   Idle ──begin()──▶ Dragging ──release()──▶ Committing ──▶ Idle
//!                        │  ▲                     (delta 0: straight to Idle)
//!                        └──┘ update(): ghost preview only
//! ```
//!
//! While dragging, every pointer move recomputes the whole-beat delta from
//! the press position and derives a ghost geometry from a snapshot of the
//! committed one. The store is only written on release.
//!
//! Mode and snapping are captured on press and carried in the
//! [`DragSession`]; toolbar changes mid-gesture do not affect it.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use super::timeline_helpers::pointer_delta_beats;
use crate::core::host::HostCall;
use crate::core::store::CompositionStore;
use crate::entities::{DragEdge, GeometryError, LayerGeometry};

/// What a drag does to the layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragMode {
    #[default]
    Move,
    /// Edge handles trim the in/out point; the body still moves
    Scale,
}

impl std::str::FromStr for DragMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "move" => Ok(DragMode::Move),
            "scale" => Ok(DragMode::Scale),
            other => Err(format!("unknown drag mode '{}' (expected move|scale)", other)),
        }
    }
}

/// Active gesture, from press to release
#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    pub target_layer_index: u32,
    pub edge: DragEdge,
    pub start_pointer_x: f64,
    /// Latest delta (overwritten on every move, not accumulated)
    pub current_delta_beats: i64,
    pub snapping_enabled: bool,
    pub mode: DragMode,
}

impl DragSession {
    fn transform(&self, geometry: &LayerGeometry) -> Result<LayerGeometry, GeometryError> {
        match self.mode {
            DragMode::Move => Ok(geometry.move_by(self.current_delta_beats, self.snapping_enabled)),
            DragMode::Scale => geometry.scale_by(self.edge, self.current_delta_beats, self.snapping_enabled),
        }
    }
}

/// Host mutation produced by a committed drag
#[derive(Clone, Debug, PartialEq)]
pub struct MutationIntent {
    pub layer_index: u32,
    pub mode: DragMode,
    pub new_in_point: f64,
    pub new_out_point: f64,
}

impl MutationIntent {
    pub fn to_host_call(&self) -> HostCall {
        match self.mode {
            DragMode::Move => HostCall::MoveLayer {
                layer_index: self.layer_index,
                new_in_point: self.new_in_point,
            },
            DragMode::Scale => HostCall::ScaleLayer {
                layer_index: self.layer_index,
                new_in_point: self.new_in_point,
                new_out_point: self.new_out_point,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Dragging,
    Committing,
}

/// Result of a pointer release
#[derive(Clone, Debug, PartialEq)]
pub enum DragOutcome {
    /// No session was active
    NotDragging,
    /// Net delta was zero (or target vanished); nothing changed
    Cancelled,
    /// Final edit is invalid; nothing changed
    Rejected(GeometryError),
    /// Store updated; intent must be sent to the host
    Committed(MutationIntent),
}

#[derive(Debug)]
pub struct DragController {
    phase: DragPhase,
    session: Option<DragSession>,
    ghost: Option<LayerGeometry>,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            phase: DragPhase::Idle,
            session: None,
            ghost: None,
        }
    }

    pub fn phase(&self) -> DragPhase {
        self.phase
    }

    pub fn is_dragging(&self) -> bool {
        self.phase == DragPhase::Dragging
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Preview geometry, present while the delta is non-zero.
    pub fn ghost(&self) -> Option<&LayerGeometry> {
        self.ghost.as_ref()
    }

    /// Press on a layer. Ignored while another gesture is active.
    pub fn begin(&mut self, layer_index: u32, edge: DragEdge, pointer_x: f64, mode: DragMode, snapping: bool) -> bool {
        if self.phase != DragPhase::Idle {
            debug!("Drag already active, ignoring press on layer {}", layer_index);
            return false;
        }
        self.session = Some(DragSession {
            target_layer_index: layer_index,
            edge,
            start_pointer_x: pointer_x,
            current_delta_beats: 0,
            snapping_enabled: snapping,
            mode,
        });
        self.ghost = None;
        self.phase = DragPhase::Dragging;
        debug!("Drag start: layer {} {:?} {:?} snap={} x={:.1}", layer_index, edge, mode, snapping, pointer_x);
        true
    }

    /// Pointer moved. Refreshes the ghost; never touches the store.
    pub fn update(&mut self, pointer_x: f64, store: &CompositionStore) -> Option<&LayerGeometry> {
        let session = self.session.as_mut()?;
        let delta = pointer_delta_beats(session.start_pointer_x, pointer_x, store.grid());
        if delta == session.current_delta_beats && (delta == 0 || self.ghost.is_some()) {
            return self.ghost.as_ref();
        }
        session.current_delta_beats = delta;

        if delta == 0 {
            self.ghost = None;
            return None;
        }

        let Some(committed) = store.geometry(session.target_layer_index) else {
            self.ghost = None;
            return None;
        };
        match session.transform(committed) {
            Ok(ghost) => {
                trace!("Drag ghost: {} beats -> grid {}..{}", delta, ghost.grid_start, ghost.grid_end);
                self.ghost = Some(ghost);
            }
            // Keep the last valid preview
            Err(e) => trace!("Drag preview rejected at {} beats: {}", delta, e),
        }
        self.ghost.as_ref()
    }

    /// Pointer released. Applies the final delta to the store and returns
    /// the host mutation, then returns to idle whatever the outcome.
    pub fn release(&mut self, pointer_x: f64, store: &mut CompositionStore) -> DragOutcome {
        let Some(mut session) = self.session.take() else {
            return DragOutcome::NotDragging;
        };
        session.current_delta_beats =
            pointer_delta_beats(session.start_pointer_x, pointer_x, store.grid());
        self.phase = DragPhase::Committing;
        self.ghost = None;

        let outcome = Self::commit(&session, store);
        self.phase = DragPhase::Idle;
        outcome
    }

    fn commit(session: &DragSession, store: &mut CompositionStore) -> DragOutcome {
        if session.current_delta_beats == 0 {
            debug!("Drag released with no net movement");
            return DragOutcome::Cancelled;
        }
        let Some(committed) = store.geometry(session.target_layer_index) else {
            debug!("Drag target {} vanished", session.target_layer_index);
            return DragOutcome::Cancelled;
        };
        let updated = match session.transform(committed) {
            Ok(g) => g,
            Err(e) => {
                debug!("Drag commit rejected: {}", e);
                return DragOutcome::Rejected(e);
            }
        };

        let intent = MutationIntent {
            layer_index: updated.index,
            mode: session.mode,
            new_in_point: updated.in_point,
            new_out_point: updated.out_point,
        };
        store.apply_geometry(updated);
        debug!(
            "Drag commit: layer {} {:?} {} beats -> in {:.3} out {:.3}",
            intent.layer_index, intent.mode, session.current_delta_beats, intent.new_in_point, intent.new_out_point
        );
        DragOutcome::Committed(intent)
    }

    /// Abandon the gesture without touching the store.
    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            debug!("Drag cancelled");
        }
        self.ghost = None;
        self.phase = DragPhase::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Composition, GridInputs, LayerRecord};

    const EPS: f64 = 1e-9;

    /// 96 beats at 10px per beat; layer 3 spans 12s..35s (cells 25..71)
    fn store() -> CompositionStore {
        let mut store = CompositionStore::new(GridInputs {
            bpm: 120.0,
            beats_per_bar: 4,
            time_signature_top: 4,
            timeline_width_px: 960.0,
        });
        let mut comp = Composition::new("Main", 48.0, 25.0);
        comp.layers.push(LayerRecord::new(3, "Kick", 12.0, 35.0));
        store.replace(comp);
        store
    }

    #[test]
    fn test_move_three_beats_right() {
        let mut store = store();
        let mut drag = DragController::new();
        assert!(drag.begin(3, DragEdge::Both, 300.0, DragMode::Move, false));
        assert_eq!(drag.phase(), DragPhase::Dragging);

        let ghost = drag.update(330.0, &store).cloned().unwrap();
        assert_eq!(ghost.grid_start, 28);
        // Committed geometry untouched by preview
        assert_eq!(store.geometry(3).unwrap().grid_start, 25);

        let outcome = drag.release(330.0, &mut store);
        let DragOutcome::Committed(intent) = outcome else {
            panic!("expected commit, got {:?}", outcome);
        };
        assert_eq!(intent.layer_index, 3);
        assert!((intent.new_in_point - 13.5).abs() < EPS);
        assert_eq!(
            intent.to_host_call(),
            HostCall::MoveLayer { layer_index: 3, new_in_point: intent.new_in_point }
        );

        let committed = store.geometry(3).unwrap();
        assert_eq!(committed.grid_start, 28);
        assert_eq!(committed.grid_end, 74);
        assert!((committed.duration - 23.0).abs() < EPS);
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(drag.ghost().is_none());
    }

    #[test]
    fn test_latest_delta_wins() {
        let store = store();
        let mut drag = DragController::new();
        drag.begin(3, DragEdge::Both, 300.0, DragMode::Move, false);
        drag.update(350.0, &store);
        drag.update(320.0, &store);
        assert_eq!(drag.session().unwrap().current_delta_beats, 2);
        assert_eq!(drag.ghost().unwrap().grid_start, 27);

        // Back to the start: no preview
        assert!(drag.update(302.0, &store).is_none());
    }

    #[test]
    fn test_zero_delta_release_is_noop() {
        let mut store = store();
        let before = store.geometry(3).unwrap().clone();
        let mut drag = DragController::new();
        drag.begin(3, DragEdge::Both, 300.0, DragMode::Move, true);
        drag.update(340.0, &store);
        assert_eq!(drag.release(303.0, &mut store), DragOutcome::Cancelled);
        assert_eq!(store.geometry(3).unwrap(), &before);
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_release_without_session() {
        let mut store = store();
        let mut drag = DragController::new();
        assert_eq!(drag.release(10.0, &mut store), DragOutcome::NotDragging);
    }

    #[test]
    fn test_second_press_ignored_while_dragging() {
        let mut drag = DragController::new();
        assert!(drag.begin(3, DragEdge::Both, 300.0, DragMode::Move, false));
        assert!(!drag.begin(4, DragEdge::Start, 10.0, DragMode::Scale, false));
        assert_eq!(drag.session().unwrap().target_layer_index, 3);
    }

    #[test]
    fn test_scale_end_commit() {
        let mut store = store();
        let mut drag = DragController::new();
        drag.begin(3, DragEdge::End, 700.0, DragMode::Scale, false);
        let outcome = drag.release(720.0, &mut store);
        let DragOutcome::Committed(intent) = outcome else {
            panic!("expected commit, got {:?}", outcome);
        };
        assert!((intent.new_in_point - 12.0).abs() < EPS);
        assert!((intent.new_out_point - 36.0).abs() < EPS);
        assert!(matches!(intent.to_host_call(), HostCall::ScaleLayer { layer_index: 3, .. }));
        assert_eq!(store.geometry(3).unwrap().grid_end, 73);
    }

    #[test]
    fn test_snapping_scale_lands_on_rounded_lines() {
        let mut store = store();
        let mut comp = store.snapshot().clone();
        // in 12.3 / out 35.2: floor/ceil lines 25..72, rounded lines 26..71
        comp.layers.push(LayerRecord::new(4, "Hat", 12.3, 35.2));
        store.replace(comp);

        let mut drag = DragController::new();
        drag.begin(4, DragEdge::End, 500.0, DragMode::Scale, true);
        assert_eq!(drag.update(520.0, &store).unwrap().grid_end, 73);
        let DragOutcome::Committed(intent) = drag.release(520.0, &mut store) else {
            panic!("expected commit");
        };
        assert!((intent.new_in_point - 12.3).abs() < EPS);
        assert!((intent.new_out_point - 36.0).abs() < EPS);
        assert_eq!(store.geometry(4).unwrap().grid_start, 25);

        drag.begin(4, DragEdge::Start, 300.0, DragMode::Scale, true);
        let DragOutcome::Committed(intent) = drag.release(280.0, &mut store) else {
            panic!("expected commit");
        };
        assert!((intent.new_in_point - 11.5).abs() < EPS);
        assert!((intent.new_out_point - 36.0).abs() < EPS);
        assert_eq!(store.geometry(4).unwrap().grid_start, 24);
        assert_eq!(store.geometry(4).unwrap().grid_end, 73);
    }

    #[test]
    fn test_collapsing_scale_rejected_without_change() {
        let mut store = store();
        let before = store.geometry(3).unwrap().clone();
        let mut drag = DragController::new();
        drag.begin(3, DragEdge::End, 700.0, DragMode::Scale, false);

        // Valid preview first, then an invalid one keeps the last valid ghost
        drag.update(680.0, &store);
        assert_eq!(drag.ghost().unwrap().grid_end, 69);
        drag.update(0.0, &store);
        assert_eq!(drag.ghost().unwrap().grid_end, 69);

        let outcome = drag.release(0.0, &mut store);
        assert!(matches!(outcome, DragOutcome::Rejected(GeometryError::CollapsedSpan { .. })));
        assert_eq!(store.geometry(3).unwrap(), &before);
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_mode_captured_at_press() {
        let mut store = store();
        let mut drag = DragController::new();
        drag.begin(3, DragEdge::End, 700.0, DragMode::Move, false);
        // An edge grab in move mode moves the whole layer
        let DragOutcome::Committed(intent) = drag.release(720.0, &mut store) else {
            panic!("expected commit");
        };
        assert_eq!(intent.mode, DragMode::Move);
        assert!((intent.new_in_point - 13.0).abs() < EPS);
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let store = store();
        let mut drag = DragController::new();
        drag.begin(3, DragEdge::Both, 300.0, DragMode::Move, false);
        drag.update(330.0, &store);
        drag.cancel();
        assert_eq!(drag.phase(), DragPhase::Idle);
        assert!(drag.ghost().is_none());
        assert!(drag.session().is_none());
    }
}
