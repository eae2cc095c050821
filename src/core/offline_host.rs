//! In-memory host: holds one composition and answers bridge calls the way
//! the authoring host scripts do (same reply strings, same edits).
//!
//! Used by the command-line driver and by tests that need a real round trip
//! through [`HostClient`](super::host::HostClient).

use log::{debug, trace};
use std::sync::Mutex;

use super::host::{DuplicateMode, HostBridge, HostCall, SyncError};
use crate::entities::{Composition, LayerRecord};

const SUCCESS: &str = "success";
const NO_COMPOSITION: &str = "No active composition found.";
const LAYER_NOT_FOUND: &str = "Layer not found";

#[derive(Debug, Default)]
pub struct OfflineHost {
    active: Mutex<Option<Composition>>,
}

impl OfflineHost {
    pub fn new(comp: Composition) -> Self {
        Self {
            active: Mutex::new(Some(comp)),
        }
    }

    /// Host with no active composition.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Current host-side state.
    pub fn composition(&self) -> Option<Composition> {
        self.active.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_composition(&self, comp: Option<Composition>) {
        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = comp;
    }

    fn query(comp: Option<&Composition>) -> String {
        let Some(comp) = comp else {
            return serde_json::json!({ "error": NO_COMPOSITION }).to_string();
        };
        serde_json::to_string(comp)
            .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }).to_string())
    }

    fn mutate(comp: &mut Composition, call: &HostCall) -> Result<(), String> {
        match *call {
            HostCall::QueryComposition => Ok(()),
            HostCall::MoveLayer { layer_index, new_in_point } => {
                let comp_duration = comp.duration;
                let layer = comp.layer_mut(layer_index).ok_or(LAYER_NOT_FOUND)?;
                // Shift the whole layer; length is preserved up to the comp end
                let out_point = (new_in_point + layer.duration).min(comp_duration);
                layer.set_span(new_in_point.max(0.0), out_point);
                Ok(())
            }
            HostCall::ScaleLayer { layer_index, new_in_point, new_out_point } => {
                if !(new_in_point >= 0.0 && new_out_point > new_in_point) {
                    return Err(format!("Invalid layer span {}..{}", new_in_point, new_out_point));
                }
                let out_point = new_out_point.min(comp.duration);
                let layer = comp.layer_mut(layer_index).ok_or(LAYER_NOT_FOUND)?;
                layer.set_span(new_in_point, out_point);
                Ok(())
            }
            HostCall::DuplicateLayer { layer_index, bpm, count, mode } => {
                duplicate_on_beat(comp, layer_index, bpm, count, mode)
            }
        }
    }
}

/// Insert `count` copies of a layer, each offset one more beat (or bar) from
/// the source. Copies go directly above the source; indices are renumbered.
fn duplicate_on_beat(
    comp: &mut Composition,
    layer_index: u32,
    bpm: f64,
    count: u32,
    mode: DuplicateMode,
) -> Result<(), String> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(format!("Invalid BPM {}", bpm));
    }
    let position = comp
        .layers
        .iter()
        .position(|l| l.index == layer_index)
        .ok_or(LAYER_NOT_FOUND)?;
    let source = comp.layers[position].clone();
    let spacing = mode.beats() as f64 * 60.0 / bpm;

    let copies: Vec<LayerRecord> = (1..=count)
        .map(|k| source.in_point + k as f64 * spacing)
        .take_while(|start| *start < comp.duration)
        .map(|start| {
            let mut copy = source.clone();
            copy.set_span(start, (start + source.duration).min(comp.duration));
            copy
        })
        .collect();

    debug!(
        "Duplicating layer {} x{} every {:.3}s ({} placed)",
        layer_index,
        count,
        spacing,
        copies.len()
    );
    comp.layers.splice(position..position, copies);
    for (i, layer) in comp.layers.iter_mut().enumerate() {
        layer.index = i as u32 + 1;
    }
    Ok(())
}

impl HostBridge for OfflineHost {
    fn call(&self, call: &HostCall) -> Result<String, SyncError> {
        trace!("offline host: {}", call.to_script());
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !call.is_mutation() {
            return Ok(Self::query(active.as_ref()));
        }
        let Some(comp) = active.as_mut() else {
            return Ok("No active composition found".to_string());
        };
        Ok(match Self::mutate(comp, call) {
            Ok(()) => SUCCESS.to_string(),
            Err(msg) => msg,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::host::parse_query_reply;

    const EPS: f64 = 1e-9;

    fn host() -> OfflineHost {
        let mut comp = Composition::new("Main", 48.0, 25.0);
        comp.layers.push(LayerRecord::new(1, "Kick", 0.0, 1.0));
        comp.layers.push(LayerRecord::new(2, "Pad", 10.0, 20.0));
        OfflineHost::new(comp)
    }

    #[test]
    fn test_query_round_trip() {
        let host = host();
        let raw = host.call(&HostCall::QueryComposition).unwrap();
        assert_eq!(parse_query_reply(&raw).unwrap(), host.composition().unwrap());
    }

    #[test]
    fn test_query_without_composition() {
        let raw = OfflineHost::empty().call(&HostCall::QueryComposition).unwrap();
        assert!(matches!(
            parse_query_reply(&raw),
            Err(SyncError::HostQueryFailed(msg)) if msg == NO_COMPOSITION
        ));
    }

    #[test]
    fn test_move_preserves_length() {
        let host = host();
        let reply = host.call(&HostCall::MoveLayer { layer_index: 2, new_in_point: 13.5 }).unwrap();
        assert_eq!(reply, "success");
        let comp = host.composition().unwrap();
        let pad = comp.layer(2).unwrap();
        assert!((pad.in_point - 13.5).abs() < EPS);
        assert!((pad.out_point - 23.5).abs() < EPS);
    }

    #[test]
    fn test_unknown_layer() {
        let host = host();
        let reply = host.call(&HostCall::MoveLayer { layer_index: 9, new_in_point: 1.0 }).unwrap();
        assert_eq!(reply, "Layer not found");
        let reply = host
            .call(&HostCall::ScaleLayer { layer_index: 9, new_in_point: 1.0, new_out_point: 2.0 })
            .unwrap();
        assert_eq!(reply, "Layer not found");
    }

    #[test]
    fn test_scale_sets_span() {
        let host = host();
        let reply = host
            .call(&HostCall::ScaleLayer { layer_index: 2, new_in_point: 9.0, new_out_point: 21.0 })
            .unwrap();
        assert_eq!(reply, "success");
        let comp = host.composition().unwrap();
        assert!((comp.layer(2).unwrap().duration - 12.0).abs() < EPS);

        let reply = host
            .call(&HostCall::ScaleLayer { layer_index: 2, new_in_point: 5.0, new_out_point: 5.0 })
            .unwrap();
        assert_ne!(reply, "success");
    }

    #[test]
    fn test_duplicate_beat_spacing() {
        let host = host();
        let reply = host
            .call(&HostCall::DuplicateLayer { layer_index: 1, bpm: 120.0, count: 3, mode: DuplicateMode::Beat })
            .unwrap();
        assert_eq!(reply, "success");

        let comp = host.composition().unwrap();
        assert_eq!(comp.layers.len(), 5);
        let starts: Vec<f64> = comp.layers.iter().map(|l| l.in_point).collect();
        assert_eq!(starts, vec![0.5, 1.0, 1.5, 0.0, 10.0]);
        let indices: Vec<u32> = comp.layers.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
        assert!(comp.layers.iter().take(3).all(|l| (l.duration - 1.0).abs() < EPS));
    }

    #[test]
    fn test_duplicate_bar_spacing_stops_at_comp_end() {
        let host = host();
        // One bar at 60 BPM = 4s; the pad copies land at 14, 18, .. 46
        host.call(&HostCall::DuplicateLayer { layer_index: 2, bpm: 60.0, count: 20, mode: DuplicateMode::Bar })
            .unwrap();
        let comp = host.composition().unwrap();
        assert_eq!(comp.layers.len(), 2 + 9);
        let last_copy = &comp.layers[9];
        assert!((last_copy.in_point - 46.0).abs() < EPS);
        assert!((last_copy.out_point - 48.0).abs() < EPS);
    }

    #[test]
    fn test_duplicate_rejects_bad_bpm() {
        let host = host();
        let reply = host
            .call(&HostCall::DuplicateLayer { layer_index: 1, bpm: 0.0, count: 2, mode: DuplicateMode::Beat })
            .unwrap();
        assert_ne!(reply, "success");
        assert_eq!(host.composition().unwrap().layers.len(), 2);
    }

    #[test]
    fn test_mutation_without_composition() {
        let reply = OfflineHost::empty()
            .call(&HostCall::MoveLayer { layer_index: 1, new_in_point: 0.0 })
            .unwrap();
        assert_eq!(reply, "No active composition found");
    }
}
