//! Timeline settings - tempo, grid subdivision, zoom and drag behaviour.
//! Toolbar events mutate `TimelineSettings`; the editor turns them into
//! `GridInputs` for the store. Persisted between sessions (see `config`).

use serde::{Deserialize, Serialize};

use super::drag::DragMode;
use crate::entities::GridInputs;

/// Grid subdivisions offered by the toolbar
pub const BEATS_PER_BAR_CHOICES: [u32; 4] = [2, 4, 8, 16];

pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 8.0;
const MIN_BPM: f64 = 1.0;
const MAX_BPM: f64 = 999.0;

/// Timeline settings (persistent between sessions)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineSettings {
    pub bpm: f64,
    pub beats_per_bar: u32,
    pub time_signature_top: u32,
    /// Width multiplier (1.0 = fit)
    pub zoom: f64,
    /// Timeline width at zoom 1.0
    pub base_width_px: f64,
    pub snap_enabled: bool,
    pub drag_mode: DragMode,
    /// Grab distance for in/out handles
    pub edge_threshold_px: f64,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            time_signature_top: 4,
            zoom: 1.0,
            base_width_px: 1000.0,
            snap_enabled: false,
            drag_mode: DragMode::Move,
            edge_threshold_px: 6.0,
        }
    }
}

impl TimelineSettings {
    pub fn timeline_width_px(&self) -> f64 {
        self.base_width_px * self.zoom
    }

    pub fn grid_inputs(&self) -> GridInputs {
        GridInputs {
            bpm: self.bpm,
            beats_per_bar: self.beats_per_bar,
            time_signature_top: self.time_signature_top,
            timeline_width_px: self.timeline_width_px(),
        }
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 2.0).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 2.0).max(MIN_ZOOM);
    }

    /// Set tempo. Non-finite or non-positive values are ignored.
    pub fn set_bpm(&mut self, bpm: f64) -> bool {
        if !(bpm.is_finite() && bpm > 0.0) {
            log::warn!("Ignoring invalid BPM {}", bpm);
            return false;
        }
        self.bpm = bpm.clamp(MIN_BPM, MAX_BPM);
        true
    }

    /// Set grid subdivision; only the toolbar choices are accepted.
    pub fn set_beats_per_bar(&mut self, beats_per_bar: u32) -> bool {
        if !BEATS_PER_BAR_CHOICES.contains(&beats_per_bar) {
            log::warn!("Ignoring unsupported beats-per-bar {}", beats_per_bar);
            return false;
        }
        self.beats_per_bar = beats_per_bar;
        true
    }

    /// Repair values loaded from an older or hand-edited settings file.
    pub fn normalized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.bpm.is_finite() && self.bpm > 0.0) {
            self.bpm = defaults.bpm;
        }
        self.bpm = self.bpm.clamp(MIN_BPM, MAX_BPM);
        if !BEATS_PER_BAR_CHOICES.contains(&self.beats_per_bar) {
            self.beats_per_bar = defaults.beats_per_bar;
        }
        if self.time_signature_top == 0 {
            self.time_signature_top = defaults.time_signature_top;
        }
        if !self.zoom.is_finite() {
            self.zoom = defaults.zoom;
        }
        self.zoom = self.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        if !(self.base_width_px.is_finite() && self.base_width_px > 0.0) {
            self.base_width_px = defaults.base_width_px;
        }
        if !(self.edge_threshold_px.is_finite() && self.edge_threshold_px >= 0.0) {
            self.edge_threshold_px = defaults.edge_threshold_px;
        }
        self
    }
}
