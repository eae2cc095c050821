//! Beat grid math - composition duration + tempo -> beat/bar grid.
//!
//! Pure functions, no state. Everything downstream (layer geometry, drag
//! deltas, bar ruler) reads a [`GridParameters`] produced here.
//!
//! # Coordinate Systems
//!
//! - seconds - composition time, `0..=duration`
//! - beats - 1-based grid cells, `1..=total_beats`
//! - pixels - `beat_width_px` per cell across the timeline width

use serde::{Deserialize, Serialize};

/// Derived beat grid for one composition at one tempo.
///
/// Zeroed (see [`GridParameters::is_degenerate`]) when there is nothing to
/// lay out yet: no composition loaded or a non-positive tempo.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridParameters {
    pub beats_per_second: f64,
    /// Whole beats that fit in the composition
    pub total_beats: u32,
    /// Beats counted against the time signature (used for bar count only)
    pub total_beats_for_bar_count: u32,
    /// `total_beats` rounded up to a multiple of beats-per-bar
    pub rounded_total_beats: u32,
    pub total_bars: u32,
    pub beat_width_px: f64,
}

impl GridParameters {
    /// No beats means nothing renders and drags are ignored.
    pub fn is_degenerate(&self) -> bool {
        self.total_beats == 0
    }

    /// Pixel distance -> whole beats, rounded to nearest. Saturates for
    /// distances past `i64` range.
    ///
    /// Returns 0 on a degenerate grid so callers never see NaN/inf.
    pub fn px_to_beats(&self, px: f64) -> i64 {
        if self.beat_width_px <= 0.0 || !px.is_finite() {
            return 0;
        }
        (px / self.beat_width_px).round() as i64
    }
}

/// User-controlled grid inputs (everything except the composition duration).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridInputs {
    pub bpm: f64,
    pub beats_per_bar: u32,
    pub time_signature_top: u32,
    /// Timeline width after zoom
    pub timeline_width_px: f64,
}

impl Default for GridInputs {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            beats_per_bar: 4,
            time_signature_top: 4,
            timeline_width_px: 1000.0,
        }
    }
}

impl GridInputs {
    pub fn compute(&self, comp_duration: f64) -> GridParameters {
        compute_grid(
            comp_duration,
            self.bpm,
            self.beats_per_bar,
            self.time_signature_top,
            self.timeline_width_px,
        )
    }
}

/// Compute the beat grid.
///
/// `beats_per_bar` stretches the grid (2/4/8/16 subdivisions); the bar count
/// always follows `time_signature_top`.
pub fn compute_grid(
    comp_duration: f64,
    bpm: f64,
    beats_per_bar: u32,
    time_signature_top: u32,
    timeline_width_px: f64,
) -> GridParameters {
    if !(comp_duration > 0.0 && comp_duration.is_finite())
        || !(bpm > 0.0 && bpm.is_finite())
        || beats_per_bar == 0
        || time_signature_top == 0
    {
        return GridParameters::default();
    }

    let beats_per_second = (bpm / 60.0) * (beats_per_bar as f64 / 4.0);
    let beats_per_second_for_bars = (bpm / 60.0) * (time_signature_top as f64 / 4.0);

    let total_beats = (comp_duration * beats_per_second).floor() as u32;
    let total_beats_for_bar_count = (comp_duration * beats_per_second_for_bars).floor() as u32;
    let rounded_total_beats = total_beats.div_ceil(beats_per_bar) * beats_per_bar;
    let total_bars = total_beats_for_bar_count.div_ceil(time_signature_top);

    let beat_width_px = if total_beats > 0 {
        timeline_width_px / total_beats as f64
    } else {
        0.0
    };

    GridParameters {
        beats_per_second,
        total_beats,
        total_beats_for_bar_count,
        rounded_total_beats,
        total_bars,
        beat_width_px,
    }
}
