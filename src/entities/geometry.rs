//! Layer placement on the beat grid.
//!
//! A rendered layer box has to span whole grid cells, but the layer itself
//! starts and ends at arbitrary seconds. [`LayerGeometry`] holds both views:
//! the floor/ceil cell span used for layout, the rounded ("closest") cell
//! lines used for snapping, and the corrective scale/translate that maps the
//! cell box back onto the layer's true proportional extent.
//!
//! Geometry values are immutable snapshots. [`LayerGeometry::move_by`] and
//! [`LayerGeometry::scale_by`] return new values, so a drag preview ("ghost")
//! can never alias the committed geometry.

use serde::{Deserialize, Serialize};

use super::composition::LayerRecord;
use super::grid::GridParameters;

/// Which part of a layer a gesture acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DragEdge {
    /// In-point handle
    Start,
    /// Out-point handle
    End,
    /// Layer body (both edges together)
    Both,
}

/// Geometry transform errors
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GeometryError {
    /// Zero beats or zero composition duration; nothing can be placed.
    DegenerateGrid,
    /// The edit would leave the layer with no cells (or no duration).
    CollapsedSpan { grid_start: i64, grid_end: i64 },
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::DegenerateGrid => write!(f, "Grid has no beats"),
            GeometryError::CollapsedSpan { grid_start, grid_end } => {
                write!(f, "Layer span collapsed (grid {}..{})", grid_start, grid_end)
            }
        }
    }
}

impl std::error::Error for GeometryError {}

/// Derived placement of one layer on the beat grid.
///
/// Grid lines are 1-based beat indices. They are kept signed because a
/// transform computes candidate lines left of beat 1 before clamping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerGeometry {
    /// Host layer index this geometry was derived from
    pub index: u32,
    pub in_point: f64,
    pub out_point: f64,
    pub duration: f64,
    pub comp_duration: f64,
    pub total_beats: u32,
    pub beat_width_px: f64,
    pub timeline_width_px: f64,

    pub grid_start: i64,
    pub grid_end: i64,
    pub closest_grid_start: i64,
    pub closest_grid_end: i64,
    pub grid_span_beats: i64,

    /// Scale that squeezes the whole-cell box back to the true duration
    pub visual_scale_x: f64,
    pub base_grid_px: f64,
    pub true_position_px: f64,
    pub corrective_translate_x_px: f64,
}

/// Compute the geometry of `record` on a grid of `total_beats` cells.
///
/// A zero grid or zero composition duration yields a degenerate geometry
/// (grid and pixel fields zero, scale 1) rather than NaN.
pub fn derive_geometry(
    record: &LayerRecord,
    comp_duration: f64,
    total_beats: u32,
    beat_width_px: f64,
    timeline_width_px: f64,
) -> LayerGeometry {
    let mut geometry = LayerGeometry {
        index: record.index,
        in_point: record.in_point,
        out_point: record.out_point,
        duration: record.duration,
        comp_duration,
        total_beats,
        beat_width_px,
        timeline_width_px,
        grid_start: 0,
        grid_end: 0,
        closest_grid_start: 0,
        closest_grid_end: 0,
        grid_span_beats: 0,
        visual_scale_x: 1.0,
        base_grid_px: 0.0,
        true_position_px: 0.0,
        corrective_translate_x_px: 0.0,
    };

    if geometry.is_degenerate() {
        return geometry;
    }

    let total = total_beats as i64;
    let start_beats = record.in_point / comp_duration * total_beats as f64;
    let end_beats = record.out_point / comp_duration * total_beats as f64;

    geometry.grid_start = (start_beats.floor() as i64 + 1).clamp(1, total);
    geometry.grid_end = (end_beats.ceil() as i64 + 1).min(total).max(geometry.grid_start);
    geometry.closest_grid_start = (start_beats.round() as i64 + 1).clamp(1, total);
    geometry.closest_grid_end = (end_beats.round() as i64 + 1)
        .min(total)
        .max(geometry.closest_grid_start);

    geometry.rescale();
    geometry
}

/// Convenience over [`derive_geometry`] taking a computed grid.
pub fn derive_on_grid(record: &LayerRecord, comp_duration: f64, grid: &GridParameters, timeline_width_px: f64) -> LayerGeometry {
    derive_geometry(record, comp_duration, grid.total_beats, grid.beat_width_px, timeline_width_px)
}

impl LayerGeometry {
    pub fn is_degenerate(&self) -> bool {
        self.total_beats == 0 || !(self.comp_duration > 0.0)
    }

    /// Seconds covered by one grid cell.
    fn seconds_per_cell(&self) -> f64 {
        self.comp_duration / self.total_beats as f64
    }

    /// Seconds at the left edge of a 1-based grid line.
    fn line_to_seconds(&self, line: i64) -> f64 {
        (line - 1) as f64 * self.seconds_per_cell()
    }

    /// Recompute derived render fields from the grid lines and seconds.
    fn rescale(&mut self) {
        self.grid_span_beats = self.grid_end - self.grid_start;

        // Zero-span layers (in == out) render as an empty box; keep identity scale.
        self.visual_scale_x = if self.grid_span_beats > 0 {
            self.duration / (self.grid_span_beats as f64 * self.seconds_per_cell())
        } else {
            1.0
        };

        self.base_grid_px = (self.grid_start - 1) as f64 * self.beat_width_px;
        self.true_position_px = (self.in_point / self.comp_duration) * self.timeline_width_px;
        self.corrective_translate_x_px = self.true_position_px - self.base_grid_px;
    }

    /// On-screen extent of the layer after corrective transform, in pixels.
    pub fn bounds_px(&self) -> (f64, f64) {
        if self.is_degenerate() {
            return (0.0, 0.0);
        }
        let width = self.duration / self.comp_duration * self.timeline_width_px;
        (self.true_position_px, self.true_position_px + width)
    }

    /// Move the whole layer by `beats` cells.
    ///
    /// Snapping (or hitting the left boundary) lands the start on the rounded
    /// grid line and keeps the cell span; a free move shifts both floor/ceil
    /// lines. In/out points are then re-derived from the grid lines.
    pub fn move_by(&self, beats: i64, snapping: bool) -> LayerGeometry {
        if beats == 0 || self.is_degenerate() {
            return self.clone();
        }

        let total = self.total_beats as i64;
        // Rightward moves stop once the start reaches the last beat
        let beats = beats.min(total - self.grid_start);

        let grid_span = self.grid_end - self.grid_start;
        let closest_span = self.closest_grid_end - self.closest_grid_start;

        let mut next = self.clone();
        let new_grid_start = self.grid_start + beats;
        next.closest_grid_start = (self.closest_grid_start + beats).clamp(1, total);

        if new_grid_start < 1 || snapping {
            next.grid_start = next.closest_grid_start;
            next.grid_end = (next.grid_start + grid_span).min(total);
            next.closest_grid_end = (next.closest_grid_start + closest_span).min(total);
        } else {
            next.grid_start = new_grid_start;
            next.grid_end = (self.grid_end + beats).min(total);
            next.closest_grid_end = (self.closest_grid_end + beats).min(total);
        }

        next.in_point = self.line_to_seconds(next.grid_start).max(0.0);
        next.out_point = self.line_to_seconds(next.grid_end).min(self.comp_duration);
        next.duration = next.out_point - next.in_point;
        next.rescale();

        log::trace!(
            "move_by layer {}: {} beats (snap={}) grid {}..{} -> {}..{}",
            self.index, beats, snapping, self.grid_start, self.grid_end, next.grid_start, next.grid_end
        );
        next
    }

    /// Move a single edge by `beats` cells.
    ///
    /// Mirrors [`move_by`](Self::move_by) for one edge: snapping (or crossing
    /// the grid boundary) lands on the rounded line, otherwise on the shifted
    /// floor/ceil line. Edits that would leave no cells or no duration are
    /// rejected instead of clamped. `DragEdge::Both` is a plain move.
    pub fn scale_by(&self, edge: DragEdge, beats: i64, snapping: bool) -> Result<LayerGeometry, GeometryError> {
        if self.is_degenerate() {
            return Err(GeometryError::DegenerateGrid);
        }
        if beats == 0 {
            return Ok(self.clone());
        }

        let total = self.total_beats as i64;
        // Anything past the grid width lands on a boundary anyway
        let beats = beats.clamp(-total, total);
        let mut next = self.clone();

        match edge {
            DragEdge::Both => return Ok(self.move_by(beats, snapping)),
            DragEdge::Start => {
                let new_start = self.grid_start + beats;
                let new_closest = (self.closest_grid_start + beats).max(1);
                let landed = if new_start < 1 || snapping { new_closest } else { new_start };
                if landed >= self.grid_end {
                    return Err(GeometryError::CollapsedSpan { grid_start: landed, grid_end: self.grid_end });
                }
                next.grid_start = landed;
                next.closest_grid_start = new_closest;
                next.in_point = self.line_to_seconds(landed).max(0.0);
            }
            DragEdge::End => {
                let new_end = self.grid_end + beats;
                let new_closest = (self.closest_grid_end + beats).min(total);
                let landed = if new_end > total || snapping { new_closest } else { new_end };
                if landed <= self.grid_start {
                    return Err(GeometryError::CollapsedSpan { grid_start: self.grid_start, grid_end: landed });
                }
                next.grid_end = landed;
                next.closest_grid_end = new_closest;
                next.out_point = self.line_to_seconds(landed).min(self.comp_duration);
            }
        }

        next.duration = next.out_point - next.in_point;
        if next.duration <= 0.0 {
            return Err(GeometryError::CollapsedSpan { grid_start: next.grid_start, grid_end: next.grid_end });
        }
        next.rescale();

        log::trace!(
            "scale_by layer {} {:?}: {} beats (snap={}) in/out {:.3}/{:.3} -> {:.3}/{:.3}",
            self.index, edge, beats, snapping, self.in_point, self.out_point, next.in_point, next.out_point
        );
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::grid::compute_grid;

    const EPS: f64 = 1e-9;

    /// 48s comp at 120bpm 4/4 on a 960px timeline: 96 beats, 10px per beat
    fn reference(in_point: f64, out_point: f64) -> LayerGeometry {
        let grid = compute_grid(48.0, 120.0, 4, 4, 960.0);
        derive_on_grid(&LayerRecord::new(7, "Layer", in_point, out_point), 48.0, &grid, 960.0)
    }

    #[test]
    fn test_reference_layer() {
        let g = reference(12.0, 35.0);
        assert_eq!(g.grid_start, 25);
        assert_eq!(g.grid_end, 71);
        assert_eq!(g.grid_span_beats, 46);
        assert!((g.visual_scale_x - 1.0).abs() < EPS);
        assert!((g.base_grid_px - 240.0).abs() < EPS);
        assert!((g.true_position_px - 240.0).abs() < EPS);
        assert!(g.corrective_translate_x_px.abs() < EPS);
    }

    #[test]
    fn test_full_span_layer() {
        let g = reference(0.0, 48.0);
        assert_eq!(g.grid_start, 1);
        assert_eq!(g.grid_end, 96);
    }

    #[test]
    fn test_corrective_offset_for_off_grid_layer() {
        // 12.3s sits 0.6 beats into cell 25
        let g = reference(12.3, 20.0);
        assert_eq!(g.grid_start, 25);
        assert_eq!(g.closest_grid_start, 26);
        assert!((g.corrective_translate_x_px - 6.0).abs() < 1e-6);
        let (left, right) = g.bounds_px();
        assert!((left - 246.0).abs() < 1e-6);
        assert!((right - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs_do_not_produce_nan() {
        let record = LayerRecord::new(1, "A", 1.0, 2.0);
        for g in [
            derive_geometry(&record, 48.0, 0, 0.0, 960.0),
            derive_geometry(&record, 0.0, 96, 10.0, 960.0),
        ] {
            assert!(g.is_degenerate());
            assert_eq!(g.grid_start, 0);
            assert_eq!(g.grid_end, 0);
            assert_eq!(g.visual_scale_x, 1.0);
            assert_eq!(g.base_grid_px, 0.0);
            assert_eq!(g.bounds_px(), (0.0, 0.0));
            assert_eq!(g.move_by(3, false), g);
            assert_eq!(g.scale_by(DragEdge::End, 1, false), Err(GeometryError::DegenerateGrid));
        }
    }

    #[test]
    fn test_zero_length_layer_keeps_identity_scale() {
        let g = reference(12.0, 12.0);
        assert_eq!(g.grid_span_beats, 0);
        assert_eq!(g.visual_scale_x, 1.0);
    }

    #[test]
    fn test_move_zero_is_identity() {
        let g = reference(12.3, 35.7);
        assert_eq!(g.move_by(0, false), g);
        assert_eq!(g.move_by(0, true), g);
    }

    #[test]
    fn test_free_move_right_three_beats() {
        let g = reference(12.0, 35.0);
        let moved = g.move_by(3, false);
        assert_eq!(moved.grid_start, 28);
        assert_eq!(moved.grid_end, 74);
        assert!((moved.duration - g.duration).abs() < EPS);
        assert!((moved.in_point - 13.5).abs() < EPS);
        assert!((moved.out_point - 36.5).abs() < EPS);
        // Input untouched
        assert_eq!(g.grid_start, 25);
    }

    #[test]
    fn test_free_move_round_trip() {
        let g = reference(12.3, 35.0);
        let back = g.move_by(3, false).move_by(-3, false);
        assert_eq!(back.grid_start, g.grid_start);
        assert_eq!(back.grid_end, g.grid_end);
    }

    #[test]
    fn test_snapping_move_is_lossy() {
        // Floor line 25, rounded line 26: snapping lands on the rounded line
        let g = reference(12.3, 35.0);
        let snapped = g.move_by(3, true);
        assert_eq!(snapped.grid_start, 29);
        let back = snapped.move_by(-3, true);
        assert_eq!(back.grid_start, 26);
        assert_ne!(back.grid_start, g.grid_start);
    }

    #[test]
    fn test_move_left_never_crosses_first_beat() {
        let g = reference(0.0, 10.0);
        assert_eq!(g.grid_start, 1);
        for beats in [1, 2, 7, 50, 1000] {
            let moved = g.move_by(-beats, false);
            assert_eq!(moved.grid_start, 1);
            assert!(moved.in_point >= 0.0);
            assert_eq!(moved.grid_span_beats, g.grid_span_beats);
        }
    }

    #[test]
    fn test_move_right_stays_on_grid() {
        let g = reference(40.0, 46.0);
        let moved = g.move_by(500, false);
        assert!(moved.grid_start <= 96);
        assert!(moved.grid_end <= 96);
        assert!(moved.grid_start <= moved.grid_end);
        assert!(moved.out_point <= 48.0);
    }

    #[test]
    fn test_scale_end_free() {
        let g = reference(12.0, 35.0);
        let scaled = g.scale_by(DragEdge::End, 2, false).unwrap();
        assert_eq!(scaled.grid_start, 25);
        assert_eq!(scaled.grid_end, 73);
        assert!((scaled.in_point - 12.0).abs() < EPS);
        assert!((scaled.out_point - 36.0).abs() < EPS);
        assert!((scaled.duration - 24.0).abs() < EPS);
    }

    #[test]
    fn test_scale_start_snapping_uses_rounded_line() {
        // in 12.3 -> floor line 25, rounded line 26
        let g = reference(12.3, 35.0);
        let free = g.scale_by(DragEdge::Start, -2, false).unwrap();
        let snapped = g.scale_by(DragEdge::Start, -2, true).unwrap();
        assert_eq!(free.grid_start, 23);
        assert_eq!(snapped.grid_start, 24);
        assert!((snapped.in_point - 11.5).abs() < EPS);
        // Only the start edge changed
        assert_eq!(snapped.grid_end, g.grid_end);
        assert_eq!(snapped.out_point, g.out_point);
    }

    #[test]
    fn test_scale_start_clamps_at_first_beat() {
        let g = reference(1.0, 10.0);
        let scaled = g.scale_by(DragEdge::Start, -20, false).unwrap();
        assert_eq!(scaled.grid_start, 1);
        assert_eq!(scaled.in_point, 0.0);
    }

    #[test]
    fn test_scale_end_past_grid_snaps_to_last_beat() {
        let g = reference(12.0, 35.0);
        let scaled = g.scale_by(DragEdge::End, 100, false).unwrap();
        assert_eq!(scaled.grid_end, 96);
        assert!(scaled.out_point <= 48.0);
    }

    #[test]
    fn test_scale_rejects_collapsed_span() {
        let g = reference(12.0, 35.0);
        assert!(matches!(
            g.scale_by(DragEdge::End, -46, false),
            Err(GeometryError::CollapsedSpan { .. })
        ));
        assert!(matches!(
            g.scale_by(DragEdge::Start, 46, false),
            Err(GeometryError::CollapsedSpan { .. })
        ));
        // One cell left is still valid
        let narrow = g.scale_by(DragEdge::End, -45, false).unwrap();
        assert_eq!(narrow.grid_span_beats, 1);
        assert!(narrow.duration > 0.0);
    }

    #[test]
    fn test_scale_end_snapping_uses_rounded_line() {
        // out 35.2 -> ceil line 72, rounded line 71
        let g = reference(12.0, 35.2);
        assert_eq!(g.grid_end, 72);
        assert_eq!(g.closest_grid_end, 71);

        let free = g.scale_by(DragEdge::End, 2, false).unwrap();
        let snapped = g.scale_by(DragEdge::End, 2, true).unwrap();
        assert_eq!(free.grid_end, 74);
        assert!((free.out_point - 36.5).abs() < EPS);
        assert_eq!(snapped.grid_end, 73);
        assert!((snapped.out_point - 36.0).abs() < EPS);

        // Only the end edge changed
        for scaled in [&free, &snapped] {
            assert_eq!(scaled.grid_start, g.grid_start);
            assert_eq!(scaled.in_point, g.in_point);
        }
    }

    #[test]
    fn test_scale_huge_delta_lands_on_boundary() {
        let g = reference(12.0, 35.0);
        let end = g.scale_by(DragEdge::End, i64::MAX, false).unwrap();
        assert_eq!(end.grid_end, 96);
        assert!(end.out_point <= 48.0);

        let start = g.scale_by(DragEdge::Start, i64::MIN, false).unwrap();
        assert_eq!(start.grid_start, 1);
        assert_eq!(start.in_point, 0.0);

        assert!(matches!(
            g.scale_by(DragEdge::Start, i64::MAX, true),
            Err(GeometryError::CollapsedSpan { .. })
        ));
        assert!(matches!(
            g.scale_by(DragEdge::End, i64::MIN, false),
            Err(GeometryError::CollapsedSpan { .. })
        ));
    }

    #[test]
    fn test_scale_both_edges_is_move() {
        let g = reference(12.0, 35.0);
        assert_eq!(g.scale_by(DragEdge::Both, 4, false).unwrap(), g.move_by(4, false));
    }
}
