//! Timeline helpers: hit testing and pixel <-> beat math for gestures.

use crate::entities::{DragEdge, GridParameters};

/// Which part of a layer bar the pointer is over.
///
/// `bar` is the layer's on-screen extent `(left, right)` in pixels. Handles
/// extend `edge_threshold` past the bar so short layers stay grabbable.
pub fn detect_drag_edge(pointer_x: f64, bar: (f64, f64), edge_threshold: f64) -> Option<DragEdge> {
    let (left, right) = bar;
    if pointer_x < left - edge_threshold || pointer_x > right + edge_threshold {
        return None;
    }

    let dist_to_left = (pointer_x - left).abs();
    let dist_to_right = (pointer_x - right).abs();

    if dist_to_left < edge_threshold && dist_to_left <= dist_to_right {
        Some(DragEdge::Start)
    } else if dist_to_right < edge_threshold {
        Some(DragEdge::End)
    } else if pointer_x >= left && pointer_x <= right {
        Some(DragEdge::Both)
    } else {
        None
    }
}

/// Whole beats travelled since the press; rightward motion is positive.
pub fn pointer_delta_beats(start_x: f64, current_x: f64, grid: &GridParameters) -> i64 {
    grid.px_to_beats(current_x - start_x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{compute_grid, derive_on_grid, LayerRecord};

    #[test]
    fn test_detect_edges() {
        let bar = (100.0, 200.0);
        assert_eq!(detect_drag_edge(102.0, bar, 6.0), Some(DragEdge::Start));
        assert_eq!(detect_drag_edge(96.0, bar, 6.0), Some(DragEdge::Start));
        assert_eq!(detect_drag_edge(198.0, bar, 6.0), Some(DragEdge::End));
        assert_eq!(detect_drag_edge(150.0, bar, 6.0), Some(DragEdge::Both));
        assert_eq!(detect_drag_edge(50.0, bar, 6.0), None);
        assert_eq!(detect_drag_edge(207.0, bar, 6.0), None);
    }

    #[test]
    fn test_narrow_bar_prefers_start() {
        assert_eq!(detect_drag_edge(101.0, (100.0, 103.0), 6.0), Some(DragEdge::Start));
        assert_eq!(detect_drag_edge(103.0, (100.0, 103.0), 6.0), Some(DragEdge::End));
    }

    #[test]
    fn test_pointer_delta() {
        let grid = compute_grid(48.0, 120.0, 4, 4, 960.0);
        assert_eq!(pointer_delta_beats(100.0, 130.0, &grid), 3);
        assert_eq!(pointer_delta_beats(100.0, 86.0, &grid), -1);
        assert_eq!(pointer_delta_beats(100.0, 104.0, &grid), 0);
        assert_eq!(pointer_delta_beats(100.0, 500.0, &GridParameters::default()), 0);
    }

    #[test]
    fn test_pointer_delta_far_off_screen() {
        let grid = compute_grid(48.0, 120.0, 4, 4, 960.0);
        assert_eq!(pointer_delta_beats(0.0, 1e300, &grid), i64::MAX);
        assert_eq!(pointer_delta_beats(0.0, f64::INFINITY, &grid), 0);

        // The transform still lands on the last beat
        let record = LayerRecord::new(1, "A", 12.0, 35.0);
        let g = derive_on_grid(&record, 48.0, &grid, 960.0);
        let delta = pointer_delta_beats(g.bounds_px().1, 1e300, &grid);
        assert_eq!(g.scale_by(DragEdge::End, delta, false).unwrap().grid_end, 96);
    }
}
