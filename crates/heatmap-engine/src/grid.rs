//! Cell density grid and same-cell sample aggregation.

use std::collections::HashMap;

use serde::Serialize;

use heatlens_event_model::geometry::{Point2D, ViewportSize};
use heatlens_event_model::sample::{EventType, InteractionSample};

/// Square cells of `cell_px` over a `width` x `height` canvas.
#[derive(Debug, Clone, Copy)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    pub cell_px: f64,
}

impl GridConfig {
    pub fn new(width: u32, height: u32, cell_px: f64) -> Self {
        Self {
            width,
            height,
            cell_px,
        }
    }

    fn cell_px(&self) -> f64 {
        if self.cell_px.is_finite() && self.cell_px >= 1.0 {
            self.cell_px
        } else {
            1.0
        }
    }
}

/// The densest cell of a grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotCell {
    pub col: usize,
    pub row: usize,
    /// Summed intensity in the cell.
    pub density: f64,
    /// Cell bounds in canvas pixels.
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

/// Intensity-weighted point density per cell.
#[derive(Debug, Clone)]
pub struct HeatmapGrid {
    pub cols: usize,
    pub rows: usize,
    pub cell_px: f64,
    pub cells: Vec<f64>,
    pub max_density: f64,
}

impl HeatmapGrid {
    /// Accumulate `(position, weight)` pairs. Positions outside the canvas
    /// are clamped to the border cells.
    pub fn from_weighted(points: impl IntoIterator<Item = (Point2D, f64)>, config: GridConfig) -> Self {
        let cell_px = config.cell_px();
        let cols = ((config.width as f64 / cell_px).ceil() as usize).max(1);
        let rows = ((config.height as f64 / cell_px).ceil() as usize).max(1);
        let mut cells = vec![0.0; cols * rows];

        for (position, weight) in points {
            if !position.x.is_finite() || !position.y.is_finite() {
                continue;
            }
            let cx = ((position.x / cell_px).floor().max(0.0) as usize).min(cols - 1);
            let cy = ((position.y / cell_px).floor().max(0.0) as usize).min(rows - 1);
            cells[cy * cols + cx] += weight;
        }

        let max_density = cells.iter().copied().fold(0.0_f64, f64::max);
        Self {
            cols,
            rows,
            cell_px,
            cells,
            max_density,
        }
    }

    pub fn cell(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(self.cells[row * self.cols + col])
    }

    pub fn normalized_cell(&self, col: usize, row: usize) -> Option<f64> {
        let value = self.cell(col, row)?;
        if self.max_density <= 0.0 {
            return Some(0.0);
        }
        Some(value / self.max_density)
    }

    /// First cell (row-major) holding the maximum density; `None` for an empty grid.
    pub fn hottest(&self) -> Option<HotCell> {
        if self.max_density <= 0.0 {
            return None;
        }
        let idx = self.cells.iter().position(|v| *v == self.max_density)?;
        let (col, row) = (idx % self.cols, idx / self.cols);
        Some(HotCell {
            col,
            row,
            density: self.max_density,
            x: col as f64 * self.cell_px,
            y: row as f64 * self.cell_px,
            size: self.cell_px,
        })
    }
}

/// Merge samples of the same type landing in the same capture-space cell.
///
/// The merged sample keeps the first sample's fields, the earliest
/// timestamp, the mean intensity, and a `count` summing the occurrences
/// (an unmerged sample counts as 1). Output follows first appearance.
pub fn aggregate_samples(
    points: &[InteractionSample],
    cell_px: f64,
    reference: ViewportSize,
) -> Vec<InteractionSample> {
    let cell_px = if cell_px.is_finite() && cell_px >= 1.0 { cell_px } else { 1.0 };
    let mut slots: HashMap<(EventType, i64, i64), usize> = HashMap::new();
    let mut merged: Vec<(InteractionSample, f64, u32)> = Vec::new();

    for point in points {
        // Normalize to the reference resolution so differently sized
        // viewports share cells.
        let capture = point.viewport.or(reference).or(ViewportSize::REFERENCE);
        let rx = reference.or(ViewportSize::REFERENCE);
        let nx = point.x / capture.width as f64 * rx.width as f64;
        let ny = point.y / capture.height as f64 * rx.height as f64;
        let key = (
            point.event_type,
            (nx / cell_px).floor() as i64,
            (ny / cell_px).floor() as i64,
        );
        let occurrences = point.count.unwrap_or(1).max(1);

        match slots.get(&key) {
            Some(&slot) => {
                let (sample, intensity_sum, count) = &mut merged[slot];
                *intensity_sum += point.intensity * occurrences as f64;
                *count += occurrences;
                sample.timestamp = sample.timestamp.min(point.timestamp);
            }
            None => {
                slots.insert(key, merged.len());
                merged.push((point.clone(), point.intensity * occurrences as f64, occurrences));
            }
        }
    }

    merged
        .into_iter()
        .map(|(mut sample, intensity_sum, count)| {
            sample.intensity = intensity_sum / count as f64;
            sample.count = Some(count);
            sample
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_tracks_hotspot() {
        let points = vec![
            (Point2D::new(10.0, 10.0), 1.0),
            (Point2D::new(12.0, 14.0), 1.0),
            (Point2D::new(18.0, 11.0), 0.5),
            (Point2D::new(95.0, 95.0), 1.0),
        ];
        let grid = HeatmapGrid::from_weighted(points, GridConfig::new(100, 100, 50.0));
        assert_eq!((grid.cols, grid.rows), (2, 2));
        assert_eq!(grid.cell(0, 0), Some(2.5));
        assert_eq!(grid.normalized_cell(1, 1), Some(0.4));
        let hot = grid.hottest().unwrap();
        assert_eq!((hot.col, hot.row), (0, 0));
        assert_eq!(grid.cell(2, 0), None);
    }

    #[test]
    fn test_empty_grid_is_zeroed() {
        let grid = HeatmapGrid::from_weighted(Vec::new(), GridConfig::new(120, 80, 50.0));
        assert_eq!((grid.cols, grid.rows), (3, 2));
        assert_eq!(grid.max_density, 0.0);
        assert!(grid.hottest().is_none());
        assert_eq!(grid.normalized_cell(0, 0), Some(0.0));
    }

    #[test]
    fn test_aggregate_merges_same_type_same_cell() {
        let vp = ViewportSize::new(1920, 1080);
        let points = vec![
            InteractionSample::new(EventType::Click, 10.0, 10.0, 0.9, 30, "a").with_viewport(vp),
            InteractionSample::new(EventType::Click, 20.0, 15.0, 0.5, 10, "b").with_viewport(vp),
            InteractionSample::new(EventType::Scroll, 12.0, 12.0, 0.5, 20, "a").with_viewport(vp),
            InteractionSample::new(EventType::Click, 300.0, 10.0, 0.4, 40, "a").with_viewport(vp),
        ];
        let merged = aggregate_samples(&points, 50.0, ViewportSize::REFERENCE);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].count, Some(2));
        assert!((merged[0].intensity - 0.7).abs() < 1e-12);
        assert_eq!(merged[0].timestamp, 10);
        assert_eq!(merged[1].event_type, EventType::Scroll);
        assert_eq!(merged[2].count, Some(1));
    }

    #[test]
    fn test_aggregate_respects_existing_counts() {
        let points = vec![
            InteractionSample::new(EventType::Touch, 5.0, 5.0, 1.0, 0, "a").with_count(3),
            InteractionSample::new(EventType::Touch, 6.0, 6.0, 0.0, 0, "a"),
        ];
        let merged = aggregate_samples(&points, 50.0, ViewportSize::REFERENCE);
        assert_eq!(merged[0].count, Some(4));
        assert!((merged[0].intensity - 0.75).abs() < 1e-12);
    }
}
