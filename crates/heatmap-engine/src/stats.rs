//! Aggregate statistics over the filtered point set.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use heatlens_event_model::geometry::{map_to_canvas, ViewportSize};
use heatlens_event_model::sample::{EventType, InteractionSample};

use crate::grid::{GridConfig, HeatmapGrid, HotCell};

/// Statistics panel contents.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapStats {
    pub total: usize,
    pub by_type: BTreeMap<EventType, usize>,
    /// Mean intensity, 0 for an empty set.
    pub mean_intensity: f64,
    pub sessions: usize,
    pub hottest_cell: Option<HotCell>,
}

impl HeatmapStats {
    pub fn count(&self, event_type: EventType) -> usize {
        self.by_type.get(&event_type).copied().unwrap_or(0)
    }
}

/// Compute statistics for `points` as drawn on a `width` x `height` canvas.
pub fn compute_stats(
    points: &[InteractionSample],
    width: u32,
    height: u32,
    cell_px: f64,
    reference: ViewportSize,
) -> HeatmapStats {
    let mut by_type = BTreeMap::new();
    let mut sessions = BTreeSet::new();
    let mut intensity_sum = 0.0;

    for point in points {
        *by_type.entry(point.event_type).or_insert(0) += 1;
        if !point.session_id.is_empty() {
            sessions.insert(point.session_id.as_str());
        }
        intensity_sum += point.intensity;
    }

    let mean_intensity = if points.is_empty() {
        0.0
    } else {
        intensity_sum / points.len() as f64
    };

    let grid = HeatmapGrid::from_weighted(
        points.iter().map(|p| {
            let capture = p.viewport.or(reference);
            (
                map_to_canvas(p.x, p.y, capture, width as f64, height as f64),
                p.intensity,
            )
        }),
        GridConfig::new(width, height, cell_px),
    );

    HeatmapStats {
        total: points.len(),
        by_type,
        mean_intensity,
        sessions: sessions.len(),
        hottest_cell: grid.hottest(),
    }
}
