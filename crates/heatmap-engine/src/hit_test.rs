//! Nearest-point hit testing and hover tooltips.

use serde::Serialize;

use heatlens_event_model::geometry::Point2D;
use heatlens_event_model::sample::{EventType, InteractionSample};

use crate::view::MappedPoint;

pub const HIT_RADIUS_PX: f64 = 20.0;

/// Index into `points` of the closest point within `radius` of `at`.
///
/// Only a strictly closer point replaces the current best, so ties keep
/// the first one found.
pub fn hit_test(points: &[MappedPoint], at: Point2D, radius: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, point) in points.iter().enumerate() {
        let distance = point.position.distance_to(&at);
        if distance > radius {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

/// Hover tooltip contents.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tooltip {
    pub event_type: EventType,
    /// Mapped canvas position.
    pub x: f64,
    pub y: f64,
    /// Intensity as a whole percentage.
    pub intensity_percent: u32,
    /// Capture time, `%Y-%m-%d %H:%M:%S` UTC.
    pub time: String,
    pub count: Option<u32>,
}

impl Tooltip {
    pub fn new(point: &MappedPoint, sample: &InteractionSample) -> Self {
        let time = sample
            .captured_at()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        Self {
            event_type: point.event_type,
            x: point.position.x,
            y: point.position.y,
            intensity_percent: (point.intensity * 100.0).round() as u32,
            time,
            count: point.count,
        }
    }

    /// Display lines, title first.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            self.event_type.to_string(),
            format!("Position: ({:.0}, {:.0})", self.x, self.y),
            format!("Intensity: {}%", self.intensity_percent),
            format!("Time: {}", self.time),
        ];
        if let Some(count) = self.count {
            lines.push(format!("Count: {count}"));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(index: usize, x: f64, y: f64) -> MappedPoint {
        MappedPoint {
            index,
            position: Point2D::new(x, y),
            intensity: 0.9,
            event_type: EventType::Click,
            timestamp: 0,
            count: None,
        }
    }

    #[test]
    fn test_nearest_within_radius() {
        let points = vec![mapped(0, 0.0, 0.0), mapped(1, 10.0, 0.0), mapped(2, 100.0, 100.0)];
        assert_eq!(hit_test(&points, Point2D::new(8.0, 0.0), HIT_RADIUS_PX), Some(1));
        assert_eq!(hit_test(&points, Point2D::new(60.0, 60.0), HIT_RADIUS_PX), None);
        assert_eq!(hit_test(&points, Point2D::new(0.0, 20.0), HIT_RADIUS_PX), Some(0));
    }

    #[test]
    fn test_tie_keeps_first() {
        let points = vec![mapped(0, -5.0, 0.0), mapped(1, 5.0, 0.0)];
        assert_eq!(hit_test(&points, Point2D::new(0.0, 0.0), HIT_RADIUS_PX), Some(0));
    }

    #[test]
    fn test_tooltip_formatting() {
        let sample = InteractionSample::new(EventType::Click, 1.0, 2.0, 0.874, 1_700_000_000_000, "s")
            .with_count(3);
        let point = MappedPoint {
            count: sample.count,
            intensity: sample.intensity,
            ..mapped(0, 12.4, 56.6)
        };
        let tooltip = Tooltip::new(&point, &sample);
        assert_eq!(tooltip.intensity_percent, 87);
        assert_eq!(tooltip.time, "2023-11-14 22:13:20");
        assert_eq!(
            tooltip.lines(),
            vec![
                "click".to_string(),
                "Position: (12, 57)".to_string(),
                "Intensity: 87%".to_string(),
                "Time: 2023-11-14 22:13:20".to_string(),
                "Count: 3".to_string(),
            ]
        );
    }
}
