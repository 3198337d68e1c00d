//! Layer drawing routines. Each reads one [`RenderFrame`].

use heatlens_event_model::geometry::{Point2D, Rect};

use crate::palette;
use crate::surface::Surface;
use crate::view::{MappedPoint, RenderFrame};

pub const GRID_SPACING_PX: f64 = 50.0;

const ARROW_LENGTH: f64 = 8.0;
const ARROW_SPREAD: f64 = std::f64::consts::PI / 6.0;

const LEGEND_WIDTH: f64 = 150.0;
const LEGEND_ROW: f64 = 20.0;
const LEGEND_MARGIN: f64 = 10.0;
const LEGEND_PADDING: f64 = 10.0;
const SWATCH_RADIUS: f64 = 5.0;

pub fn draw_grid(surface: &mut dyn Surface, width: u32, height: u32) {
    let (w, h) = (width as f64, height as f64);
    let mut x = 0.0;
    while x <= w {
        surface.line(Point2D::new(x, 0.0), Point2D::new(x, h), palette::GRID_LINE);
        x += GRID_SPACING_PX;
    }
    let mut y = 0.0;
    while y <= h {
        surface.line(Point2D::new(0.0, y), Point2D::new(w, y), palette::GRID_LINE);
        y += GRID_SPACING_PX;
    }
}

/// Marker radius, oscillating by up to 2px while playing.
pub fn point_radius(intensity: f64, index: usize, frame: u32, playing: bool) -> f64 {
    let base = (intensity * 8.0).max(3.0);
    if !playing {
        return base;
    }
    let phase = (frame as f64 + index as f64 * 10.0) * 0.1;
    base + phase.sin() * 2.0
}

pub fn draw_points(surface: &mut dyn Surface, frame: &RenderFrame) {
    for (index, point) in frame.points.iter().enumerate() {
        let radius = point_radius(point.intensity, index, frame.frame, frame.playing);
        let color = palette::with_alpha(palette::color_for(point.event_type), 0.8);
        surface.fill_circle(point.position, radius, color);
        surface.stroke_circle(point.position, radius, palette::POINT_BORDER);
        if let Some(count) = point.count {
            surface.text(point.position, &count.to_string(), palette::TEXT);
        }
    }
}

/// Points in timestamp order; equal timestamps stay in input order.
pub fn path_order(points: &[MappedPoint]) -> Vec<&MappedPoint> {
    let mut ordered: Vec<&MappedPoint> = points.iter().collect();
    ordered.sort_by_key(|p| p.timestamp);
    ordered
}

/// The two strokes of a chevron at `tip` pointing along `from -> to`.
pub fn arrowhead(from: Point2D, to: Point2D, tip: Point2D) -> [(Point2D, Point2D); 2] {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let wing = |offset: f64| {
        let a = angle + std::f64::consts::PI + offset;
        Point2D::new(tip.x + ARROW_LENGTH * a.cos(), tip.y + ARROW_LENGTH * a.sin())
    };
    [(tip, wing(ARROW_SPREAD)), (tip, wing(-ARROW_SPREAD))]
}

pub fn draw_paths(surface: &mut dyn Surface, frame: &RenderFrame) {
    if frame.points.len() < 2 {
        return;
    }
    let ordered = path_order(&frame.points);
    for pair in ordered.windows(2) {
        let (from, to) = (pair[0].position, pair[1].position);
        surface.line(from, to, palette::PATH_LINE);
        let mid = Point2D::lerp(&from, &to, 0.5);
        for (a, b) in arrowhead(from, to, mid) {
            surface.line(a, b, palette::PATH_LINE);
        }
    }
}

pub fn draw_legend(surface: &mut dyn Surface, width: u32) {
    let height = LEGEND_PADDING * 2.0 + LEGEND_ROW * palette::LEGEND.len() as f64;
    let panel = Rect::new(
        width as f64 - LEGEND_WIDTH - LEGEND_MARGIN,
        LEGEND_MARGIN,
        LEGEND_WIDTH,
        height,
    );
    surface.fill_rect(panel, palette::LEGEND_PANEL);

    for (row, (event_type, label)) in palette::LEGEND.iter().enumerate() {
        let cy = panel.y + LEGEND_PADDING + LEGEND_ROW * row as f64 + LEGEND_ROW / 2.0;
        let swatch = Point2D::new(panel.x + LEGEND_PADDING + SWATCH_RADIUS, cy);
        surface.fill_circle(swatch, SWATCH_RADIUS, palette::color_for(*event_type));
        surface.text(
            Point2D::new(swatch.x + SWATCH_RADIUS * 2.0 + 4.0, cy),
            label,
            palette::TEXT,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DisplayList, DrawCommand};
    use heatlens_event_model::sample::EventType;

    fn mapped(x: f64, y: f64, timestamp: i64) -> MappedPoint {
        MappedPoint {
            index: 0,
            position: Point2D::new(x, y),
            intensity: 0.5,
            event_type: EventType::MouseMove,
            timestamp,
            count: None,
        }
    }

    fn frame(points: Vec<MappedPoint>, playing: bool, frame: u32) -> RenderFrame {
        RenderFrame {
            width: 200,
            height: 100,
            frame,
            playing,
            points,
            ..RenderFrame::default()
        }
    }

    fn lines(list: &DisplayList) -> usize {
        list.count(|c| matches!(c, DrawCommand::Line { .. }))
    }

    #[test]
    fn test_grid_spacing() {
        let mut list = DisplayList::new(200, 100);
        draw_grid(&mut list, 200, 100);
        // x = 0..=200 step 50, y = 0..=100 step 50
        assert_eq!(lines(&list), 5 + 3);
    }

    #[test]
    fn test_point_radius_oscillation() {
        assert_eq!(point_radius(0.1, 0, 0, false), 3.0);
        assert_eq!(point_radius(1.0, 3, 99, false), 8.0);
        let r0 = point_radius(1.0, 0, 0, true);
        assert!((r0 - 8.0).abs() < 1e-12);
        let r1 = point_radius(1.0, 1, 0, true);
        assert!((r1 - (8.0 + 1.0f64.sin() * 2.0)).abs() < 1e-12);
        for frame in 0..360 {
            let r = point_radius(0.5, 7, frame, true);
            assert!((2.0 - 1e-9..=6.0 + 1e-9).contains(&r));
        }
    }

    #[test]
    fn test_points_draw_labels_for_counts() {
        let mut counted = mapped(10.0, 10.0, 0);
        counted.count = Some(4);
        let mut list = DisplayList::new(200, 100);
        draw_points(&mut list, &frame(vec![counted, mapped(50.0, 50.0, 1)], false, 0));
        assert_eq!(list.count(|c| matches!(c, DrawCommand::FillCircle { .. })), 2);
        assert_eq!(list.count(|c| matches!(c, DrawCommand::StrokeCircle { .. })), 2);
        assert_eq!(list.texts(), vec!["4"]);
    }

    #[test]
    fn test_path_needs_two_points_and_sorts_by_time() {
        let mut list = DisplayList::new(200, 100);
        draw_paths(&mut list, &frame(vec![mapped(0.0, 0.0, 0)], false, 0));
        assert_eq!(lines(&list), 0);

        let points = vec![mapped(100.0, 0.0, 30), mapped(0.0, 0.0, 10), mapped(50.0, 0.0, 20)];
        let ordered: Vec<f64> = path_order(&points).iter().map(|p| p.position.x).collect();
        assert_eq!(ordered, vec![0.0, 50.0, 100.0]);

        draw_paths(&mut list, &frame(points, false, 0));
        // Two segments, each with a two-stroke chevron.
        assert_eq!(lines(&list), 6);
    }

    #[test]
    fn test_arrowhead_points_backwards() {
        let [(tip, wing), _] = arrowhead(Point2D::new(0.0, 0.0), Point2D::new(10.0, 0.0), Point2D::new(5.0, 0.0));
        assert_eq!(tip, Point2D::new(5.0, 0.0));
        assert!(wing.x < 5.0);
    }

    #[test]
    fn test_legend_lists_five_entries_top_right() {
        let mut list = DisplayList::new(400, 300);
        draw_legend(&mut list, 400);
        assert_eq!(
            list.texts(),
            vec!["Clicks", "Mouse Movement", "Scrolling", "Touch", "Form Input"]
        );
        let panel = list
            .commands()
            .iter()
            .find_map(|c| match c {
                DrawCommand::FillRect { rect, .. } => Some(*rect),
                _ => None,
            })
            .unwrap();
        assert_eq!(panel.right(), 390.0);
        assert_eq!(panel.y, 10.0);
    }
}
