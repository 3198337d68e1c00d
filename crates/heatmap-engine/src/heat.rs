//! Offscreen heat layer.
//!
//! Each point contributes a radial gradient: full `intensity * opacity`
//! alpha at the core, half of it at mid radius, transparent at the edge.
//! Gradients accumulate source-over so overlaps build hot spots. The
//! buffer is rebuilt only when its inputs change.

use image::{Rgba, RgbaImage};

use crate::palette;
use crate::view::MappedPoint;

const MIN_RADIUS: f64 = 20.0;
const RADIUS_PER_INTENSITY: f64 = 60.0;

/// Gradient radius for an intensity.
pub fn heat_radius(intensity: f64) -> f64 {
    (intensity * RADIUS_PER_INTENSITY).max(MIN_RADIUS)
}

/// Gradient alpha at normalized distance `t` from the center.
pub fn gradient_alpha(core: f64, t: f64) -> f64 {
    if t >= 1.0 {
        0.0
    } else if t <= 0.5 {
        core - (core / 2.0) * (t / 0.5)
    } else {
        (core / 2.0) * (1.0 - (t - 0.5) / 0.5)
    }
}

/// Source-over of a straight-alpha color onto a straight-alpha pixel.
fn blend_over(dst: &mut Rgba<u8>, color: Rgba<u8>, alpha: f64) {
    if alpha <= 0.0 {
        return;
    }
    let da = dst.0[3] as f64 / 255.0;
    let out_a = alpha + da * (1.0 - alpha);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let sc = color.0[c] as f64;
        let dc = dst.0[c] as f64;
        dst.0[c] = ((sc * alpha + dc * da * (1.0 - alpha)) / out_a).round() as u8;
    }
    dst.0[3] = (out_a * 255.0).round() as u8;
}

/// Inputs that determine the heat buffer contents.
#[derive(Debug, Clone, Copy, PartialEq)]
struct HeatKey {
    revision: u64,
    opacity: f64,
    width: u32,
    height: u32,
}

/// Cached offscreen buffer for the heat layer.
#[derive(Debug, Default)]
pub struct HeatLayer {
    buffer: RgbaImage,
    key: Option<HeatKey>,
    rebuilds: u64,
}

impl HeatLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the buffer for these inputs, rebuilding it only if
    /// `revision`, `opacity` or the size differ from the last build.
    pub fn ensure(
        &mut self,
        points: &[MappedPoint],
        opacity: f64,
        width: u32,
        height: u32,
        revision: u64,
    ) -> &RgbaImage {
        let key = HeatKey {
            revision,
            opacity,
            width,
            height,
        };
        if self.key != Some(key) {
            self.rebuild(points, opacity, width, height);
            self.key = Some(key);
        }
        &self.buffer
    }

    /// Drop the cached buffer.
    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Number of rebuilds so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    fn rebuild(&mut self, points: &[MappedPoint], opacity: f64, width: u32, height: u32) {
        let mut buffer = RgbaImage::new(width.max(1), height.max(1));
        for point in points {
            splat(&mut buffer, point, opacity);
        }
        self.buffer = buffer;
        self.rebuilds += 1;
        tracing::debug!(points = points.len(), rebuilds = self.rebuilds, "Heat layer rebuilt");
    }
}

fn splat(buffer: &mut RgbaImage, point: &MappedPoint, opacity: f64) {
    let radius = heat_radius(point.intensity);
    let core = (point.intensity * opacity).clamp(0.0, 1.0);
    if core <= 0.0 {
        return;
    }
    let color = palette::color_for(point.event_type);
    let (w, h) = buffer.dimensions();
    let cx = point.position.x;
    let cy = point.position.y;

    let x0 = (cx - radius).floor().max(0.0) as u32;
    let y0 = (cy - radius).floor().max(0.0) as u32;
    let x1 = ((cx + radius).ceil().max(0.0) as u32).min(w);
    let y1 = ((cy + radius).ceil().max(0.0) as u32).min(h);

    for y in y0..y1 {
        for x in x0..x1 {
            let dx = x as f64 + 0.5 - cx;
            let dy = y as f64 + 0.5 - cy;
            let t = (dx * dx + dy * dy).sqrt() / radius;
            let alpha = gradient_alpha(core, t);
            if alpha > 0.0 {
                blend_over(buffer.get_pixel_mut(x, y), color, alpha);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heatlens_event_model::geometry::Point2D;
    use heatlens_event_model::sample::EventType;

    fn point(x: f64, y: f64, intensity: f64) -> MappedPoint {
        MappedPoint {
            index: 0,
            position: Point2D::new(x, y),
            intensity,
            event_type: EventType::Click,
            timestamp: 0,
            count: None,
        }
    }

    #[test]
    fn test_radius_and_gradient_stops() {
        assert_eq!(heat_radius(0.1), 20.0);
        assert_eq!(heat_radius(1.0), 60.0);
        assert_eq!(gradient_alpha(0.8, 0.0), 0.8);
        assert!((gradient_alpha(0.8, 0.5) - 0.4).abs() < 1e-12);
        assert_eq!(gradient_alpha(0.8, 1.0), 0.0);
    }

    #[test]
    fn test_overlap_accumulates() {
        let mut layer = HeatLayer::new();
        let single = layer.ensure(&[point(50.0, 50.0, 0.5)], 0.7, 100, 100, 1).clone();
        let double = layer
            .ensure(&[point(50.0, 50.0, 0.5), point(50.0, 50.0, 0.5)], 0.7, 100, 100, 2)
            .clone();
        assert!(double.get_pixel(50, 50).0[3] > single.get_pixel(50, 50).0[3]);
        assert_eq!(single.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn test_rebuild_only_on_change() {
        let mut layer = HeatLayer::new();
        let points = [point(10.0, 10.0, 0.9)];
        layer.ensure(&points, 0.7, 64, 64, 1);
        layer.ensure(&points, 0.7, 64, 64, 1);
        assert_eq!(layer.rebuilds(), 1);
        layer.ensure(&points, 0.5, 64, 64, 1);
        layer.ensure(&points, 0.5, 32, 64, 1);
        assert_eq!(layer.rebuilds(), 3);
        layer.invalidate();
        layer.ensure(&points, 0.5, 32, 64, 1);
        assert_eq!(layer.rebuilds(), 4);
    }

    #[test]
    fn test_points_outside_canvas_are_clipped() {
        let mut layer = HeatLayer::new();
        let buffer = layer.ensure(&[point(-500.0, 900.0, 1.0)], 1.0, 50, 50, 1);
        assert!(buffer.pixels().all(|p| p.0[3] == 0));
    }
}
