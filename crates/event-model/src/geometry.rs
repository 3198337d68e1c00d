//! Viewport, point, and rectangle types plus canvas coordinate mapping.
//!
//! Capture coordinates are CSS pixels relative to the capture viewport.
//! Rendering rescales them linearly into canvas pixels.

use serde::{Deserialize, Serialize};

/// Capture viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    /// Resolution assumed when a sample arrives without viewport metadata.
    pub const REFERENCE: ViewportSize = ViewportSize {
        width: 1920,
        height: 1080,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A viewport with a zero dimension cannot anchor a mapping.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// This viewport, or `fallback` if degenerate.
    pub fn or(self, fallback: ViewportSize) -> ViewportSize {
        if self.is_degenerate() {
            fallback
        } else {
            self
        }
    }
}

/// Document scroll offset in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

/// A 2D point in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Linear interpolation between two points.
    pub fn lerp(a: &Point2D, b: &Point2D, t: f64) -> Point2D {
        let t = t.clamp(0.0, 1.0);
        Point2D {
            x: a.x + (b.x - a.x) * t,
            y: a.y + (b.y - a.y) * t,
        }
    }
}

/// Axis-aligned rectangle (element bounding box, legend panel).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point2D {
        Point2D::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

/// Map a capture-space coordinate into canvas pixels.
///
/// `canvasX = x / captureWidth * canvasWidth`, likewise for Y. A
/// degenerate capture viewport is replaced by [`ViewportSize::REFERENCE`].
pub fn map_to_canvas(
    x: f64,
    y: f64,
    capture: ViewportSize,
    canvas_width: f64,
    canvas_height: f64,
) -> Point2D {
    let capture = capture.or(ViewportSize::REFERENCE);
    Point2D {
        x: x / capture.width as f64 * canvas_width,
        y: y / capture.height as f64 * canvas_height,
    }
}
