//! Drawing surfaces.
//!
//! Layers draw through the [`Surface`] trait. [`DisplayList`] records the
//! calls for inspection; [`RasterSurface`] rasterizes them into an RGBA
//! image with alpha blending.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
    draw_text_mut, Blend,
};

use heatlens_common::error::{HeatlensError, HeatlensResult};
use heatlens_event_model::geometry::{Point2D, Rect};

/// A 2D drawing target in canvas pixels.
pub trait Surface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Rgba<u8>);

    fn line(&mut self, from: Point2D, to: Point2D, color: Rgba<u8>);

    fn fill_circle(&mut self, center: Point2D, radius: f64, color: Rgba<u8>);

    fn stroke_circle(&mut self, center: Point2D, radius: f64, color: Rgba<u8>);

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);

    fn text(&mut self, at: Point2D, text: &str, color: Rgba<u8>);

    /// Composite `image` with its top-left corner at `(x, y)`.
    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64);
}

/// One recorded draw call.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba<u8>),
    Line {
        from: Point2D,
        to: Point2D,
        color: Rgba<u8>,
    },
    FillCircle {
        center: Point2D,
        radius: f64,
        color: Rgba<u8>,
    },
    StrokeCircle {
        center: Point2D,
        radius: f64,
        color: Rgba<u8>,
    },
    FillRect {
        rect: Rect,
        color: Rgba<u8>,
    },
    Text {
        at: Point2D,
        text: String,
        color: Rgba<u8>,
    },
    Image {
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },
}

/// Surface that records draw calls instead of rasterizing them.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DrawCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Every recorded text run, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for DisplayList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba<u8>) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn line(&mut self, from: Point2D, to: Point2D, color: Rgba<u8>) {
        self.commands.push(DrawCommand::Line { from, to, color });
    }

    fn fill_circle(&mut self, center: Point2D, radius: f64, color: Rgba<u8>) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
        });
    }

    fn stroke_circle(&mut self, center: Point2D, radius: f64, color: Rgba<u8>) {
        self.commands.push(DrawCommand::StrokeCircle {
            center,
            radius,
            color,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn text(&mut self, at: Point2D, text: &str, color: Rgba<u8>) {
        self.commands.push(DrawCommand::Text {
            at,
            text: text.to_string(),
            color,
        });
    }

    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        self.commands.push(DrawCommand::Image {
            x,
            y,
            width: image.width(),
            height: image.height(),
        });
    }
}

/// Label size on raster output, in pixels.
const TEXT_SCALE_PX: f32 = 12.0;

/// Load a TrueType/OpenType font for raster labels.
pub fn load_font(path: &Path) -> HeatlensResult<FontArc> {
    let bytes = std::fs::read(path)?;
    FontArc::try_from_vec(bytes)
        .map_err(|e| HeatlensError::render(format!("Invalid font {}: {e}", path.display())))
}

/// Surface backed by an RGBA image. Text is drawn only when a font has
/// been attached with [`RasterSurface::with_font`].
pub struct RasterSurface {
    canvas: Blend<RgbaImage>,
    font: Option<FontArc>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: Blend(RgbaImage::new(width.max(1), height.max(1))),
            font: None,
        }
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = Some(font);
        self
    }

    pub fn draws_text(&self) -> bool {
        self.font.is_some()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas.0
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas.0
    }

    pub fn save_png(&self, path: &Path) -> HeatlensResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.canvas
            .0
            .save_with_format(path, ImageFormat::Png)
            .map_err(|e| HeatlensError::render(format!("Failed to write {}: {e}", path.display())))
    }
}

fn to_i32(p: Point2D) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.canvas.0.dimensions()
    }

    fn clear(&mut self, color: Rgba<u8>) {
        for pixel in self.canvas.0.pixels_mut() {
            *pixel = color;
        }
    }

    fn line(&mut self, from: Point2D, to: Point2D, color: Rgba<u8>) {
        draw_line_segment_mut(
            &mut self.canvas,
            (from.x as f32, from.y as f32),
            (to.x as f32, to.y as f32),
            color,
        );
    }

    fn fill_circle(&mut self, center: Point2D, radius: f64, color: Rgba<u8>) {
        draw_filled_circle_mut(&mut self.canvas, to_i32(center), radius.round() as i32, color);
    }

    fn stroke_circle(&mut self, center: Point2D, radius: f64, color: Rgba<u8>) {
        draw_hollow_circle_mut(&mut self.canvas, to_i32(center), radius.round() as i32, color);
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let width = rect.width.round() as u32;
        let height = rect.height.round() as u32;
        if width == 0 || height == 0 {
            return;
        }
        let area = imageproc::rect::Rect::at(rect.x.round() as i32, rect.y.round() as i32)
            .of_size(width, height);
        draw_filled_rect_mut(&mut self.canvas, area, color);
    }

    fn text(&mut self, at: Point2D, text: &str, color: Rgba<u8>) {
        let Some(font) = &self.font else {
            tracing::trace!(text, "No font attached, skipping text");
            return;
        };
        let (x, y) = to_i32(at);
        draw_text_mut(&mut self.canvas.0, color, x, y, PxScale::from(TEXT_SCALE_PX), font, text);
    }

    fn draw_image(&mut self, image: &RgbaImage, x: i64, y: i64) {
        image::imageops::overlay(&mut self.canvas.0, image, x, y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_list_clear_resets_commands() {
        let mut list = DisplayList::new(10, 10);
        list.line(Point2D::new(0.0, 0.0), Point2D::new(5.0, 5.0), Rgba([0, 0, 0, 255]));
        list.clear(Rgba([255, 255, 255, 255]));
        assert_eq!(list.commands().len(), 1);
        assert!(matches!(list.commands()[0], DrawCommand::Clear(_)));
    }

    #[test]
    fn test_raster_blends_translucent_fill() {
        let mut surface = RasterSurface::new(20, 20);
        surface.clear(Rgba([255, 255, 255, 255]));
        surface.fill_circle(Point2D::new(10.0, 10.0), 4.0, Rgba([255, 0, 0, 128]));
        let center = surface.image().get_pixel(10, 10);
        assert_eq!(center.0[0], 255);
        assert!(center.0[1] > 100 && center.0[1] < 160);
        assert_eq!(*surface.image().get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn test_raster_draw_image_overlays_at_offset() {
        let mut surface = RasterSurface::new(8, 8);
        surface.clear(Rgba([0, 0, 0, 255]));
        let patch = RgbaImage::from_pixel(2, 2, Rgba([0, 255, 0, 255]));
        surface.draw_image(&patch, 3, 3);
        assert_eq!(*surface.image().get_pixel(3, 3), Rgba([0, 255, 0, 255]));
        assert_eq!(*surface.image().get_pixel(5, 5), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_fill_rect_skips_empty() {
        let mut surface = RasterSurface::new(4, 4);
        surface.fill_rect(Rect::new(0.0, 0.0, 0.0, 3.0), Rgba([1, 2, 3, 255]));
        assert!(surface.image().pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn test_raster_text_needs_a_font() {
        let mut surface = RasterSurface::new(40, 20);
        surface.clear(Rgba([255, 255, 255, 255]));
        surface.text(Point2D::new(2.0, 2.0), "12", Rgba([0, 0, 0, 255]));
        assert!(!surface.draws_text());
        assert!(surface.image().pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_load_font_rejects_non_font_file() {
        let path = std::env::temp_dir().join(format!("heatlens-not-a-font-{}.ttf", std::process::id()));
        std::fs::write(&path, b"definitely not a font").unwrap();
        let result = load_font(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
        assert!(load_font(Path::new("/nonexistent/heatlens.ttf")).is_err());
    }
}
