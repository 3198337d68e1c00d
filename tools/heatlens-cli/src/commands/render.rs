//! Render a point cloud to PNG.

use std::path::PathBuf;

use heatlens_common::config::EngineDefaults;
use heatlens_heatmap_engine::{
    aggregate_samples, load_font, HeatmapFilterState, HeatmapView, RasterSurface, ViewOptions,
};

use super::input::{load_points, print_report};

#[allow(clippy::too_many_arguments)]
pub fn run(
    input: PathBuf,
    output: PathBuf,
    width: u32,
    height: u32,
    aggregate: Option<f64>,
    frame: Option<u32>,
    font: Option<PathBuf>,
    filter: HeatmapFilterState,
    defaults: &EngineDefaults,
) -> anyhow::Result<()> {
    if width == 0 || height == 0 {
        return Err(anyhow::anyhow!("Canvas must be at least 1x1, got {width}x{height}"));
    }

    println!("Rendering heatmap from: {}", input.display());

    let options = ViewOptions::from(defaults);
    let (mut points, report) = load_points(&input, options.reference)?;
    print_report(&report);

    if let Some(cell_px) = aggregate {
        let before = points.len();
        points = aggregate_samples(&points, cell_px, options.reference);
        println!("  Aggregated: {before} samples into {} cells", points.len());
    }

    let mut view = HeatmapView::new(points, filter, width, height, false, None).with_options(options);
    if let Some(frame) = frame {
        view.set_frame(frame);
    }

    let mut surface = match font {
        Some(path) => RasterSurface::new(width, height).with_font(load_font(&path)?),
        None => RasterSurface::new(width, height),
    };
    let rendered = view
        .render(Some(&mut surface))
        .ok_or_else(|| anyhow::anyhow!("Nothing was rendered"))?;
    surface.save_png(&output)?;

    println!("  Canvas: {width}x{height}");
    println!("  Points drawn: {}", rendered.points.len());
    println!("  Opacity: {:.2}", rendered.opacity);
    if !surface.draws_text() {
        println!("  Labels: omitted (no font; pass --font <ttf> to draw legend and counts)");
    }
    println!("Wrote {}", output.display());
    Ok(())
}
