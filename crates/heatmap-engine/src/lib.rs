//! Heatlens Heatmap Engine
//!
//! Turns a fetched point cloud into a layered heatmap:
//!
//! 1. **Filter** the cloud by type, intensity, path, device and time window
//! 2. **Map** capture-viewport coordinates onto the canvas
//! 3. **Draw** grid, heat, points, paths and legend, in that order
//!
//! All drawing goes through the [`surface::Surface`] trait, so the same
//! view renders into a recorded display list or a PNG raster.
//!
//! # Example
//!
//! ```no_run
//! use heatlens_heatmap_engine::{HeatmapFilterState, HeatmapView, RasterSurface};
//!
//! let mut view = HeatmapView::new(Vec::new(), HeatmapFilterState::default(), 1200, 800, false, None);
//! let mut surface = RasterSurface::new(1200, 800);
//! view.render(Some(&mut surface));
//! surface.save_png(std::path::Path::new("heatmap.png")).unwrap();
//! ```

pub mod animation;
pub mod filter;
pub mod grid;
pub mod heat;
pub mod hit_test;
pub mod layers;
pub mod palette;
pub mod stats;
pub mod surface;
pub mod view;

pub use animation::{AnimationClock, AnimationLoop};
pub use filter::{filter_points, HeatmapFilterState, TimeRange};
pub use grid::{aggregate_samples, HeatmapGrid};
pub use stats::{compute_stats, HeatmapStats};
pub use surface::{load_font, DisplayList, RasterSurface, Surface};
pub use view::{HeatmapView, MappedPoint, RenderFrame, ViewOptions};
