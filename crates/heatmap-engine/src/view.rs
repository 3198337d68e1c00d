//! The embeddable heatmap view.
//!
//! A [`HeatmapView`] holds the raw point cloud, the filter state, the
//! canvas size and the play state. Every change re-filters synchronously.
//! [`HeatmapView::render`] builds one [`RenderFrame`] and draws every
//! layer from it, so a single pass never mixes two filter states.

use serde::Serialize;

use heatlens_common::clock::EpochMs;
use heatlens_common::config::EngineDefaults;
use heatlens_event_model::geometry::{map_to_canvas, Point2D, ViewportSize};
use heatlens_event_model::sample::{EventType, InteractionSample};

use crate::animation::AnimationClock;
use crate::filter::{filter_points, HeatmapFilterState, LayerToggles};
use crate::heat::HeatLayer;
use crate::hit_test::{hit_test, Tooltip, HIT_RADIUS_PX};
use crate::layers;
use crate::palette;
use crate::stats::{compute_stats, HeatmapStats};
use crate::surface::Surface;

/// A filtered point in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappedPoint {
    /// Index into the filtered set.
    pub index: usize,
    pub position: Point2D,
    pub intensity: f64,
    pub event_type: EventType,
    pub timestamp: EpochMs,
    pub count: Option<u32>,
}

/// Everything one render pass reads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderFrame {
    pub width: u32,
    pub height: u32,
    pub frame: u32,
    pub playing: bool,
    pub opacity: f64,
    pub layers: LayerToggles,
    pub points: Vec<MappedPoint>,
    /// Filter revision the points were produced from.
    pub revision: u64,
}

pub type PointClickHandler = Box<dyn FnMut(&InteractionSample) + Send>;

/// Rendering options not carried by the filter state.
#[derive(Debug, Clone, Copy)]
pub struct ViewOptions {
    /// Resolution assumed for samples without a capture viewport.
    pub reference: ViewportSize,
    pub hit_radius_px: f64,
    /// Statistics grid cell size.
    pub stats_cell_px: f64,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            reference: ViewportSize::REFERENCE,
            hit_radius_px: HIT_RADIUS_PX,
            stats_cell_px: layers::GRID_SPACING_PX,
        }
    }
}

impl From<&EngineDefaults> for ViewOptions {
    fn from(defaults: &EngineDefaults) -> Self {
        Self {
            reference: ViewportSize::new(defaults.reference_width, defaults.reference_height),
            hit_radius_px: defaults.hit_radius_px,
            stats_cell_px: layers::GRID_SPACING_PX,
        }
    }
}

pub struct HeatmapView {
    points: Vec<InteractionSample>,
    filter: HeatmapFilterState,
    width: u32,
    height: u32,
    clock: AnimationClock,
    on_point_click: Option<PointClickHandler>,
    options: ViewOptions,

    filtered: Vec<InteractionSample>,
    mapped: Vec<MappedPoint>,
    revision: u64,
    heat: HeatLayer,
    tooltip: Option<Tooltip>,
    frames_rendered: u64,
}

impl HeatmapView {
    pub fn new(
        points: Vec<InteractionSample>,
        filter: HeatmapFilterState,
        width: u32,
        height: u32,
        playing: bool,
        on_point_click: Option<PointClickHandler>,
    ) -> Self {
        let mut view = Self {
            points,
            filter,
            width,
            height,
            clock: AnimationClock::new(playing),
            on_point_click,
            options: ViewOptions::default(),
            filtered: Vec::new(),
            mapped: Vec::new(),
            revision: 0,
            heat: HeatLayer::new(),
            tooltip: None,
            frames_rendered: 0,
        };
        view.recompute();
        view
    }

    pub fn with_options(mut self, options: ViewOptions) -> Self {
        self.options = options;
        self.recompute();
        self
    }

    fn recompute(&mut self) {
        self.filtered = filter_points(&self.points, &self.filter);
        self.remap();
    }

    fn remap(&mut self) {
        let (w, h) = (self.width as f64, self.height as f64);
        let reference = self.options.reference;
        self.mapped = self
            .filtered
            .iter()
            .enumerate()
            .map(|(index, p)| MappedPoint {
                index,
                position: map_to_canvas(p.x, p.y, p.viewport.or(reference), w, h),
                intensity: p.intensity,
                event_type: p.event_type,
                timestamp: p.timestamp,
                count: p.count,
            })
            .collect();
        self.revision += 1;
        self.tooltip = None;
    }

    pub fn set_points(&mut self, points: Vec<InteractionSample>) {
        self.points = points;
        self.recompute();
    }

    pub fn set_filter(&mut self, filter: HeatmapFilterState) {
        if filter == self.filter {
            return;
        }
        self.filter = filter;
        self.recompute();
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        self.width = width;
        self.height = height;
        self.remap();
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.clock.set_playing(playing);
    }

    pub fn set_on_point_click(&mut self, handler: Option<PointClickHandler>) {
        self.on_point_click = handler;
    }

    pub fn filter(&self) -> &HeatmapFilterState {
        &self.filter
    }

    /// Points passing the current filter, in input order.
    pub fn filtered(&self) -> &[InteractionSample] {
        &self.filtered
    }

    pub fn mapped(&self) -> &[MappedPoint] {
        &self.mapped
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Statistics of the filtered set.
    pub fn stats(&self) -> HeatmapStats {
        compute_stats(
            &self.filtered,
            self.width,
            self.height,
            self.options.stats_cell_px,
            self.options.reference,
        )
    }

    /// Advance the animation by one frame while playing.
    pub fn tick(&mut self) -> u32 {
        self.clock.tick()
    }

    /// Jump to a frame published by an external animation loop.
    pub fn set_frame(&mut self, frame: u32) {
        self.clock.seek(frame);
    }

    pub fn frame(&self) -> RenderFrame {
        RenderFrame {
            width: self.width,
            height: self.height,
            frame: self.clock.frame(),
            playing: self.clock.is_playing(),
            opacity: self.filter.effective_opacity(),
            layers: self.filter.layers,
            points: self.mapped.clone(),
            revision: self.revision,
        }
    }

    /// Draw every enabled layer. A missing surface skips this frame.
    ///
    /// Returns the frame that was drawn.
    pub fn render<S: Surface>(&mut self, surface: Option<&mut S>) -> Option<RenderFrame> {
        let Some(surface) = surface else {
            tracing::debug!("No drawing surface; skipping frame");
            return None;
        };
        let frame = self.frame();
        draw_frame(surface, &frame, &mut self.heat);
        self.frames_rendered += 1;
        Some(frame)
    }

    /// Heat buffer rebuild count.
    pub fn heat_rebuilds(&self) -> u64 {
        self.heat.rebuilds()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Hover at a canvas position; updates and returns the tooltip.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Option<&Tooltip> {
        self.tooltip = hit_test(&self.mapped, Point2D::new(x, y), self.options.hit_radius_px)
            .map(|i| Tooltip::new(&self.mapped[i], &self.filtered[i]));
        self.tooltip.as_ref()
    }

    pub fn pointer_leave(&mut self) {
        self.tooltip = None;
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    /// Click at a canvas position. Invokes the click handler with the hit
    /// sample and returns it.
    pub fn pointer_click(&mut self, x: f64, y: f64) -> Option<InteractionSample> {
        let index = hit_test(&self.mapped, Point2D::new(x, y), self.options.hit_radius_px)?;
        let sample = self.filtered[index].clone();
        if let Some(handler) = self.on_point_click.as_mut() {
            handler(&sample);
        }
        Some(sample)
    }
}

fn draw_frame(surface: &mut dyn Surface, frame: &RenderFrame, heat: &mut HeatLayer) {
    surface.clear(palette::BACKGROUND);
    if frame.layers.grid {
        layers::draw_grid(surface, frame.width, frame.height);
    }
    if frame.layers.heat {
        let buffer = heat.ensure(
            &frame.points,
            frame.opacity,
            frame.width,
            frame.height,
            frame.revision,
        );
        surface.draw_image(buffer, 0, 0);
    }
    if frame.layers.points {
        layers::draw_points(surface, frame);
    }
    if frame.layers.paths {
        layers::draw_paths(surface, frame);
    }
    if frame.layers.legend {
        layers::draw_legend(surface, frame.width);
    }
}
