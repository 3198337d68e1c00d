//! Heatlens CLI: simulate tracked sessions and render heatmaps.
//!
//! Usage:
//!   heatlens simulate [OPTIONS]     Run a scripted session into a JSONL spool
//!   heatlens render <INPUT>         Render a point cloud to PNG
//!   heatlens stats <INPUT>          Summarize a point cloud

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use heatlens_common::clock::EpochMs;
use heatlens_common::config::AppConfig;
use heatlens_event_model::sample::EventType;
use heatlens_heatmap_engine::filter::{
    DeviceFilter, EventTypeToggles, HeatmapFilterState, IntensityRange, TimeRange,
};

mod commands;

#[derive(Parser)]
#[command(
    name = "heatlens",
    about = "Behavioral analytics capture and heatmap rendering",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session through the tracker into a JSONL spool
    Simulate {
        /// Spool file to write
        #[arg(short, long, default_value = "heatlens-spool.jsonl")]
        output: PathBuf,

        /// Number of clicks in the session
        #[arg(long, default_value = "12")]
        clicks: usize,

        /// Session length (milliseconds)
        #[arg(long, default_value = "30000")]
        duration_ms: i64,

        /// Records per flush (overrides config)
        #[arg(long)]
        batch_size: Option<usize>,

        /// Flush period in milliseconds (overrides config)
        #[arg(long)]
        flush_interval_ms: Option<u64>,

        /// Capture viewport width
        #[arg(long, default_value = "1280")]
        viewport_width: u32,

        /// Capture viewport height
        #[arg(long, default_value = "720")]
        viewport_height: u32,

        /// Include a rage-click burst
        #[arg(long)]
        rage: bool,
    },

    /// Render a heatmap response or spool to PNG
    Render {
        /// Heatmap response JSON or JSONL spool
        input: PathBuf,

        /// Output PNG path
        #[arg(short, long, default_value = "heatmap.png")]
        output: PathBuf,

        /// Canvas width (defaults to config)
        #[arg(long)]
        width: Option<u32>,

        /// Canvas height (defaults to config)
        #[arg(long)]
        height: Option<u32>,

        /// Merge same-type samples per cell of this size (capture pixels)
        #[arg(long)]
        aggregate: Option<f64>,

        /// Animation frame to draw the point layer at
        #[arg(long)]
        frame: Option<u32>,

        /// TrueType/OpenType font for legend and count labels (overrides config)
        #[arg(long)]
        font: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Print statistics for a heatmap response or spool
    Stats {
        /// Heatmap response JSON or JSONL spool
        input: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RangeArg {
    LastHour,
    Last24Hours,
    Last7Days,
    Last30Days,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum DeviceArg {
    All,
    Desktop,
    Tablet,
    Mobile,
}

/// Filter flags shared by `render` and `stats`.
#[derive(Args, Clone)]
pub struct FilterArgs {
    /// Event types to include (comma separated), e.g. click,scroll
    #[arg(long, value_delimiter = ',')]
    types: Vec<String>,

    /// Minimum intensity
    #[arg(long, default_value = "0.0")]
    min_intensity: f64,

    /// Maximum intensity
    #[arg(long, default_value = "1.0")]
    max_intensity: f64,

    /// Path substring
    #[arg(long, default_value = "")]
    path: String,

    /// Device class
    #[arg(long, value_enum, default_value = "all")]
    device: DeviceArg,

    /// Relative time range, ending now (ignored when --since or --until is given)
    #[arg(long, value_enum, default_value = "all")]
    range: RangeArg,

    /// Custom window start (epoch ms)
    #[arg(long)]
    since: Option<i64>,

    /// Custom window end (epoch ms)
    #[arg(long)]
    until: Option<i64>,

    /// Heat layer opacity
    #[arg(long)]
    opacity: Option<f64>,

    /// Draw the session path layer
    #[arg(long)]
    paths: bool,

    /// Skip the heat layer
    #[arg(long)]
    no_heat: bool,

    /// Skip the point layer
    #[arg(long)]
    no_points: bool,

    /// Skip the background grid
    #[arg(long)]
    no_grid: bool,

    /// Skip the legend
    #[arg(long)]
    no_legend: bool,
}

impl FilterArgs {
    /// Builds the filter for local input. Relative ranges become a custom
    /// window starting `span` before `now`, since file input has no backend
    /// to resolve them.
    pub fn to_filter(&self, default_opacity: f64, now: EpochMs) -> anyhow::Result<HeatmapFilterState> {
        let event_types = if self.types.is_empty() {
            EventTypeToggles::default()
        } else {
            let parsed = self
                .types
                .iter()
                .map(|name| {
                    EventType::parse(name.trim())
                        .ok_or_else(|| anyhow::anyhow!("Unknown event type: {name}"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            EventTypeToggles::only(&parsed)
        };

        let relative = match self.range {
            RangeArg::LastHour => TimeRange::LastHour,
            RangeArg::Last24Hours => TimeRange::Last24Hours,
            RangeArg::Last7Days => TimeRange::Last7Days,
            RangeArg::Last30Days => TimeRange::Last30Days,
            RangeArg::All => TimeRange::All,
        };
        let custom = self.since.is_some() || self.until.is_some();
        let (time_range, custom_start, custom_end) = if custom {
            (TimeRange::Custom, self.since, self.until)
        } else {
            match relative.span_ms() {
                Some(span) => (TimeRange::Custom, Some(now - span), None),
                None => (TimeRange::All, None, None),
            }
        };

        let mut filter = HeatmapFilterState {
            time_range,
            custom_start,
            custom_end,
            event_types,
            intensity: IntensityRange::new(self.min_intensity, self.max_intensity),
            path: self.path.clone(),
            device: match self.device {
                DeviceArg::All => DeviceFilter::All,
                DeviceArg::Desktop => DeviceFilter::Desktop,
                DeviceArg::Tablet => DeviceFilter::Tablet,
                DeviceArg::Mobile => DeviceFilter::Mobile,
            },
            opacity: self.opacity.unwrap_or(default_opacity),
            ..Default::default()
        };
        filter.layers.paths = self.paths;
        filter.layers.heat = !self.no_heat;
        filter.layers.points = !self.no_points;
        filter.layers.grid = !self.no_grid;
        filter.layers.legend = !self.no_legend;
        Ok(filter)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    heatlens_common::logging::init_logging(&logging)?;

    match cli.command {
        Commands::Simulate {
            output,
            clicks,
            duration_ms,
            batch_size,
            flush_interval_ms,
            viewport_width,
            viewport_height,
            rage,
        } => {
            let mut tracker_config = config.tracker.clone();
            if let Some(batch_size) = batch_size {
                tracker_config.batch_size = batch_size;
            }
            if let Some(interval) = flush_interval_ms {
                tracker_config.flush_interval_ms = interval;
            }
            commands::simulate::run(commands::simulate::SimulateOptions {
                output,
                clicks,
                duration_ms,
                viewport: (viewport_width, viewport_height),
                rage,
                config: tracker_config,
            })
            .await
        }
        Commands::Render {
            input,
            output,
            width,
            height,
            aggregate,
            frame,
            font,
            filter,
        } => {
            let filter = filter.to_filter(config.engine.opacity, chrono::Utc::now().timestamp_millis())?;
            commands::render::run(
                input,
                output,
                width.unwrap_or(config.engine.canvas_width),
                height.unwrap_or(config.engine.canvas_height),
                aggregate,
                frame,
                font.or_else(|| config.engine.font_path.clone()),
                filter,
                &config.engine,
            )
        }
        Commands::Stats {
            input,
            json,
            filter,
        } => {
            let filter = filter.to_filter(config.engine.opacity, chrono::Utc::now().timestamp_millis())?;
            commands::stats::run(input, json, filter, &config.engine)
        }
    }
}
