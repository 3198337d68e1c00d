//! Print statistics for a point cloud.

use std::path::PathBuf;

use heatlens_common::config::EngineDefaults;
use heatlens_event_model::sample::EventType;
use heatlens_heatmap_engine::{HeatmapFilterState, HeatmapView, ViewOptions};

use super::input::{load_points, print_report};

pub fn run(
    input: PathBuf,
    json: bool,
    filter: HeatmapFilterState,
    defaults: &EngineDefaults,
) -> anyhow::Result<()> {
    let options = ViewOptions::from(defaults);
    let (points, report) = load_points(&input, options.reference)?;
    let loaded = points.len();

    let view = HeatmapView::new(
        points,
        filter,
        defaults.canvas_width,
        defaults.canvas_height,
        false,
        None,
    )
    .with_options(options);
    let stats = view.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Heatmap statistics: {}", input.display());
    print_report(&report);
    println!("  Loaded points:   {loaded}");
    println!("  Filtered points: {}", stats.total);
    println!("  Sessions:        {}", stats.sessions);
    println!("  Mean intensity:  {:.2}", stats.mean_intensity);
    for event_type in EventType::ALL {
        let count = stats.count(event_type);
        if count > 0 {
            println!("    {:<10} {count}", event_type.as_str());
        }
    }
    if let Some(cell) = &stats.hottest_cell {
        println!(
            "  Hottest cell:    ({:.0}, {:.0}) {}px, density {:.2}",
            cell.x, cell.y, cell.size, cell.density
        );
    }
    Ok(())
}
