//! Point cloud loading shared by `render` and `stats`.

use std::path::Path;

use heatlens_common::error::HeatlensError;
use heatlens_event_model::geometry::ViewportSize;
use heatlens_event_model::ingest::{
    parse_envelopes, parse_heatmap_response, samples_from_envelopes, sanitize_samples, IngestReport,
};
use heatlens_event_model::sample::InteractionSample;

/// Read a heatmap query response (`{"heatmapData": [...]}`) or a JSONL
/// envelope spool and return sanitized samples.
pub fn load_points(
    path: &Path,
    reference: ViewportSize,
) -> anyhow::Result<(Vec<InteractionSample>, IngestReport)> {
    if !path.exists() {
        return Err(HeatlensError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let content = std::fs::read_to_string(path)?;

    if is_heatmap_response(&content) {
        let loaded = parse_heatmap_response(&content, reference)?;
        tracing::debug!(path = %path.display(), points = loaded.0.len(), "Loaded heatmap response");
        return Ok(loaded);
    }

    let envelopes = parse_envelopes(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse spool {}: {e}", path.display()))?;
    let samples = samples_from_envelopes(&envelopes);
    tracing::debug!(
        path = %path.display(),
        envelopes = envelopes.len(),
        points = samples.len(),
        "Loaded envelope spool"
    );
    Ok(sanitize_samples(samples, reference))
}

fn is_heatmap_response(content: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(content)
        .map(|value| value.get("heatmapData").is_some())
        .unwrap_or(false)
}

pub fn print_report(report: &IngestReport) {
    if report.dropped > 0 || report.clamped > 0 || report.defaulted_viewport > 0 {
        println!(
            "  Sanitized: {} dropped, {} clamped, {} defaulted viewport",
            report.dropped, report.clamped, report.defaulted_viewport
        );
    }
}
