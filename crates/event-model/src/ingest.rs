//! Validation and codecs at the consuming boundary.
//!
//! The heatmap engine assumes finite coordinates, intensities in `[0, 1]`
//! and a usable capture viewport. Data fetched from storage is passed
//! through [`sanitize_samples`] before it reaches the engine.

use heatlens_common::error::{HeatlensError, HeatlensResult};

use crate::geometry::ViewportSize;
use crate::record::{HeatmapResponse, IngestEnvelope};
use crate::sample::{clamp_intensity, InteractionSample};

/// Outcome counters of a sanitize pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    pub accepted: usize,
    /// Samples dropped for non-finite coordinates.
    pub dropped: usize,
    /// Samples whose intensity was outside `[0, 1]`.
    pub clamped: usize,
    /// Samples given the reference viewport.
    pub defaulted_viewport: usize,
}

/// Drop samples with non-finite coordinates, clamp intensities and
/// replace degenerate viewports with `reference`.
pub fn sanitize_samples(
    samples: Vec<InteractionSample>,
    reference: ViewportSize,
) -> (Vec<InteractionSample>, IngestReport) {
    let mut report = IngestReport::default();
    let mut out = Vec::with_capacity(samples.len());

    for mut sample in samples {
        if !sample.has_finite_coordinates() {
            report.dropped += 1;
            continue;
        }
        let clamped = clamp_intensity(sample.intensity);
        if clamped != sample.intensity {
            report.clamped += 1;
            sample.intensity = clamped;
        }
        if sample.viewport.is_degenerate() {
            report.defaulted_viewport += 1;
            sample.viewport = reference.or(ViewportSize::REFERENCE);
        }
        out.push(sample);
    }

    report.accepted = out.len();
    if report.dropped > 0 || report.clamped > 0 {
        tracing::warn!(
            dropped = report.dropped,
            clamped = report.clamped,
            accepted = report.accepted,
            "Sanitized malformed heatmap samples"
        );
    }
    (out, report)
}

/// Parse a `{heatmapData: [...]}` query response and sanitize it.
pub fn parse_heatmap_response(
    json: &str,
    reference: ViewportSize,
) -> HeatlensResult<(Vec<InteractionSample>, IngestReport)> {
    let response: HeatmapResponse = serde_json::from_str(json)
        .map_err(|e| HeatlensError::ingest(format!("Invalid heatmap response: {e}")))?;
    Ok(sanitize_samples(response.heatmap_data, reference))
}

/// Parse envelopes from JSONL content (one envelope per line).
///
/// Blank lines and `#` comment lines are skipped.
pub fn parse_envelopes(jsonl: &str) -> Result<Vec<IngestEnvelope>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize envelopes to JSONL format.
pub fn serialize_envelopes(envelopes: &[IngestEnvelope]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for envelope in envelopes {
        output.push_str(&serde_json::to_string(envelope)?);
        output.push('\n');
    }
    Ok(output)
}

/// Collect every sample carried by a sequence of envelopes, in delivery order.
pub fn samples_from_envelopes(envelopes: &[IngestEnvelope]) -> Vec<InteractionSample> {
    envelopes
        .iter()
        .flat_map(|envelope| envelope.samples().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{EnvelopeMetadata, NamedEvent, QueuedRecord};
    use crate::sample::EventType;

    fn sample(x: f64, intensity: f64) -> InteractionSample {
        InteractionSample {
            intensity,
            ..InteractionSample::new(EventType::Click, x, 10.0, 0.5, 0, "s")
        }
    }

    #[test]
    fn test_sanitize_drops_non_finite_and_clamps() {
        let input = vec![
            sample(1.0, 0.5),
            sample(f64::NAN, 0.5),
            sample(2.0, 1.7),
            sample(f64::INFINITY, 0.1),
            sample(3.0, -0.2),
        ];
        let (out, report) = sanitize_samples(input, ViewportSize::new(1280, 720));
        assert_eq!(out.len(), 3);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.clamped, 2);
        assert_eq!(report.defaulted_viewport, 3);
        assert!(out.iter().all(|s| (0.0..=1.0).contains(&s.intensity)));
        assert!(out.iter().all(|s| s.viewport == ViewportSize::new(1280, 720)));
    }

    #[test]
    fn test_sanitize_keeps_capture_viewport() {
        let s = sample(1.0, 0.5).with_viewport(ViewportSize::new(800, 600));
        let (out, report) = sanitize_samples(vec![s], ViewportSize::REFERENCE);
        assert_eq!(out[0].viewport, ViewportSize::new(800, 600));
        assert_eq!(report.defaulted_viewport, 0);
    }

    #[test]
    fn test_parse_heatmap_response_rejects_garbage() {
        let err = parse_heatmap_response("not json", ViewportSize::REFERENCE).unwrap_err();
        assert!(matches!(err, HeatlensError::Ingest { .. }));
    }

    #[test]
    fn test_envelope_jsonl_skips_comments() {
        let envelope = IngestEnvelope {
            events: vec![
                QueuedRecord::from(NamedEvent::new("page_view", 1, "s")),
                QueuedRecord::from(sample(4.0, 0.9)),
            ],
            session_id: "s".into(),
            timestamp: 2,
            metadata: EnvelopeMetadata::default(),
            is_final: false,
        };
        let jsonl = format!(
            "# spool\n{}\n",
            serialize_envelopes(std::slice::from_ref(&envelope)).unwrap()
        );
        let parsed = parse_envelopes(&jsonl).unwrap();
        assert_eq!(parsed, vec![envelope]);

        let samples = samples_from_envelopes(&parsed);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].x, 4.0);
    }
}
