//! Named events, queued records, and the ingestion/query envelopes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use heatlens_common::clock::EpochMs;

use crate::geometry::ViewportSize;
use crate::sample::InteractionSample;

/// Well-known named events.
pub mod names {
    pub const PAGE_VIEW: &str = "page_view";
    pub const RAGE_CLICK: &str = "rage_click";
    pub const PAGE_EXIT: &str = "page_exit";
    pub const VISIBILITY_CHANGE: &str = "visibility_change";
}

/// A higher-level event derived from raw interactions or injected by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEvent {
    pub event: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    pub timestamp: EpochMs,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub path: String,
}

impl NamedEvent {
    pub fn new(event: impl Into<String>, timestamp: EpochMs, session_id: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            properties: Map::new(),
            timestamp,
            session_id: session_id.into(),
            path: String::new(),
        }
    }

    /// Attach a property, replacing any previous value under `key`.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties.extend(properties);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

/// One entry of the outgoing queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueuedRecord {
    Sample(InteractionSample),
    Event(NamedEvent),
}

impl QueuedRecord {
    pub fn timestamp(&self) -> EpochMs {
        match self {
            QueuedRecord::Sample(s) => s.timestamp,
            QueuedRecord::Event(e) => e.timestamp,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            QueuedRecord::Sample(s) => &s.session_id,
            QueuedRecord::Event(e) => &e.session_id,
        }
    }

    pub fn as_sample(&self) -> Option<&InteractionSample> {
        match self {
            QueuedRecord::Sample(s) => Some(s),
            QueuedRecord::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&NamedEvent> {
        match self {
            QueuedRecord::Event(e) => Some(e),
            QueuedRecord::Sample(_) => None,
        }
    }
}

impl From<InteractionSample> for QueuedRecord {
    fn from(sample: InteractionSample) -> Self {
        QueuedRecord::Sample(sample)
    }
}

impl From<NamedEvent> for QueuedRecord {
    fn from(event: NamedEvent) -> Self {
        QueuedRecord::Event(event)
    }
}

/// Page metadata sent with every batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    pub user_agent: String,
    pub url: String,
    pub referrer: String,
    pub viewport: ViewportSize,
}

/// Body of `POST <endpoint>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestEnvelope {
    pub events: Vec<QueuedRecord>,
    pub session_id: String,
    /// Send time, epoch milliseconds.
    pub timestamp: EpochMs,
    pub metadata: EnvelopeMetadata,
    /// Set only on the unload flush.
    #[serde(rename = "final", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_final: bool,
}

impl IngestEnvelope {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Samples carried by this envelope, in order.
    pub fn samples(&self) -> impl Iterator<Item = &InteractionSample> {
        self.events.iter().filter_map(QueuedRecord::as_sample)
    }
}

/// Body returned by `GET <endpoint>?type=heatmap`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapResponse {
    #[serde(default)]
    pub heatmap_data: Vec<InteractionSample>,
}

/// Parameters of a heatmap query against the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeatmapQuery {
    pub start_ms: Option<EpochMs>,
    pub end_ms: Option<EpochMs>,
    pub path: Option<String>,
}

impl HeatmapQuery {
    /// Render as `<endpoint>?type=heatmap[&start=..][&end=..][&path=..]`.
    pub fn to_url(&self, endpoint: &str) -> String {
        let mut url = format!("{endpoint}?type=heatmap");
        if let Some(start) = self.start_ms {
            url.push_str(&format!("&start={start}"));
        }
        if let Some(end) = self.end_ms {
            url.push_str(&format!("&end={end}"));
        }
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            url.push_str("&path=");
            url.push_str(&encode_query_value(path));
        }
        url
    }
}

/// Percent-encode everything outside the unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
