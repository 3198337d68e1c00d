//! Filter state and the pure point filter.

use serde::{Deserialize, Serialize};

use heatlens_common::clock::EpochMs;
use heatlens_event_model::geometry::ViewportSize;
use heatlens_event_model::record::HeatmapQuery;
use heatlens_event_model::sample::{EventType, InteractionSample};

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Time window selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "last_hour")]
    LastHour,
    #[default]
    #[serde(rename = "last_24_hours")]
    Last24Hours,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    #[serde(rename = "all")]
    All,
    /// Explicit bounds from [`HeatmapFilterState::custom_start`] and `custom_end`.
    #[serde(rename = "custom")]
    Custom,
}

impl TimeRange {
    /// Window length for the relative ranges.
    pub fn span_ms(&self) -> Option<i64> {
        match self {
            TimeRange::LastHour => Some(HOUR_MS),
            TimeRange::Last24Hours => Some(DAY_MS),
            TimeRange::Last7Days => Some(7 * DAY_MS),
            TimeRange::Last30Days => Some(30 * DAY_MS),
            TimeRange::All | TimeRange::Custom => None,
        }
    }
}

/// Per-type visibility toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventTypeToggles {
    pub click: bool,
    pub mousemove: bool,
    pub scroll: bool,
    pub touch: bool,
    pub form_input: bool,
    pub keyboard: bool,
    pub manual: bool,
}

impl Default for EventTypeToggles {
    fn default() -> Self {
        Self {
            click: true,
            mousemove: true,
            scroll: true,
            touch: true,
            form_input: true,
            keyboard: true,
            manual: true,
        }
    }
}

impl EventTypeToggles {
    pub fn enabled(&self, event_type: EventType) -> bool {
        match event_type {
            EventType::Click => self.click,
            EventType::MouseMove => self.mousemove,
            EventType::Scroll => self.scroll,
            EventType::Touch => self.touch,
            EventType::FormInput => self.form_input,
            EventType::Keyboard => self.keyboard,
            EventType::Manual => self.manual,
        }
    }

    pub fn set(&mut self, event_type: EventType, on: bool) {
        let slot = match event_type {
            EventType::Click => &mut self.click,
            EventType::MouseMove => &mut self.mousemove,
            EventType::Scroll => &mut self.scroll,
            EventType::Touch => &mut self.touch,
            EventType::FormInput => &mut self.form_input,
            EventType::Keyboard => &mut self.keyboard,
            EventType::Manual => &mut self.manual,
        };
        *slot = on;
    }

    /// Toggles with only the given types enabled.
    pub fn only(types: &[EventType]) -> Self {
        let mut toggles = Self::default();
        for t in EventType::ALL {
            toggles.set(t, types.contains(&t));
        }
        toggles
    }
}

/// Inclusive intensity band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntensityRange {
    pub min: f64,
    pub max: f64,
}

impl Default for IntensityRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl IntensityRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, intensity: f64) -> bool {
        intensity >= self.min && intensity <= self.max
    }
}

/// Device class derived from the capture viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceClass {
    /// Below 768px is mobile, below 1024px tablet, anything wider desktop.
    /// A viewport without a width counts as the reference resolution.
    pub fn from_viewport(viewport: ViewportSize) -> Self {
        let width = viewport.or(ViewportSize::REFERENCE).width;
        if width < 768 {
            DeviceClass::Mobile
        } else if width < 1024 {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceFilter {
    #[default]
    All,
    Desktop,
    Tablet,
    Mobile,
}

impl DeviceFilter {
    pub fn admits(&self, class: DeviceClass) -> bool {
        match self {
            DeviceFilter::All => true,
            DeviceFilter::Desktop => class == DeviceClass::Desktop,
            DeviceFilter::Tablet => class == DeviceClass::Tablet,
            DeviceFilter::Mobile => class == DeviceClass::Mobile,
        }
    }
}

/// Render layer toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerToggles {
    pub grid: bool,
    pub heat: bool,
    pub points: bool,
    pub paths: bool,
    pub legend: bool,
}

impl Default for LayerToggles {
    fn default() -> Self {
        Self {
            grid: true,
            heat: true,
            points: true,
            paths: false,
            legend: true,
        }
    }
}

/// Everything the dashboard lets the user adjust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HeatmapFilterState {
    pub time_range: TimeRange,
    pub custom_start: Option<EpochMs>,
    pub custom_end: Option<EpochMs>,
    pub event_types: EventTypeToggles,
    pub intensity: IntensityRange,
    /// Case-insensitive substring of the sample path. Empty matches everything.
    pub path: String,
    pub device: DeviceFilter,
    pub layers: LayerToggles,
    /// Global heat-layer opacity in `[0, 1]`.
    pub opacity: f64,
}

impl Default for HeatmapFilterState {
    fn default() -> Self {
        Self {
            time_range: TimeRange::default(),
            custom_start: None,
            custom_end: None,
            event_types: EventTypeToggles::default(),
            intensity: IntensityRange::default(),
            path: String::new(),
            device: DeviceFilter::All,
            layers: LayerToggles::default(),
            opacity: 0.7,
        }
    }
}

impl HeatmapFilterState {
    /// Whether a single sample passes every predicate.
    ///
    /// Relative time ranges are applied by the backend query
    /// ([`HeatmapFilterState::to_query`]); only a custom window is checked here.
    pub fn matches(&self, sample: &InteractionSample) -> bool {
        self.event_types.enabled(sample.event_type)
            && self.intensity.contains(sample.intensity)
            && self.matches_path(&sample.path)
            && self
                .device
                .admits(DeviceClass::from_viewport(sample.viewport))
            && self.matches_time(sample.timestamp)
    }

    fn matches_path(&self, path: &str) -> bool {
        let needle = self.path.trim();
        if needle.is_empty() {
            return true;
        }
        path.to_lowercase().contains(&needle.to_lowercase())
    }

    fn matches_time(&self, timestamp: EpochMs) -> bool {
        if self.time_range != TimeRange::Custom {
            return true;
        }
        self.custom_start.map_or(true, |start| timestamp >= start)
            && self.custom_end.map_or(true, |end| timestamp <= end)
    }

    /// Backend query for this filter at time `now`.
    pub fn to_query(&self, now: EpochMs) -> HeatmapQuery {
        let (start_ms, end_ms) = match self.time_range {
            TimeRange::Custom => (self.custom_start, self.custom_end),
            TimeRange::All => (None, None),
            relative => (relative.span_ms().map(|span| now - span), None),
        };
        let path = self.path.trim();
        HeatmapQuery {
            start_ms,
            end_ms,
            path: (!path.is_empty()).then(|| path.to_string()),
        }
    }

    /// Opacity clamped to `[0, 1]`.
    pub fn effective_opacity(&self) -> f64 {
        if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Keep the points that pass `filter`, in input order.
pub fn filter_points(points: &[InteractionSample], filter: &HeatmapFilterState) -> Vec<InteractionSample> {
    points.iter().filter(|p| filter.matches(p)).cloned().collect()
}
