//! Interaction samples: one observed user action with its context.

use serde::{Deserialize, Serialize};

use heatlens_common::clock::EpochMs;

use crate::geometry::{Rect, ScrollOffset, ViewportSize};

/// Kind of interaction a sample records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Click,
    #[serde(rename = "mousemove")]
    MouseMove,
    Scroll,
    Touch,
    FormInput,
    Keyboard,
    Manual,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Click,
        EventType::MouseMove,
        EventType::Scroll,
        EventType::Touch,
        EventType::FormInput,
        EventType::Keyboard,
        EventType::Manual,
    ];

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Click => "click",
            EventType::MouseMove => "mousemove",
            EventType::Scroll => "scroll",
            EventType::Touch => "touch",
            EventType::FormInput => "form_input",
            EventType::Keyboard => "keyboard",
            EventType::Manual => "manual",
        }
    }

    /// Parse a wire name.
    pub fn parse(name: &str) -> Option<EventType> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single captured interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSample {
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Viewport coordinates.
    pub x: f64,
    pub y: f64,

    /// Document coordinates (viewport + scroll offset).
    #[serde(default)]
    pub page_x: f64,
    #[serde(default)]
    pub page_y: f64,

    /// Heuristic weight in `[0.0, 1.0]`.
    pub intensity: f64,

    /// Capture time, epoch milliseconds.
    pub timestamp: EpochMs,

    #[serde(default)]
    pub session_id: String,

    /// Viewport size at capture time.
    #[serde(default)]
    pub viewport: ViewportSize,

    #[serde(default)]
    pub scroll: ScrollOffset,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub referrer: String,

    #[serde(default)]
    pub user_agent: String,

    #[serde(default)]
    pub detail: SampleDetail,

    /// Occurrence count when this sample stands for several merged ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

impl InteractionSample {
    /// Create a sample with bare coordinates. Intensity is clamped to `[0, 1]`.
    pub fn new(
        event_type: EventType,
        x: f64,
        y: f64,
        intensity: f64,
        timestamp: EpochMs,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            x,
            y,
            page_x: x,
            page_y: y,
            intensity: clamp_intensity(intensity),
            timestamp,
            session_id: session_id.into(),
            viewport: ViewportSize::default(),
            scroll: ScrollOffset::default(),
            url: String::new(),
            path: String::new(),
            referrer: String::new(),
            user_agent: String::new(),
            detail: SampleDetail::Plain,
            count: None,
        }
    }

    pub fn with_viewport(mut self, viewport: ViewportSize) -> Self {
        self.viewport = viewport;
        self
    }

    /// Set the scroll offset and derive document coordinates from it.
    pub fn with_scroll(mut self, scroll: ScrollOffset) -> Self {
        self.scroll = scroll;
        self.page_x = self.x + scroll.x;
        self.page_y = self.y + scroll.y;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_detail(mut self, detail: SampleDetail) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Capture time as a UTC date, if the timestamp is representable.
    pub fn captured_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.timestamp)
    }

    /// Whether all coordinates are finite numbers.
    pub fn has_finite_coordinates(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.page_x.is_finite() && self.page_y.is_finite()
    }
}

/// Clamp a raw weight into `[0, 1]`; non-finite weights become 0.
pub fn clamp_intensity(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Per-type payload attached to a sample.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SampleDetail {
    /// No payload (pointer movement, legacy rows).
    #[default]
    Plain,

    Click {
        element: ElementDescriptor,
        /// Application module derived from the URL path.
        module: String,
        /// Nearest ancestor section marker.
        section: Option<String>,
    },

    Scroll {
        /// Scroll depth in `[0, 100]`.
        percent: f64,
        direction: ScrollDirection,
    },

    Touch {
        touch_count: u32,
    },

    FormInput {
        field: FieldDescriptor,
        form_type: FormType,
        /// Length of the field value; the value itself is never recorded.
        value_length: usize,
    },

    Keyboard {
        key: String,
        code: String,
        modifiers: Modifiers,
        focused: Option<FocusSnapshot>,
    },

    Manual {
        label: Option<String>,
    },
}

/// Semantic description of a clicked element.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub tag: String,
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    /// Visible text, truncated.
    #[serde(default)]
    pub text: String,
    /// Structural selector path, outermost first.
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub rect: Rect,
}

/// Identity of a form field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    pub name: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Semantic bucket of the form that owns an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormType {
    Login,
    Patient,
    Report,
    Message,
    Bristol,
    Search,
    Settings,
    #[default]
    Other,
}

/// Scroll direction relative to the previous scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    #[default]
    #[serde(rename = "none")]
    Unchanged,
}

/// Keyboard modifier flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

/// The element that had focus when a key was pressed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    pub tag: String,
    pub id: Option<String>,
    pub field_type: Option<String>,
}
