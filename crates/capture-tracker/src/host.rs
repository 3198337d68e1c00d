//! Host page seam: raw host events and page state snapshots.

use std::sync::{Arc, Mutex, MutexGuard};

use heatlens_common::error::{HeatlensError, HeatlensResult};
use heatlens_event_model::geometry::{Point2D, Rect, ScrollOffset, ViewportSize};
use heatlens_event_model::sample::{FocusSnapshot, Modifiers};

use crate::PageHost;

/// Page state read at the moment a listener fires.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub viewport: ViewportSize,
    pub scroll: ScrollOffset,
    /// Full document height in CSS pixels.
    pub document_height: f64,
    pub url: String,
    pub path: String,
    pub referrer: String,
    pub user_agent: String,
    /// Currently focused element, if any.
    pub active_element: Option<FocusSnapshot>,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            viewport: ViewportSize::new(1280, 720),
            scroll: ScrollOffset::default(),
            document_height: 720.0,
            url: "http://localhost/".to_string(),
            path: "/".to_string(),
            referrer: String::new(),
            user_agent: "heatlens".to_string(),
            active_element: None,
        }
    }
}

/// An element ancestor, nearest first in [`ElementInfo::ancestors`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AncestorInfo {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Value of the section marker attribute, if present.
    pub section: Option<String>,
}

/// The element an interaction targeted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementInfo {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub role: Option<String>,
    pub text: String,
    /// Bounding box in viewport coordinates.
    pub rect: Rect,
    pub section: Option<String>,
    pub ancestors: Vec<AncestorInfo>,
}

impl ElementInfo {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn with_ancestor(mut self, ancestor: AncestorInfo) -> Self {
        self.ancestors.push(ancestor);
        self
    }
}

/// The form that owns an input field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FormInfo {
    pub id: Option<String>,
    pub classes: Vec<String>,
}

/// A form field that received input. Carries the value length only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldInfo {
    pub tag: String,
    pub name: Option<String>,
    pub id: Option<String>,
    pub field_type: String,
    pub value_length: usize,
    pub rect: Rect,
    pub form: Option<FormInfo>,
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyInfo {
    pub key: String,
    pub code: String,
    pub modifiers: Modifiers,
}

/// Raw events delivered by the host page's listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Click {
        client_x: f64,
        client_y: f64,
        target: ElementInfo,
    },
    PointerMove {
        client_x: f64,
        client_y: f64,
    },
    /// The document scrolled; the new offset is read from [`PageState`].
    Scroll,
    TouchStart {
        touches: Vec<Point2D>,
    },
    FormInput {
        field: FieldInfo,
    },
    KeyDown(KeyInfo),
    VisibilityChange {
        hidden: bool,
    },
    Unload,
}

impl HostEvent {
    /// Listener name for logging.
    pub fn listener(&self) -> &'static str {
        match self {
            HostEvent::Click { .. } => "click",
            HostEvent::PointerMove { .. } => "mousemove",
            HostEvent::Scroll => "scroll",
            HostEvent::TouchStart { .. } => "touchstart",
            HostEvent::FormInput { .. } => "input",
            HostEvent::KeyDown(_) => "keydown",
            HostEvent::VisibilityChange { .. } => "visibilitychange",
            HostEvent::Unload => "beforeunload",
        }
    }
}

/// Scripted host whose page state is shared between clones.
///
/// Tests and simulations keep a clone to move the page (scroll, resize)
/// while the tracker owns the other.
#[derive(Debug, Clone, Default)]
pub struct StaticPage {
    state: Arc<Mutex<PageState>>,
    unavailable: bool,
}

impl StaticPage {
    pub fn new(state: PageState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            unavailable: false,
        }
    }

    /// A host whose listener attachment always fails.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_scroll(&self, x: f64, y: f64) {
        self.lock().scroll = ScrollOffset { x, y };
    }

    pub fn set_document_height(&self, height: f64) {
        self.lock().document_height = height;
    }

    pub fn set_path(&self, path: impl Into<String>) {
        let path = path.into();
        let mut state = self.lock();
        state.url = format!("http://localhost{path}");
        state.path = path;
    }

    pub fn set_active_element(&self, element: Option<FocusSnapshot>) {
        self.lock().active_element = element;
    }
}

impl PageHost for StaticPage {
    fn attach(&mut self) -> HeatlensResult<()> {
        if self.unavailable {
            return Err(HeatlensError::host_unavailable("document is not available"));
        }
        Ok(())
    }

    fn page(&self) -> PageState {
        self.lock().clone()
    }

    fn name(&self) -> &str {
        "static"
    }
}
