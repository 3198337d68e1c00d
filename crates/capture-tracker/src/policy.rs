//! Capture policy: intensity weights, element descriptors, and context tags.

use heatlens_common::error::{HeatlensError, HeatlensResult};
use heatlens_event_model::sample::{ElementDescriptor, FormType};

use crate::host::{ElementInfo, FormInfo};

pub const CLICK_INTERACTIVE_INTENSITY: f64 = 0.9;
pub const CLICK_CONTAINER_INTENSITY: f64 = 0.6;
pub const CLICK_DEFAULT_INTENSITY: f64 = 0.4;
pub const POINTER_INTENSITY: f64 = 0.3;
pub const SCROLL_INTENSITY: f64 = 0.5;
pub const TOUCH_INTENSITY: f64 = 0.8;
pub const FORM_INPUT_INTENSITY: f64 = 0.7;
pub const KEYBOARD_INTENSITY: f64 = 0.2;

pub const POINTER_THROTTLE_MS: i64 = 100;
pub const SCROLL_THROTTLE_MS: i64 = 250;

const TEXT_LIMIT: usize = 50;
const SELECTOR_DEPTH: usize = 5;

const INTERACTIVE_TAGS: &[&str] = &[
    "a", "button", "input", "select", "textarea", "label", "summary", "option",
];
const CONTAINER_TAGS: &[&str] = &["div", "section", "article", "main", "li", "td", "span", "p"];

/// Keyword substrings checked against the owning form's id and classes, in order.
const FORM_KEYWORDS: &[(&str, FormType)] = &[
    ("login", FormType::Login),
    ("signin", FormType::Login),
    ("patient", FormType::Patient),
    ("report", FormType::Report),
    ("shift", FormType::Report),
    ("message", FormType::Message),
    ("chat", FormType::Message),
    ("bristol", FormType::Bristol),
    ("stool", FormType::Bristol),
    ("search", FormType::Search),
    ("setting", FormType::Settings),
];

fn tag_of(element: &ElementInfo) -> String {
    element.tag.trim().to_ascii_lowercase()
}

/// Whether the element is natively interactive or carries an interactive role.
pub fn is_interactive(element: &ElementInfo) -> bool {
    let tag = tag_of(element);
    INTERACTIVE_TAGS.contains(&tag.as_str())
        || matches!(element.role.as_deref(), Some("button") | Some("link"))
}

/// Click weight: interactive 0.9, content container 0.6, anything else 0.4.
pub fn click_intensity(element: &ElementInfo) -> f64 {
    if is_interactive(element) {
        CLICK_INTERACTIVE_INTENSITY
    } else if CONTAINER_TAGS.contains(&tag_of(element).as_str()) {
        CLICK_CONTAINER_INTENSITY
    } else {
        CLICK_DEFAULT_INTENSITY
    }
}

pub fn is_button(element: &ElementInfo) -> bool {
    tag_of(element) == "button" || element.role.as_deref() == Some("button")
}

pub fn is_link(element: &ElementInfo) -> bool {
    tag_of(element) == "a" || element.role.as_deref() == Some("link")
}

fn selector_segment(tag: &str, id: Option<&str>, classes: &[String]) -> String {
    let tag = tag.to_ascii_lowercase();
    if let Some(id) = id.filter(|id| !id.is_empty()) {
        return format!("{tag}#{id}");
    }
    let mut segment = tag;
    for class in classes.iter().filter(|c| !c.is_empty()).take(2) {
        segment.push('.');
        segment.push_str(class);
    }
    segment
}

/// Structural selector, outermost ancestor first, limited to a few levels.
pub fn selector_path(element: &ElementInfo) -> String {
    let mut segments: Vec<String> = element
        .ancestors
        .iter()
        .take(SELECTOR_DEPTH)
        .map(|a| selector_segment(&a.tag, a.id.as_deref(), &a.classes))
        .collect();
    segments.reverse();
    segments.push(selector_segment(
        &element.tag,
        element.id.as_deref(),
        &element.classes,
    ));
    segments.join(" > ")
}

/// Collapse whitespace and cut to the first 50 characters.
pub fn truncate_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(TEXT_LIMIT).collect()
}

/// Build the semantic descriptor of a clicked element.
///
/// Fails for elements that cannot be described (no tag, non-finite box);
/// the caller drops the sample.
pub fn describe_element(element: &ElementInfo) -> HeatlensResult<ElementDescriptor> {
    if element.tag.trim().is_empty() {
        return Err(HeatlensError::tracker("element has no tag name"));
    }
    if !element.rect.is_finite() {
        return Err(HeatlensError::tracker(format!(
            "element <{}> has a non-finite bounding box",
            element.tag
        )));
    }
    Ok(ElementDescriptor {
        tag: tag_of(element),
        id: element.id.clone().filter(|id| !id.is_empty()),
        classes: element.classes.clone(),
        text: truncate_text(&element.text),
        selector: selector_path(element),
        rect: element.rect,
    })
}

/// Application module: the first path segment, `"home"` for the root.
pub fn module_from_path(path: &str) -> String {
    path.split(['?', '#'])
        .next()
        .unwrap_or_default()
        .split('/')
        .find(|segment| !segment.is_empty())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "home".to_string())
}

/// The element's own section marker or that of its nearest marked ancestor.
pub fn section_of(element: &ElementInfo) -> Option<String> {
    element
        .section
        .clone()
        .or_else(|| element.ancestors.iter().find_map(|a| a.section.clone()))
}

/// Bucket a form by keyword substrings of its id and classes.
pub fn classify_form(form: Option<&FormInfo>) -> FormType {
    let Some(form) = form else {
        return FormType::Other;
    };
    let mut haystack = form.id.clone().unwrap_or_default();
    for class in &form.classes {
        haystack.push(' ');
        haystack.push_str(class);
    }
    let haystack = haystack.to_ascii_lowercase();
    FORM_KEYWORDS
        .iter()
        .find(|(keyword, _)| haystack.contains(keyword))
        .map(|(_, form_type)| *form_type)
        .unwrap_or(FormType::Other)
}

/// Scroll depth in percent, clamped to `[0, 100]`.
///
/// A document that does not scroll reports 0.
pub fn scroll_percent(scroll_y: f64, document_height: f64, viewport_height: f64) -> f64 {
    let scrollable = document_height - viewport_height;
    if scrollable <= 0.0 || !scrollable.is_finite() || !scroll_y.is_finite() {
        return 0.0;
    }
    (scroll_y / scrollable * 100.0).clamp(0.0, 100.0)
}
