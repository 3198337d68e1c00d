//! Event type color key.

use image::Rgba;

use heatlens_event_model::sample::EventType;

pub const CLICK: Rgba<u8> = Rgba([0xef, 0x44, 0x44, 0xff]);
pub const MOUSE_MOVE: Rgba<u8> = Rgba([0x3b, 0x82, 0xf6, 0xff]);
pub const SCROLL: Rgba<u8> = Rgba([0x8b, 0x5c, 0xf6, 0xff]);
pub const TOUCH: Rgba<u8> = Rgba([0xf9, 0x73, 0x16, 0xff]);
pub const FORM_INPUT: Rgba<u8> = Rgba([0x10, 0xb9, 0x81, 0xff]);
pub const FALLBACK: Rgba<u8> = Rgba([0x6b, 0x72, 0x80, 0xff]);

pub const BACKGROUND: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xff]);
pub const GRID_LINE: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0x14]);
pub const POINT_BORDER: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xcc]);
pub const PATH_LINE: Rgba<u8> = Rgba([0x1f, 0x29, 0x37, 0x99]);
pub const LEGEND_PANEL: Rgba<u8> = Rgba([0xff, 0xff, 0xff, 0xe6]);
pub const TEXT: Rgba<u8> = Rgba([0x1f, 0x29, 0x37, 0xff]);

/// Legend entries, in display order.
pub const LEGEND: [(EventType, &str); 5] = [
    (EventType::Click, "Clicks"),
    (EventType::MouseMove, "Mouse Movement"),
    (EventType::Scroll, "Scrolling"),
    (EventType::Touch, "Touch"),
    (EventType::FormInput, "Form Input"),
];

/// Color for an event type. Types without a legend entry share a neutral gray.
pub fn color_for(event_type: EventType) -> Rgba<u8> {
    match event_type {
        EventType::Click => CLICK,
        EventType::MouseMove => MOUSE_MOVE,
        EventType::Scroll => SCROLL,
        EventType::Touch => TOUCH,
        EventType::FormInput => FORM_INPUT,
        EventType::Keyboard | EventType::Manual => FALLBACK,
    }
}

/// The same color with alpha replaced by `alpha` in `[0, 1]`.
pub fn with_alpha(color: Rgba<u8>, alpha: f64) -> Rgba<u8> {
    let Rgba([r, g, b, _]) = color;
    Rgba([r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8])
}

/// `#rrggbb` form of a color.
pub fn to_hex(color: Rgba<u8>) -> String {
    let Rgba([r, g, b, _]) = color;
    format!("#{r:02x}{g:02x}{b:02x}")
}
