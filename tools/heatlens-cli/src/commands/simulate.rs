//! Run a scripted browsing session through the tracker.
//!
//! The session is generated from the options alone, so two runs with the
//! same options produce the same samples (session id and timestamps aside).

use std::path::PathBuf;
use std::sync::Arc;

use heatlens_capture_tracker::host::{AncestorInfo, ElementInfo, FieldInfo, FormInfo, KeyInfo, PageState};
use heatlens_capture_tracker::{FlushOutcome, HostEvent, SpoolTransport, StaticPage, Tracker, TrackerState};
use heatlens_common::clock::ManualClock;
use heatlens_common::config::TrackerConfig;
use heatlens_event_model::geometry::{Point2D, Rect, ViewportSize};
use heatlens_event_model::sample::FocusSnapshot;

const POINTER_STEP_MS: i64 = 120;
const SCROLL_STEP_MS: i64 = 2_500;
const RAGE_BURST: usize = 5;
const RAGE_SPACING_MS: i64 = 150;
const PAGE_PATH: &str = "/patients/intake";

pub struct SimulateOptions {
    pub output: PathBuf,
    pub clicks: usize,
    pub duration_ms: i64,
    pub viewport: (u32, u32),
    pub rage: bool,
    pub config: TrackerConfig,
}

enum Step {
    Host(HostEvent),
    ScrollTo(f64),
    Focus(Option<FocusSnapshot>),
}

pub async fn run(options: SimulateOptions) -> anyhow::Result<()> {
    if options.duration_ms <= 0 {
        return Err(anyhow::anyhow!("Session duration must be positive"));
    }
    options
        .config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid tracker config: {e}"))?;

    let viewport = ViewportSize::new(options.viewport.0, options.viewport.1);
    println!("Simulating session into: {}", options.output.display());
    println!("  Viewport: {}x{}", viewport.width, viewport.height);
    println!(
        "  Duration: {}ms, batch size {}, flush every {}ms",
        options.duration_ms, options.config.batch_size, options.config.flush_interval_ms
    );

    let page = StaticPage::new(PageState {
        viewport,
        document_height: viewport.height as f64 * 3.0,
        url: format!("http://localhost{PAGE_PATH}"),
        path: PAGE_PATH.to_string(),
        user_agent: "heatlens-simulator".to_string(),
        ..PageState::default()
    });
    let start_ms = chrono::Utc::now().timestamp_millis();
    let clock = ManualClock::new(start_ms);
    let spool = Arc::new(SpoolTransport::create(&options.output)?);

    let mut tracker = Tracker::new(
        options.config.clone(),
        Box::new(page.clone()),
        spool.clone(),
        Arc::new(clock.clone()),
    );
    if tracker.init() != TrackerState::Active {
        return Err(anyhow::anyhow!("Tracker failed to start"));
    }

    let script = build_script(&options, viewport);
    let interval = options.config.flush_interval_ms.max(1) as i64;
    let mut next_flush = interval;
    let mut flushes = FlushCounts::default();

    for (at, step) in script {
        while next_flush <= at {
            clock.set(start_ms + next_flush);
            flushes.record(tracker.flush().await);
            next_flush += interval;
        }
        clock.set(start_ms + at);
        match step {
            Step::Host(event) => tracker.handle(event),
            Step::ScrollTo(y) => {
                page.set_scroll(0.0, y);
                tracker.handle(HostEvent::Scroll);
            }
            Step::Focus(element) => page.set_active_element(element),
        }
    }

    clock.set(start_ms + options.duration_ms);
    let behavior = tracker.behavior();
    tracker.handle(HostEvent::Unload);
    let delivery = tracker.delivery();

    println!("Session {}", behavior.session_id);
    println!(
        "  Clicks: {} ({} rage), moves: {}, scrolls: {}, max depth {:.0}%",
        behavior.counters.total_clicks,
        behavior.counters.rage_clicks,
        behavior.counters.mouse_moves,
        behavior.counters.scroll_events,
        behavior.counters.max_scroll_depth
    );
    println!(
        "  Flushes: {} delivered, {} requeued, {} idle",
        flushes.delivered, flushes.requeued, flushes.idle
    );
    println!(
        "  Records: {} in batches, {} in final envelope",
        delivery.records_delivered, delivery.final_records
    );
    println!("  Attention: {}ms of {}ms", behavior.attention_time_ms, behavior.session_duration_ms);
    println!(
        "Wrote {} envelopes to {}",
        spool.envelopes_written(),
        spool.path().display()
    );
    Ok(())
}

#[derive(Default)]
struct FlushCounts {
    delivered: usize,
    requeued: usize,
    idle: usize,
}

impl FlushCounts {
    fn record(&mut self, outcome: FlushOutcome) {
        match outcome {
            FlushOutcome::Delivered(_) => self.delivered += 1,
            FlushOutcome::Requeued(_) => self.requeued += 1,
            FlushOutcome::Idle | FlushOutcome::InFlight => self.idle += 1,
        }
    }
}

/// Ordered `(offset_ms, step)` pairs covering the whole session.
fn build_script(options: &SimulateOptions, viewport: ViewportSize) -> Vec<(i64, Step)> {
    let duration = options.duration_ms;
    let w = viewport.width as f64;
    let h = viewport.height as f64;
    let mut script = Vec::new();

    // Lissajous sweep across the viewport.
    let mut t = POINTER_STEP_MS;
    while t < duration {
        let phase = t as f64 / duration as f64 * std::f64::consts::TAU;
        let position = Point2D::new(
            w * (0.5 + 0.4 * (phase * 3.0).sin()),
            h * (0.5 + 0.4 * (phase * 2.0).cos()),
        );
        script.push((
            t,
            Step::Host(HostEvent::PointerMove {
                client_x: position.x,
                client_y: position.y,
            }),
        ));
        t += POINTER_STEP_MS;
    }

    let targets = click_targets(w, h);
    for i in 0..options.clicks {
        let at = duration * (i as i64 + 1) / (options.clicks as i64 + 1);
        let target = &targets[i % targets.len()];
        let center = target.rect.center();
        script.push((
            at,
            Step::Host(HostEvent::Click {
                client_x: center.x,
                client_y: center.y,
                target: target.clone(),
            }),
        ));
    }

    if options.rage {
        let first = duration / 2 + 37;
        let target = ElementInfo::new("div")
            .with_class("vitals-card")
            .with_text("Blood pressure")
            .with_rect(Rect::new(w * 0.6, h * 0.4, 220.0, 160.0));
        let base = target.rect.center();
        for i in 0..RAGE_BURST {
            let jitter = (i as f64 * 7.0) % 20.0 - 10.0;
            script.push((
                first + i as i64 * RAGE_SPACING_MS,
                Step::Host(HostEvent::Click {
                    client_x: base.x + jitter,
                    client_y: base.y - jitter,
                    target: target.clone(),
                }),
            ));
        }
    }

    let max_scroll = (h * 2.0).max(0.0);
    let mut t = SCROLL_STEP_MS;
    let mut step = 0u32;
    while t < duration {
        step += 1;
        let y = (max_scroll * step as f64 / 6.0).min(max_scroll);
        script.push((t, Step::ScrollTo(y)));
        t += SCROLL_STEP_MS;
    }

    script.push((
        duration * 65 / 100,
        Step::Host(HostEvent::TouchStart {
            touches: vec![Point2D::new(w * 0.3, h * 0.7)],
        }),
    ));

    let nhs_number = FieldInfo {
        tag: "input".to_string(),
        name: Some("nhs_number".to_string()),
        id: Some("intake-nhs-number".to_string()),
        field_type: "text".to_string(),
        value_length: 10,
        rect: Rect::new(w * 0.35, h * 0.8, 280.0, 36.0),
        form: Some(FormInfo {
            id: Some("patient-intake".to_string()),
            classes: vec!["intake-form".to_string()],
        }),
    };
    script.push((
        duration * 69 / 100,
        Step::Focus(Some(FocusSnapshot {
            tag: "input".to_string(),
            id: nhs_number.id.clone(),
            field_type: Some(nhs_number.field_type.clone()),
        })),
    ));
    script.push((duration * 70 / 100, Step::Host(HostEvent::FormInput { field: nhs_number })));
    script.push((
        duration * 72 / 100,
        Step::Host(HostEvent::KeyDown(KeyInfo {
            key: "Enter".to_string(),
            code: "Enter".to_string(),
            ..KeyInfo::default()
        })),
    ));

    script.push((duration * 75 / 100, Step::Focus(None)));
    script.push((
        duration * 80 / 100,
        Step::Host(HostEvent::VisibilityChange { hidden: true }),
    ));
    script.push((
        duration * 85 / 100,
        Step::Host(HostEvent::VisibilityChange { hidden: false }),
    ));

    // Stable: steps at the same offset keep their insertion order.
    script.sort_by_key(|(at, _)| *at);
    script
}

fn click_targets(w: f64, h: f64) -> Vec<ElementInfo> {
    let intake = AncestorInfo {
        tag: "section".to_string(),
        id: Some("intake".to_string()),
        section: Some("patient-intake".to_string()),
        ..AncestorInfo::default()
    };
    vec![
        ElementInfo::new("button")
            .with_id("save-intake")
            .with_class("btn")
            .with_class("primary")
            .with_text("Save intake")
            .with_rect(Rect::new(w * 0.45, h * 0.3, 160.0, 44.0))
            .with_ancestor(intake.clone()),
        ElementInfo::new("a")
            .with_class("nav-link")
            .with_text("Reports")
            .with_rect(Rect::new(w * 0.8, 12.0, 60.0, 24.0)),
        ElementInfo::new("div")
            .with_class("vitals-summary")
            .with_text("Latest observations")
            .with_rect(Rect::new(w * 0.1, h * 0.55, 240.0, 120.0))
            .with_ancestor(intake),
        ElementInfo::new("p")
            .with_text("Need help? Contact the ward office.")
            .with_rect(Rect::new(w * 0.2, h * 0.9, 300.0, 20.0)),
    ]
}
