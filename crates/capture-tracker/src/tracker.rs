//! The capture tracker state machine.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use heatlens_common::clock::{Clock, EpochMs, Throttle};
use heatlens_common::config::TrackerConfig;
use heatlens_common::error::HeatlensResult;
use heatlens_event_model::geometry::Point2D;
use heatlens_event_model::record::{names, EnvelopeMetadata, IngestEnvelope, NamedEvent, QueuedRecord};
use heatlens_event_model::sample::{
    clamp_intensity, EventType, FieldDescriptor, InteractionSample, SampleDetail, ScrollDirection,
};

use crate::host::{ElementInfo, FieldInfo, HostEvent, KeyInfo, PageState};
use crate::policy;
use crate::queue::EventQueue;
use crate::rage::RageClickDetector;
use crate::transport::Transport;
use crate::PageHost;

/// Lifecycle of a tracker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    /// Not attached; every host event is ignored.
    Uninitialized,
    /// Listeners attached, capturing and flushing.
    Active,
    /// The page unloaded; the final flush has been issued.
    Closed,
}

/// Rolling behavior counters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorCounters {
    pub total_clicks: u64,
    pub button_clicks: u64,
    pub link_clicks: u64,
    pub rage_clicks: u64,
    pub mouse_moves: u64,
    pub scroll_events: u64,
    /// Deepest scroll position reached, in percent.
    pub max_scroll_depth: f64,
    pub touches: u64,
    pub form_interactions: u64,
    pub key_presses: u64,
}

/// Counters plus session timing, as exposed to the host page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorSnapshot {
    pub session_id: String,
    pub state: TrackerState,
    pub counters: BehaviorCounters,
    /// Time since init, capped at the configured session timeout.
    pub session_duration_ms: i64,
    /// Time the page spent in the foreground.
    pub attention_time_ms: i64,
    pub queued: usize,
}

/// Delivery bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub failed_flushes: u64,
    pub final_records: u64,
}

/// A batch removed from the queue and not yet acknowledged.
#[derive(Debug)]
pub struct PendingBatch {
    pub envelope: IngestEnvelope,
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing queued, or the tracker is not active.
    Idle,
    /// Another batch is still in flight; this tick was skipped.
    InFlight,
    /// The batch was delivered.
    Delivered(usize),
    /// Delivery failed; the batch is back at the front of the queue.
    Requeued(usize),
}

/// Observes host events, converts them into samples and named events, and
/// delivers them in batches through a [`Transport`].
pub struct Tracker {
    config: TrackerConfig,
    state: TrackerState,
    session_id: String,
    clock: Arc<dyn Clock>,
    host: Box<dyn PageHost>,
    transport: Arc<dyn Transport>,
    queue: EventQueue,
    points: Vec<InteractionSample>,
    counters: BehaviorCounters,
    delivery: DeliveryStats,
    rage: RageClickDetector,
    pointer_gate: Throttle,
    scroll_gate: Throttle,
    last_scroll_y: f64,
    last_pointer: Point2D,
    last_timestamp: EpochMs,
    started_at: Option<EpochMs>,
    visible_since: Option<EpochMs>,
    attention_ms: i64,
    flush_in_flight: bool,
}

fn generate_session_id(now: EpochMs) -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("session_{now}_{}", &random[..9])
}

impl Tracker {
    /// Create an uninitialized tracker. The session id is fixed here.
    pub fn new(
        config: TrackerConfig,
        host: Box<dyn PageHost>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            config,
            state: TrackerState::Uninitialized,
            session_id: generate_session_id(now),
            clock,
            host,
            transport,
            queue: EventQueue::new(),
            points: Vec::new(),
            counters: BehaviorCounters::default(),
            delivery: DeliveryStats::default(),
            rage: RageClickDetector::default(),
            pointer_gate: Throttle::new(policy::POINTER_THROTTLE_MS),
            scroll_gate: Throttle::new(policy::SCROLL_THROTTLE_MS),
            last_scroll_y: 0.0,
            last_pointer: Point2D::default(),
            last_timestamp: now,
            started_at: None,
            visible_since: None,
            attention_ms: 0,
            flush_in_flight: false,
        }
    }

    /// Attach listeners and start capturing. Idempotent.
    ///
    /// If the host cannot attach, the failure is logged and the tracker
    /// stays uninitialized; there is no automatic retry.
    pub fn init(&mut self) -> TrackerState {
        if self.state != TrackerState::Uninitialized {
            return self.state;
        }

        if let Err(e) = self.config.validate().and_then(|_| self.host.attach()) {
            tracing::error!(host = %self.host.name(), error = %e, "Tracker initialization failed");
            return self.state;
        }

        let now = self.now();
        self.state = TrackerState::Active;
        self.started_at = Some(now);
        self.visible_since = Some(now);
        self.last_scroll_y = self.host.page().scroll.y;

        if self.config.track_page_views {
            let page = self.host.page();
            let event = self
                .named(names::PAGE_VIEW, now, &page)
                .with("title", page.path.clone())
                .with("referrer", page.referrer.clone())
                .with("viewportWidth", page.viewport.width)
                .with("viewportHeight", page.viewport.height);
            self.queue.push(event);
        }

        tracing::info!(
            session_id = %self.session_id,
            host = %self.host.name(),
            transport = %self.transport.name(),
            "Tracker started"
        );
        self.state
    }

    /// Dispatch one host event. Capture errors drop the sample and are logged.
    pub fn handle(&mut self, event: HostEvent) {
        if self.state != TrackerState::Active {
            tracing::trace!(listener = event.listener(), state = ?self.state, "Ignoring host event");
            return;
        }

        let listener = event.listener();
        let result = match event {
            HostEvent::Click {
                client_x,
                client_y,
                target,
            } => self.capture_click(client_x, client_y, &target),
            HostEvent::PointerMove { client_x, client_y } => {
                self.capture_pointer(client_x, client_y);
                Ok(())
            }
            HostEvent::Scroll => {
                self.capture_scroll();
                Ok(())
            }
            HostEvent::TouchStart { touches } => {
                self.capture_touch(&touches);
                Ok(())
            }
            HostEvent::FormInput { field } => {
                self.capture_form_input(&field);
                Ok(())
            }
            HostEvent::KeyDown(key) => {
                self.capture_key(&key);
                Ok(())
            }
            HostEvent::VisibilityChange { hidden } => {
                self.set_visibility(hidden);
                Ok(())
            }
            HostEvent::Unload => {
                self.unload();
                Ok(())
            }
        };

        if let Err(e) = result {
            tracing::warn!(listener, error = %e, "Dropped malformed sample");
        }
    }

    /// Current time, never earlier than the last timestamp issued.
    fn now(&mut self) -> EpochMs {
        let now = self.clock.now_ms().max(self.last_timestamp);
        self.last_timestamp = now;
        now
    }

    fn heatmap_enabled(&self) -> bool {
        self.config.enable_heatmap
    }

    fn named(&self, name: &str, timestamp: EpochMs, page: &PageState) -> NamedEvent {
        NamedEvent::new(name, timestamp, self.session_id.clone()).with_path(page.path.clone())
    }

    fn sample(
        &self,
        event_type: EventType,
        x: f64,
        y: f64,
        intensity: f64,
        timestamp: EpochMs,
        page: &PageState,
    ) -> InteractionSample {
        let mut sample =
            InteractionSample::new(event_type, x, y, intensity, timestamp, self.session_id.clone())
                .with_viewport(page.viewport)
                .with_scroll(page.scroll)
                .with_path(page.path.clone());
        sample.url = page.url.clone();
        sample.referrer = page.referrer.clone();
        sample.user_agent = page.user_agent.clone();
        sample
    }

    fn record_sample(&mut self, sample: InteractionSample) {
        self.points.push(sample.clone());
        self.queue.push(sample);
    }

    fn capture_click(&mut self, x: f64, y: f64, target: &ElementInfo) -> HeatlensResult<()> {
        if !self.heatmap_enabled() || !self.config.track_clicks {
            return Ok(());
        }
        let element = policy::describe_element(target)?;
        let now = self.now();
        let page = self.host.page();

        self.counters.total_clicks += 1;
        if policy::is_button(target) {
            self.counters.button_clicks += 1;
        }
        if policy::is_link(target) {
            self.counters.link_clicks += 1;
        }
        self.last_pointer = Point2D::new(x, y);

        let selector = element.selector.clone();
        let sample = self
            .sample(EventType::Click, x, y, policy::click_intensity(target), now, &page)
            .with_detail(SampleDetail::Click {
                element,
                module: policy::module_from_path(&page.path),
                section: policy::section_of(target),
            });
        self.record_sample(sample);

        if let Some(burst) = self.rage.record(now, Point2D::new(x, y)) {
            self.counters.rage_clicks += 1;
            tracing::debug!(count = burst.count, x = burst.x, y = burst.y, "Rage click detected");
            let event = self
                .named(names::RAGE_CLICK, now, &page)
                .with("clickCount", burst.count as u64)
                .with("x", burst.x)
                .with("y", burst.y)
                .with("element", selector);
            self.queue.push(event);
        }
        Ok(())
    }

    fn capture_pointer(&mut self, x: f64, y: f64) {
        if !self.heatmap_enabled() || !self.config.track_mouse_movement {
            return;
        }
        let now = self.clock.now_ms().max(self.last_timestamp);
        if !self.pointer_gate.admit(now) {
            return;
        }
        self.last_timestamp = now;
        self.last_pointer = Point2D::new(x, y);
        self.counters.mouse_moves += 1;

        let page = self.host.page();
        let sample = self.sample(EventType::MouseMove, x, y, policy::POINTER_INTENSITY, now, &page);
        self.record_sample(sample);
    }

    fn capture_scroll(&mut self) {
        if !self.heatmap_enabled() || !self.config.track_scrolling {
            return;
        }
        let now = self.clock.now_ms().max(self.last_timestamp);
        if !self.scroll_gate.admit(now) {
            return;
        }
        self.last_timestamp = now;

        let page = self.host.page();
        let scroll_y = page.scroll.y;
        let direction = if scroll_y > self.last_scroll_y {
            ScrollDirection::Down
        } else if scroll_y < self.last_scroll_y {
            ScrollDirection::Up
        } else {
            ScrollDirection::Unchanged
        };
        self.last_scroll_y = scroll_y;

        let percent = policy::scroll_percent(
            scroll_y,
            page.document_height,
            page.viewport.height as f64,
        );
        self.counters.scroll_events += 1;
        self.counters.max_scroll_depth = self.counters.max_scroll_depth.max(percent);

        let x = page.viewport.width as f64 / 2.0;
        let y = page.viewport.height as f64 / 2.0;
        let sample = self
            .sample(EventType::Scroll, x, y, policy::SCROLL_INTENSITY, now, &page)
            .with_detail(SampleDetail::Scroll { percent, direction });
        self.record_sample(sample);
    }

    fn capture_touch(&mut self, touches: &[Point2D]) {
        let Some(first) = touches.first() else {
            return;
        };
        let now = self.now();
        let page = self.host.page();
        self.counters.touches += 1;
        self.last_pointer = *first;

        let sample = self
            .sample(EventType::Touch, first.x, first.y, policy::TOUCH_INTENSITY, now, &page)
            .with_detail(SampleDetail::Touch {
                touch_count: touches.len() as u32,
            });
        self.record_sample(sample);
    }

    fn capture_form_input(&mut self, field: &FieldInfo) {
        if !self.heatmap_enabled() || !self.config.track_form_inputs {
            return;
        }
        let now = self.now();
        let page = self.host.page();
        self.counters.form_interactions += 1;

        let center = field.rect.center();
        let sample = self
            .sample(
                EventType::FormInput,
                center.x,
                center.y,
                policy::FORM_INPUT_INTENSITY,
                now,
                &page,
            )
            .with_detail(SampleDetail::FormInput {
                field: FieldDescriptor {
                    name: field.name.clone(),
                    id: field.id.clone(),
                    field_type: if field.field_type.is_empty() {
                        field.tag.to_ascii_lowercase()
                    } else {
                        field.field_type.clone()
                    },
                },
                form_type: policy::classify_form(field.form.as_ref()),
                value_length: field.value_length,
            });
        self.record_sample(sample);
    }

    fn capture_key(&mut self, key: &KeyInfo) {
        let now = self.now();
        let page = self.host.page();
        self.counters.key_presses += 1;

        let position = self.last_pointer;
        let sample = self
            .sample(
                EventType::Keyboard,
                position.x,
                position.y,
                policy::KEYBOARD_INTENSITY,
                now,
                &page,
            )
            .with_detail(SampleDetail::Keyboard {
                key: key.key.clone(),
                code: key.code.clone(),
                modifiers: key.modifiers,
                focused: page.active_element.clone(),
            });
        self.record_sample(sample);
    }

    fn set_visibility(&mut self, hidden: bool) {
        let now = self.now();
        match (hidden, self.visible_since) {
            (true, Some(since)) => {
                self.attention_ms += now - since;
                self.visible_since = None;
            }
            (false, None) => self.visible_since = Some(now),
            _ => return,
        }
        let page = self.host.page();
        let attention = self.attention_time_at(now);
        let event = self
            .named(names::VISIBILITY_CHANGE, now, &page)
            .with("hidden", hidden)
            .with("attentionTimeMs", attention);
        self.queue.push(event);
    }

    fn attention_time_at(&self, now: EpochMs) -> i64 {
        self.attention_ms + self.visible_since.map_or(0, |since| now - since)
    }

    fn session_duration_at(&self, now: EpochMs) -> i64 {
        self.started_at
            .map_or(0, |start| (now - start).min(self.config.session_timeout_ms))
    }

    /// Record a named event on behalf of the host page.
    pub fn track(&mut self, name: &str, properties: Map<String, Value>) {
        if self.state != TrackerState::Active {
            tracing::debug!(event = name, "Tracker not active; dropping named event");
            return;
        }
        let now = self.now();
        let page = self.host.page();
        let event = self.named(name, now, &page).with_properties(properties);
        self.queue.push(event);
    }

    /// Inject a synthetic heatmap point. Intensity is clamped to `[0, 1]`.
    pub fn add_point(&mut self, x: f64, y: f64, intensity: f64, event_type: EventType) {
        if self.state != TrackerState::Active {
            tracing::debug!("Tracker not active; dropping manual point");
            return;
        }
        if !x.is_finite() || !y.is_finite() {
            tracing::warn!(x, y, "Dropped manual point with non-finite coordinates");
            return;
        }
        let now = self.now();
        let page = self.host.page();
        let mut sample = self.sample(event_type, x, y, clamp_intensity(intensity), now, &page);
        if event_type == EventType::Manual {
            sample.detail = SampleDetail::Manual { label: None };
        }
        self.record_sample(sample);
    }

    /// Remove the next batch for delivery.
    ///
    /// Returns `None` when inactive, when the queue is empty, or while an
    /// earlier batch is still in flight. The dequeue happens here,
    /// synchronously, before any network call.
    pub fn take_batch(&mut self) -> Option<PendingBatch> {
        if self.state != TrackerState::Active || self.flush_in_flight || self.queue.is_empty() {
            return None;
        }
        let events = self.queue.take_batch(self.config.batch_size);
        let envelope = self.envelope(events, false);
        self.flush_in_flight = true;
        Some(PendingBatch { envelope })
    }

    /// Acknowledge a batch returned by [`Tracker::take_batch`].
    pub fn complete_batch(&mut self, batch: PendingBatch, result: HeatlensResult<()>) -> FlushOutcome {
        self.flush_in_flight = false;
        let count = batch.envelope.len();
        match result {
            Ok(()) => {
                self.delivery.batches_delivered += 1;
                self.delivery.records_delivered += count as u64;
                tracing::debug!(count, "Flushed analytics batch");
                FlushOutcome::Delivered(count)
            }
            Err(e) => {
                self.delivery.failed_flushes += 1;
                tracing::warn!(count, error = %e, "Analytics flush failed; requeueing batch");
                if self.state == TrackerState::Active {
                    self.queue.requeue_front(batch.envelope.events);
                }
                FlushOutcome::Requeued(count)
            }
        }
    }

    /// Take one batch, send it, and acknowledge the result.
    pub async fn flush(&mut self) -> FlushOutcome {
        if self.flush_in_flight {
            return FlushOutcome::InFlight;
        }
        let Some(batch) = self.take_batch() else {
            return FlushOutcome::Idle;
        };
        let result = self
            .transport
            .post(&self.config.endpoint, &batch.envelope)
            .await;
        self.complete_batch(batch, result)
    }

    /// Final flush on page unload.
    ///
    /// Sends every queued record in one envelope marked final, through the
    /// beacon if accepted and otherwise as a keepalive request. Never
    /// waits for a response. The queue is cleared whatever the outcome.
    pub fn unload(&mut self) {
        if self.state != TrackerState::Active {
            return;
        }
        let now = self.now();
        let page = self.host.page();
        let exit = self
            .named(names::PAGE_EXIT, now, &page)
            .with("sessionDurationMs", self.session_duration_at(now))
            .with("attentionTimeMs", self.attention_time_at(now))
            .with("maxScrollDepth", self.counters.max_scroll_depth);
        self.queue.push(exit);

        if let Some(since) = self.visible_since.take() {
            self.attention_ms += now - since;
        }
        self.state = TrackerState::Closed;

        let records = self.queue.drain_all();
        let count = records.len();
        let envelope = self.envelope(records, true);
        let endpoint = self.config.endpoint.clone();

        if self.transport.beacon(&endpoint, &envelope) {
            tracing::debug!(count, "Final flush queued via beacon");
        } else if let Err(e) = self.transport.keepalive(&endpoint, envelope) {
            tracing::warn!(count, error = %e, "Final flush failed; records dropped");
        } else {
            tracing::debug!(count, "Final flush sent via keepalive");
        }
        self.delivery.final_records += count as u64;
        tracing::info!(session_id = %self.session_id, "Tracker closed");
    }

    fn envelope(&self, events: Vec<QueuedRecord>, is_final: bool) -> IngestEnvelope {
        let page = self.host.page();
        IngestEnvelope {
            events,
            session_id: self.session_id.clone(),
            timestamp: self.clock.now_ms(),
            metadata: EnvelopeMetadata {
                user_agent: page.user_agent,
                url: page.url,
                referrer: page.referrer,
                viewport: page.viewport,
            },
            is_final,
        }
    }

    /// Counters and session timing.
    pub fn behavior(&self) -> BehaviorSnapshot {
        let now = self.clock.now_ms().max(self.last_timestamp);
        BehaviorSnapshot {
            session_id: self.session_id.clone(),
            state: self.state,
            counters: self.counters,
            session_duration_ms: self.session_duration_at(now),
            attention_time_ms: self.attention_time_at(now),
            queued: self.queue.len(),
        }
    }

    /// Every heatmap sample captured so far.
    pub fn heatmap_points(&self) -> &[InteractionSample] {
        &self.points
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn delivery(&self) -> DeliveryStats {
        self.delivery
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{FormInfo, StaticPage};
    use crate::transport::{Channel, MemoryTransport};
    use heatlens_common::clock::ManualClock;
    use heatlens_event_model::geometry::Rect;
    use proptest::prelude::*;

    struct Harness {
        tracker: Tracker,
        clock: ManualClock,
        page: StaticPage,
        transport: Arc<MemoryTransport>,
    }

    fn harness(config: TrackerConfig) -> Harness {
        harness_with(config, MemoryTransport::new())
    }

    fn harness_with(config: TrackerConfig, transport: MemoryTransport) -> Harness {
        let clock = ManualClock::new(1_000_000);
        let page = StaticPage::new(PageState {
            document_height: 3_000.0,
            ..PageState::default()
        });
        let transport = Arc::new(transport);
        let tracker = Tracker::new(
            config,
            Box::new(page.clone()),
            transport.clone(),
            Arc::new(clock.clone()),
        );
        Harness {
            tracker,
            clock,
            page,
            transport,
        }
    }

    fn quiet_config() -> TrackerConfig {
        TrackerConfig {
            track_page_views: false,
            ..TrackerConfig::default()
        }
    }

    fn click_at(x: f64, y: f64) -> HostEvent {
        HostEvent::Click {
            client_x: x,
            client_y: y,
            target: ElementInfo::new("button")
                .with_text("Save")
                .with_rect(Rect::new(x - 10.0, y - 10.0, 20.0, 20.0)),
        }
    }

    fn event_names(records: &[QueuedRecord]) -> Vec<String> {
        records
            .iter()
            .filter_map(|r| r.as_event().map(|e| e.event.clone()))
            .collect()
    }

    #[test]
    fn test_init_is_idempotent_and_emits_single_page_view() {
        let mut h = harness(TrackerConfig::default());
        assert_eq!(h.tracker.state(), TrackerState::Uninitialized);
        assert_eq!(h.tracker.init(), TrackerState::Active);
        assert_eq!(h.tracker.init(), TrackerState::Active);

        let records: Vec<_> = h.tracker.queue().iter().cloned().collect();
        assert_eq!(event_names(&records), vec![names::PAGE_VIEW]);
    }

    #[test]
    fn test_init_failure_leaves_tracker_uninitialized() {
        let transport = Arc::new(MemoryTransport::new());
        let mut tracker = Tracker::new(
            TrackerConfig::default(),
            Box::new(StaticPage::unavailable()),
            transport,
            Arc::new(ManualClock::new(0)),
        );
        assert_eq!(tracker.init(), TrackerState::Uninitialized);
        tracker.handle(click_at(10.0, 10.0));
        assert!(tracker.heatmap_points().is_empty());
        assert!(tracker.queue().is_empty());
    }

    #[test]
    fn test_pointer_burst_yields_one_sample() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        for i in 0..50 {
            h.clock.set(1_000_000 + i);
            h.tracker.handle(HostEvent::PointerMove {
                client_x: i as f64,
                client_y: 5.0,
            });
        }
        assert_eq!(h.tracker.heatmap_points().len(), 1);
        assert_eq!(h.tracker.heatmap_points()[0].intensity, 0.3);
    }

    #[test]
    fn test_scroll_throttle_and_direction() {
        let mut h = harness(quiet_config());
        h.tracker.init();

        h.page.set_scroll(0.0, 1_140.0);
        h.tracker.handle(HostEvent::Scroll);
        h.clock.advance(100);
        h.page.set_scroll(0.0, 1_500.0);
        h.tracker.handle(HostEvent::Scroll);
        h.clock.advance(200);
        h.page.set_scroll(0.0, 600.0);
        h.tracker.handle(HostEvent::Scroll);

        let points = h.tracker.heatmap_points();
        assert_eq!(points.len(), 2);
        assert_eq!(
            points[0].detail,
            SampleDetail::Scroll {
                percent: 50.0,
                direction: ScrollDirection::Down
            }
        );
        match &points[1].detail {
            SampleDetail::Scroll { direction, .. } => assert_eq!(*direction, ScrollDirection::Up),
            other => panic!("unexpected detail {other:?}"),
        }
        assert_eq!(points[1].page_y, points[1].y + 600.0);
        assert_eq!(h.tracker.behavior().counters.max_scroll_depth, 50.0);
    }

    #[test]
    fn test_click_sample_carries_descriptor_and_context() {
        let mut h = harness(quiet_config());
        h.page.set_path("/patients/12");
        h.tracker.init();
        h.tracker.handle(HostEvent::Click {
            client_x: 40.0,
            client_y: 60.0,
            target: ElementInfo::new("a")
                .with_id("open-chart")
                .with_text("Open chart")
                .with_ancestor(crate::host::AncestorInfo {
                    tag: "section".into(),
                    section: Some("vitals".into()),
                    ..Default::default()
                }),
        });

        let sample = &h.tracker.heatmap_points()[0];
        assert_eq!(sample.event_type, EventType::Click);
        assert_eq!(sample.intensity, 0.9);
        match &sample.detail {
            SampleDetail::Click {
                element,
                module,
                section,
            } => {
                assert_eq!(element.selector, "section > a#open-chart");
                assert_eq!(module, "patients");
                assert_eq!(section.as_deref(), Some("vitals"));
            }
            other => panic!("unexpected detail {other:?}"),
        }
        let counters = h.tracker.behavior().counters;
        assert_eq!(counters.total_clicks, 1);
        assert_eq!(counters.link_clicks, 1);
        assert_eq!(counters.button_clicks, 0);
    }

    #[test]
    fn test_malformed_click_target_is_dropped_without_halting() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        h.tracker.handle(HostEvent::Click {
            client_x: 1.0,
            client_y: 1.0,
            target: ElementInfo::new(""),
        });
        h.tracker.handle(click_at(5.0, 5.0));
        assert_eq!(h.tracker.heatmap_points().len(), 1);
        assert_eq!(h.tracker.behavior().counters.total_clicks, 1);
    }

    #[test]
    fn test_rage_click_emits_named_event() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        for i in 0..4 {
            h.clock.advance(200);
            h.tracker.handle(click_at(300.0 + i as f64 * 5.0, 200.0));
        }
        let records: Vec<_> = h.tracker.queue().iter().cloned().collect();
        assert_eq!(event_names(&records), vec![names::RAGE_CLICK]);
        let rage = records.iter().find_map(QueuedRecord::as_event).unwrap();
        assert_eq!(rage.properties["clickCount"], 4);
        assert_eq!(h.tracker.behavior().counters.rage_clicks, 1);
    }

    #[test]
    fn test_each_click_past_the_threshold_reports_rage() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        for i in 0..5 {
            h.clock.advance(150);
            h.tracker.handle(click_at(300.0 + i as f64 * 5.0, 200.0));
        }
        let counts: Vec<_> = h
            .tracker
            .queue()
            .iter()
            .filter_map(QueuedRecord::as_event)
            .map(|event| event.properties["clickCount"].clone())
            .collect();
        assert_eq!(counts, vec![serde_json::json!(4), serde_json::json!(5)]);
        assert_eq!(h.tracker.behavior().counters.rage_clicks, 2);
    }

    #[test]
    fn test_form_input_records_length_not_value() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        h.tracker.handle(HostEvent::FormInput {
            field: FieldInfo {
                tag: "INPUT".into(),
                name: Some("notes".into()),
                field_type: String::new(),
                value_length: 12,
                rect: Rect::new(0.0, 100.0, 200.0, 40.0),
                form: Some(FormInfo {
                    id: Some("shift-report".into()),
                    classes: vec![],
                }),
                ..Default::default()
            },
        });
        let sample = &h.tracker.heatmap_points()[0];
        assert_eq!((sample.x, sample.y), (100.0, 120.0));
        assert_eq!(sample.intensity, 0.7);
        match &sample.detail {
            SampleDetail::FormInput {
                field,
                form_type,
                value_length,
            } => {
                assert_eq!(field.field_type, "input");
                assert_eq!(*form_type, heatlens_event_model::sample::FormType::Report);
                assert_eq!(*value_length, 12);
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_disabled_categories_are_not_captured() {
        let mut h = harness(TrackerConfig {
            track_clicks: false,
            track_mouse_movement: false,
            track_scrolling: false,
            track_form_inputs: false,
            track_page_views: false,
            ..TrackerConfig::default()
        });
        h.tracker.init();
        h.tracker.handle(click_at(1.0, 1.0));
        h.tracker.handle(HostEvent::PointerMove {
            client_x: 1.0,
            client_y: 1.0,
        });
        h.tracker.handle(HostEvent::Scroll);
        h.tracker.handle(HostEvent::FormInput {
            field: FieldInfo::default(),
        });
        assert!(h.tracker.heatmap_points().is_empty());

        h.tracker.handle(HostEvent::TouchStart {
            touches: vec![Point2D::new(3.0, 4.0), Point2D::new(9.0, 9.0)],
        });
        let sample = &h.tracker.heatmap_points()[0];
        assert_eq!(sample.detail, SampleDetail::Touch { touch_count: 2 });
        assert_eq!(sample.intensity, 0.8);
    }

    #[test]
    fn test_touch_and_keys_captured_with_heatmap_disabled() {
        let mut h = harness(TrackerConfig {
            enable_heatmap: false,
            track_page_views: false,
            ..TrackerConfig::default()
        });
        h.tracker.init();
        h.tracker.handle(click_at(10.0, 10.0));
        h.tracker.handle(HostEvent::PointerMove {
            client_x: 20.0,
            client_y: 20.0,
        });
        assert!(h.tracker.queue().is_empty());

        h.tracker.handle(HostEvent::TouchStart {
            touches: vec![Point2D::new(5.0, 6.0)],
        });
        h.tracker.handle(HostEvent::KeyDown(KeyInfo {
            key: "a".into(),
            code: "KeyA".into(),
            ..Default::default()
        }));

        assert_eq!(h.tracker.queue().len(), 2);
        let types: Vec<_> = h.tracker.heatmap_points().iter().map(|p| p.event_type).collect();
        assert_eq!(types, vec![EventType::Touch, EventType::Keyboard]);
        let counters = h.tracker.behavior().counters;
        assert_eq!((counters.touches, counters.key_presses), (1, 1));
        assert_eq!(counters.total_clicks, 0);
    }

    #[test]
    fn test_keyboard_sample_uses_last_pointer_and_focus() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        h.tracker.handle(click_at(70.0, 80.0));
        h.page
            .set_active_element(Some(heatlens_event_model::sample::FocusSnapshot {
                tag: "textarea".into(),
                id: Some("note".into()),
                field_type: None,
            }));
        h.tracker.handle(HostEvent::KeyDown(KeyInfo {
            key: "Enter".into(),
            code: "Enter".into(),
            ..Default::default()
        }));
        let sample = h.tracker.heatmap_points().last().unwrap();
        assert_eq!(sample.event_type, EventType::Keyboard);
        assert_eq!((sample.x, sample.y), (70.0, 80.0));
        match &sample.detail {
            SampleDetail::Keyboard { key, focused, .. } => {
                assert_eq!(key, "Enter");
                assert_eq!(focused.as_ref().map(|f| f.tag.as_str()), Some("textarea"));
            }
            other => panic!("unexpected detail {other:?}"),
        }
    }

    #[test]
    fn test_attention_time_excludes_hidden_periods() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        h.clock.advance(1_000);
        h.tracker.handle(HostEvent::VisibilityChange { hidden: true });
        h.clock.advance(5_000);
        h.tracker.handle(HostEvent::VisibilityChange { hidden: false });
        h.clock.advance(500);

        let behavior = h.tracker.behavior();
        assert_eq!(behavior.attention_time_ms, 1_500);
        assert_eq!(behavior.session_duration_ms, 6_500);
    }

    #[test]
    fn test_session_duration_capped_by_timeout() {
        let mut h = harness(TrackerConfig {
            session_timeout_ms: 2_000,
            ..quiet_config()
        });
        h.tracker.init();
        h.clock.advance(10_000);
        assert_eq!(h.tracker.behavior().session_duration_ms, 2_000);
    }

    #[test]
    fn test_manual_point_and_named_event() {
        let mut h = harness(quiet_config());
        h.tracker.add_point(1.0, 1.0, 0.5, EventType::Manual);
        assert!(h.tracker.heatmap_points().is_empty());

        h.tracker.init();
        h.tracker.add_point(10.0, 20.0, 4.0, EventType::Manual);
        h.tracker.add_point(f64::NAN, 20.0, 0.5, EventType::Manual);
        let mut props = Map::new();
        props.insert("report".into(), Value::from("shift"));
        h.tracker.track("report_saved", props);

        let points = h.tracker.heatmap_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].intensity, 1.0);
        assert_eq!(points[0].detail, SampleDetail::Manual { label: None });
        let records: Vec<_> = h.tracker.queue().iter().cloned().collect();
        assert_eq!(event_names(&records), vec!["report_saved"]);
    }

    #[test]
    fn test_session_id_shared_by_all_records() {
        let mut h = harness(TrackerConfig::default());
        let id = h.tracker.session_id().to_string();
        assert!(id.starts_with("session_1000000_"));
        h.tracker.init();
        h.tracker.handle(click_at(1.0, 1.0));
        assert!(h.tracker.queue().iter().all(|r| r.session_id() == id));
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_in_order() {
        let mut h = harness(TrackerConfig {
            batch_size: 2,
            ..quiet_config()
        });
        h.tracker.init();
        for name in ["A", "B", "C", "D", "E"] {
            h.tracker.track(name, Map::new());
        }

        h.transport.fail_next(1);
        assert_eq!(h.tracker.flush().await, FlushOutcome::Requeued(2));
        assert_eq!(h.tracker.queue().len(), 5);
        assert_eq!(h.tracker.flush().await, FlushOutcome::Delivered(2));
        assert_eq!(h.tracker.flush().await, FlushOutcome::Delivered(2));
        assert_eq!(h.tracker.flush().await, FlushOutcome::Delivered(1));
        assert_eq!(h.tracker.flush().await, FlushOutcome::Idle);

        let delivered: Vec<Vec<String>> = h
            .transport
            .posts()
            .iter()
            .map(|e| event_names(&e.events))
            .collect();
        assert_eq!(delivered, vec![vec!["A", "B"], vec!["C", "D"], vec!["E"]]);
        assert_eq!(h.transport.post_attempts(), 4);
        assert_eq!(h.tracker.delivery().failed_flushes, 1);
    }

    #[test]
    fn test_second_take_while_in_flight_is_refused() {
        let mut h = harness(TrackerConfig {
            batch_size: 1,
            ..quiet_config()
        });
        h.tracker.init();
        h.tracker.track("A", Map::new());
        h.tracker.track("B", Map::new());

        let first = h.tracker.take_batch().unwrap();
        assert!(h.tracker.take_batch().is_none());
        // New events keep queueing while the batch is out.
        h.tracker.track("C", Map::new());
        assert_eq!(
            h.tracker.complete_batch(first, Err(heatlens_common::HeatlensError::transport("down"))),
            FlushOutcome::Requeued(1)
        );
        let records: Vec<_> = h.tracker.queue().iter().cloned().collect();
        assert_eq!(event_names(&records), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_unload_sends_everything_final_via_beacon() {
        let mut h = harness(TrackerConfig {
            batch_size: 1,
            ..TrackerConfig::default()
        });
        h.tracker.init();
        h.tracker.handle(click_at(1.0, 1.0));
        h.tracker.handle(click_at(100.0, 100.0));
        h.tracker.handle(HostEvent::Unload);

        assert_eq!(h.tracker.state(), TrackerState::Closed);
        assert!(h.tracker.queue().is_empty());
        let beacons = h.transport.on_channel(Channel::Beacon);
        assert_eq!(beacons.len(), 1);
        assert!(beacons[0].is_final);
        // page_view + 2 clicks + page_exit
        assert_eq!(beacons[0].len(), 4);
        assert_eq!(
            event_names(&beacons[0].events),
            vec![names::PAGE_VIEW, names::PAGE_EXIT]
        );

        h.tracker.handle(click_at(5.0, 5.0));
        assert_eq!(h.tracker.heatmap_points().len(), 2);
    }

    #[test]
    fn test_unload_falls_back_to_keepalive() {
        let mut h = harness_with(quiet_config(), MemoryTransport::without_beacon());
        h.tracker.init();
        h.tracker.handle(click_at(1.0, 1.0));
        h.tracker.unload();
        let keepalives = h.transport.on_channel(Channel::Keepalive);
        assert_eq!(keepalives.len(), 1);
        assert!(keepalives[0].is_final);
        assert!(h.transport.on_channel(Channel::Beacon).is_empty());
    }

    #[test]
    fn test_timestamps_never_decrease_when_clock_steps_back() {
        let mut h = harness(quiet_config());
        h.tracker.init();
        h.tracker.handle(click_at(1.0, 1.0));
        h.clock.advance(-500);
        h.tracker.handle(click_at(200.0, 200.0));
        let stamps: Vec<_> = h.tracker.queue().iter().map(QueuedRecord::timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[derive(Debug, Clone)]
    enum Action {
        Click(f64, f64, u8),
        Move(f64, f64),
        Scroll(f64),
        Touch(f64, f64),
        Form(usize),
        Key,
        Manual(f64),
    }

    fn action() -> impl Strategy<Value = Action> {
        let tags = prop_oneof![Just(0u8), Just(1u8), Just(2u8)];
        prop_oneof![
            (0.0f64..2000.0, 0.0f64..2000.0, tags).prop_map(|(x, y, t)| Action::Click(x, y, t)),
            (0.0f64..2000.0, 0.0f64..2000.0).prop_map(|(x, y)| Action::Move(x, y)),
            (0.0f64..5000.0).prop_map(Action::Scroll),
            (0.0f64..2000.0, 0.0f64..2000.0).prop_map(|(x, y)| Action::Touch(x, y)),
            (0usize..500).prop_map(Action::Form),
            Just(Action::Key),
            (-10.0f64..10.0).prop_map(Action::Manual),
        ]
    }

    proptest! {
        #[test]
        fn prop_all_samples_have_unit_intensity_and_ordered_timestamps(
            actions in proptest::collection::vec((action(), 0i64..400), 1..80)
        ) {
            let mut h = harness(TrackerConfig::default());
            h.tracker.init();
            for (action, gap) in actions {
                h.clock.advance(gap);
                match action {
                    Action::Click(x, y, tag) => {
                        let tag = ["button", "div", "img"][tag as usize];
                        h.tracker.handle(HostEvent::Click {
                            client_x: x,
                            client_y: y,
                            target: ElementInfo::new(tag),
                        });
                    }
                    Action::Move(x, y) => h.tracker.handle(HostEvent::PointerMove { client_x: x, client_y: y }),
                    Action::Scroll(y) => {
                        h.page.set_scroll(0.0, y);
                        h.tracker.handle(HostEvent::Scroll);
                    }
                    Action::Touch(x, y) => h.tracker.handle(HostEvent::TouchStart { touches: vec![Point2D::new(x, y)] }),
                    Action::Form(len) => h.tracker.handle(HostEvent::FormInput {
                        field: FieldInfo { tag: "input".into(), value_length: len, ..Default::default() },
                    }),
                    Action::Key => h.tracker.handle(HostEvent::KeyDown(KeyInfo::default())),
                    Action::Manual(i) => h.tracker.add_point(5.0, 5.0, i, EventType::Manual),
                }
            }
            for sample in h.tracker.heatmap_points() {
                prop_assert!((0.0..=1.0).contains(&sample.intensity));
            }
            let stamps: Vec<_> = h.tracker.queue().iter().map(QueuedRecord::timestamp).collect();
            prop_assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
