//! Tokio service that owns a [`Tracker`] and drives its flush timer.
//!
//! Host listeners and the public API talk to the tracker through a
//! [`TrackerHandle`]. All state mutation happens on the service task, so
//! the take-a-batch step of a flush can never interleave with capture.

use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use heatlens_common::error::{HeatlensError, HeatlensResult};
use heatlens_event_model::sample::{EventType, InteractionSample};

use crate::host::HostEvent;
use crate::tracker::{BehaviorSnapshot, DeliveryStats, PendingBatch, Tracker, TrackerState};

/// Messages accepted by the service task.
#[derive(Debug)]
pub enum TrackerCommand {
    Host(HostEvent),
    Track {
        name: String,
        properties: Map<String, Value>,
    },
    AddPoint {
        x: f64,
        y: f64,
        intensity: f64,
        event_type: EventType,
    },
    Behavior(oneshot::Sender<BehaviorSnapshot>),
    Points(oneshot::Sender<Vec<InteractionSample>>),
    /// Run a flush now instead of waiting for the next tick.
    Flush,
    Unload,
}

/// Summary returned when the service task ends.
#[derive(Debug, Clone)]
pub struct TrackerReport {
    pub session_id: String,
    pub final_state: TrackerState,
    pub behavior: BehaviorSnapshot,
    pub delivery: DeliveryStats,
    pub points: Vec<InteractionSample>,
}

/// Cloneable handle to a running tracker service.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::UnboundedSender<TrackerCommand>,
}

impl TrackerHandle {
    fn command(&self, command: TrackerCommand) -> HeatlensResult<()> {
        self.tx
            .send(command)
            .map_err(|_| HeatlensError::tracker("tracker service has stopped"))
    }

    /// Deliver a host event to the tracker.
    pub fn send(&self, event: HostEvent) -> HeatlensResult<()> {
        self.command(TrackerCommand::Host(event))
    }

    pub fn track(&self, name: impl Into<String>, properties: Map<String, Value>) -> HeatlensResult<()> {
        self.command(TrackerCommand::Track {
            name: name.into(),
            properties,
        })
    }

    pub fn add_point(&self, x: f64, y: f64, intensity: f64, event_type: EventType) -> HeatlensResult<()> {
        self.command(TrackerCommand::AddPoint {
            x,
            y,
            intensity,
            event_type,
        })
    }

    pub fn flush(&self) -> HeatlensResult<()> {
        self.command(TrackerCommand::Flush)
    }

    /// Request the final flush. The service task ends afterwards.
    pub fn unload(&self) -> HeatlensResult<()> {
        self.command(TrackerCommand::Unload)
    }

    pub async fn behavior(&self) -> HeatlensResult<BehaviorSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(TrackerCommand::Behavior(tx))?;
        rx.await
            .map_err(|_| HeatlensError::tracker("tracker service dropped the request"))
    }

    pub async fn points(&self) -> HeatlensResult<Vec<InteractionSample>> {
        let (tx, rx) = oneshot::channel();
        self.command(TrackerCommand::Points(tx))?;
        rx.await
            .map_err(|_| HeatlensError::tracker("tracker service dropped the request"))
    }
}

type FlushResult = (PendingBatch, HeatlensResult<()>);

/// Initialize the tracker and run it on a new task.
///
/// The task ends after an unload, or when every handle has been dropped
/// (which is treated as an unload).
pub fn spawn(tracker: Tracker) -> (TrackerHandle, JoinHandle<TrackerReport>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(tracker, rx));
    (TrackerHandle { tx }, task)
}

fn start_flush(tracker: &mut Tracker, done: &mpsc::UnboundedSender<FlushResult>) {
    let Some(batch) = tracker.take_batch() else {
        return;
    };
    let transport = tracker.transport();
    let endpoint = tracker.config().endpoint.clone();
    let done = done.clone();
    tokio::spawn(async move {
        let result = transport.post(&endpoint, &batch.envelope).await;
        let _ = done.send((batch, result));
    });
}

async fn run(mut tracker: Tracker, mut rx: mpsc::UnboundedReceiver<TrackerCommand>) -> TrackerReport {
    tracker.init();

    let period = Duration::from_millis(tracker.config().flush_interval_ms.max(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<FlushResult>();

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else {
                    tracing::debug!("All tracker handles dropped; unloading");
                    break;
                };
                match command {
                    TrackerCommand::Host(event) => tracker.handle(event),
                    TrackerCommand::Track { name, properties } => tracker.track(&name, properties),
                    TrackerCommand::AddPoint { x, y, intensity, event_type } => {
                        tracker.add_point(x, y, intensity, event_type)
                    }
                    TrackerCommand::Behavior(reply) => {
                        let _ = reply.send(tracker.behavior());
                    }
                    TrackerCommand::Points(reply) => {
                        let _ = reply.send(tracker.heatmap_points().to_vec());
                    }
                    TrackerCommand::Flush => start_flush(&mut tracker, &done_tx),
                    TrackerCommand::Unload => break,
                }
                if tracker.state() == TrackerState::Closed {
                    break;
                }
            }
            _ = ticker.tick() => start_flush(&mut tracker, &done_tx),
            Some((batch, result)) = done_rx.recv() => {
                tracker.complete_batch(batch, result);
            }
        }
    }

    tracker.unload();

    TrackerReport {
        session_id: tracker.session_id().to_string(),
        final_state: tracker.state(),
        behavior: tracker.behavior(),
        delivery: tracker.delivery(),
        points: tracker.heatmap_points().to_vec(),
    }
}
