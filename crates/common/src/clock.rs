//! Clock and timing utilities for capture and delivery.
//!
//! Every captured sample is stamped with wall-clock epoch milliseconds.
//! This module provides:
//! - A [`Clock`] seam so capture policy can be driven by scripted time
//! - A [`Throttle`] gate for high-frequency listeners (pointer, scroll)

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Epoch timestamp in milliseconds.
pub type EpochMs = i64;

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current epoch time in milliseconds.
    fn now_ms(&self) -> EpochMs;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> EpochMs {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for tests and scripted sessions.
///
/// Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `start_ms`.
    pub fn new(start_ms: EpochMs) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now_ms: EpochMs) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `delta_ms`.
    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> EpochMs {
        self.now.load(Ordering::SeqCst)
    }
}

/// Stateful gate that admits at most one event per interval.
///
/// The interval is measured from the last *accepted* event, not the last
/// offered one. Rejected events are dropped, never deferred.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval_ms: i64,
    last_accepted_ms: Option<EpochMs>,
}

impl Throttle {
    /// Create a gate admitting one event per `interval_ms`.
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms: interval_ms.max(0),
            last_accepted_ms: None,
        }
    }

    /// Returns true and records `now_ms` if the event is admitted.
    /// The first call always admits.
    pub fn admit(&mut self, now_ms: EpochMs) -> bool {
        match self.last_accepted_ms {
            Some(last) if now_ms - last < self.interval_ms => false,
            _ => {
                self.last_accepted_ms = Some(now_ms);
                true
            }
        }
    }
}
