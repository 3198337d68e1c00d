//! Rage-click detection over a sliding spatial-temporal window.

use std::collections::VecDeque;

use heatlens_common::clock::EpochMs;
use heatlens_event_model::geometry::Point2D;

pub const RAGE_WINDOW_MS: i64 = 2_000;
pub const RAGE_TOLERANCE_PX: f64 = 50.0;
pub const RAGE_THRESHOLD: usize = 4;

/// A detected burst of repeated clicks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RageClick {
    pub count: usize,
    pub x: f64,
    pub y: f64,
}

/// Keeps the clicks of the last two seconds and reports bursts.
///
/// A burst is at least four clicks, all inside the window, each within
/// 50px on both axes of the newest click. Both conditions must hold at
/// once. Every click that completes the condition is reported, so a
/// sustained burst reports once per click from the fourth on.
#[derive(Debug, Clone)]
pub struct RageClickDetector {
    window_ms: i64,
    tolerance_px: f64,
    threshold: usize,
    clicks: VecDeque<(EpochMs, Point2D)>,
}

impl Default for RageClickDetector {
    fn default() -> Self {
        Self::new(RAGE_WINDOW_MS, RAGE_TOLERANCE_PX, RAGE_THRESHOLD)
    }
}

impl RageClickDetector {
    pub fn new(window_ms: i64, tolerance_px: f64, threshold: usize) -> Self {
        Self {
            window_ms,
            tolerance_px,
            threshold: threshold.max(1),
            clicks: VecDeque::new(),
        }
    }

    /// Record a click and report a burst if this click completes one.
    pub fn record(&mut self, timestamp: EpochMs, position: Point2D) -> Option<RageClick> {
        while let Some((t, _)) = self.clicks.front() {
            if timestamp - *t > self.window_ms {
                self.clicks.pop_front();
            } else {
                break;
            }
        }
        self.clicks.push_back((timestamp, position));

        let nearby = self
            .clicks
            .iter()
            .filter(|(_, p)| {
                (p.x - position.x).abs() < self.tolerance_px
                    && (p.y - position.y).abs() < self.tolerance_px
            })
            .count();

        if nearby >= self.threshold {
            return Some(RageClick {
                count: nearby,
                x: position.x,
                y: position.y,
            });
        }
        None
    }

    /// Clicks currently held in the window.
    pub fn len(&self) -> usize {
        self.clicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clicks.is_empty()
    }
}
