//! Outgoing record queue with front requeue for failed batches.

use std::collections::VecDeque;

use heatlens_event_model::record::QueuedRecord;

/// Unbounded FIFO of records awaiting delivery.
///
/// Only the flush batch is bounded. A batch that failed to send goes back
/// to the front in its original order, so retries never reorder records.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    records: VecDeque<QueuedRecord>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: impl Into<QueuedRecord>) {
        self.records.push_back(record.into());
    }

    /// Remove up to `max` records from the front.
    pub fn take_batch(&mut self, max: usize) -> Vec<QueuedRecord> {
        let n = max.min(self.records.len());
        self.records.drain(..n).collect()
    }

    /// Put a failed batch back ahead of everything queued since.
    pub fn requeue_front(&mut self, batch: Vec<QueuedRecord>) {
        for record in batch.into_iter().rev() {
            self.records.push_front(record);
        }
    }

    /// Remove every record.
    pub fn drain_all(&mut self) -> Vec<QueuedRecord> {
        self.records.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedRecord> {
        self.records.iter()
    }
}
