//! Delivery transports for ingestion envelopes.
//!
//! The tracker never talks to the network directly. A [`Transport`]
//! receives fully built envelopes for the periodic flush (`post`) and
//! for the unload flush (`beacon`, then `keepalive` as fallback).

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use heatlens_common::error::{HeatlensError, HeatlensResult};
use heatlens_event_model::record::IngestEnvelope;

/// Delivery seam between the tracker and the ingestion backend.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one batch. An error means the batch must be retried.
    async fn post(&self, endpoint: &str, envelope: &IngestEnvelope) -> HeatlensResult<()>;

    /// Queue the envelope on a primitive that survives page teardown.
    /// Returns false if the envelope was not accepted.
    fn beacon(&self, _endpoint: &str, _envelope: &IngestEnvelope) -> bool {
        false
    }

    /// Fire-and-forget request used when no beacon is available.
    /// Must not block on the response.
    fn keepalive(&self, endpoint: &str, envelope: IngestEnvelope) -> HeatlensResult<()>;

    /// Transport name for logging.
    fn name(&self) -> &str;
}

/// Which primitive carried an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Post,
    Beacon,
    Keepalive,
}

/// One envelope accepted by a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub channel: Channel,
    pub endpoint: String,
    pub envelope: IngestEnvelope,
}

#[derive(Debug, Default)]
struct MemoryState {
    deliveries: Vec<Delivery>,
    post_attempts: usize,
    failures_remaining: usize,
}

/// In-memory transport with scripted post failures.
#[derive(Debug)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    beacon_supported: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            beacon_supported: true,
        }
    }

    /// A transport whose beacon always refuses, forcing the keepalive path.
    pub fn without_beacon() -> Self {
        Self {
            beacon_supported: false,
            ..Self::new()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make the next `n` posts fail.
    pub fn fail_next(&self, n: usize) {
        self.lock().failures_remaining = n;
    }

    /// Every accepted envelope, in arrival order.
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.lock().deliveries.clone()
    }

    /// Envelopes accepted through `post`.
    pub fn posts(&self) -> Vec<IngestEnvelope> {
        self.on_channel(Channel::Post)
    }

    pub fn on_channel(&self, channel: Channel) -> Vec<IngestEnvelope> {
        self.lock()
            .deliveries
            .iter()
            .filter(|d| d.channel == channel)
            .map(|d| d.envelope.clone())
            .collect()
    }

    /// Post calls, failed ones included.
    pub fn post_attempts(&self) -> usize {
        self.lock().post_attempts
    }

    fn record(&self, channel: Channel, endpoint: &str, envelope: IngestEnvelope) {
        self.lock().deliveries.push(Delivery {
            channel,
            endpoint: endpoint.to_string(),
            envelope,
        });
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn post(&self, endpoint: &str, envelope: &IngestEnvelope) -> HeatlensResult<()> {
        {
            let mut state = self.lock();
            state.post_attempts += 1;
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(HeatlensError::transport("simulated network failure"));
            }
        }
        self.record(Channel::Post, endpoint, envelope.clone());
        Ok(())
    }

    fn beacon(&self, endpoint: &str, envelope: &IngestEnvelope) -> bool {
        if !self.beacon_supported {
            return false;
        }
        self.record(Channel::Beacon, endpoint, envelope.clone());
        true
    }

    fn keepalive(&self, endpoint: &str, envelope: IngestEnvelope) -> HeatlensResult<()> {
        self.record(Channel::Keepalive, endpoint, envelope);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct SpoolWriter {
    writer: BufWriter<File>,
    envelopes_written: u64,
}

/// Appends envelopes to a JSONL spool file, one envelope per line.
///
/// The first line is a `#` comment naming the spool format. The spool is
/// what the backend ingests offline and what the CLI renders from.
pub struct SpoolTransport {
    path: PathBuf,
    inner: Mutex<SpoolWriter>,
}

impl SpoolTransport {
    /// Create the spool, truncating any previous file.
    pub fn create(path: impl AsRef<Path>) -> HeatlensResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# heatlens-spool/1")
            .map_err(|e| HeatlensError::transport(format!("Failed to write spool header: {e}")))?;

        Ok(Self {
            path,
            inner: Mutex::new(SpoolWriter {
                writer,
                envelopes_written: 0,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SpoolWriter> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn append(&self, envelope: &IngestEnvelope) -> HeatlensResult<()> {
        let json = serde_json::to_string(envelope)?;
        let mut inner = self.lock();
        writeln!(inner.writer, "{json}")
            .and_then(|_| inner.writer.flush())
            .map_err(|e| HeatlensError::transport(format!("Failed to append envelope: {e}")))?;
        inner.envelopes_written += 1;
        Ok(())
    }

    pub fn envelopes_written(&self) -> u64 {
        self.lock().envelopes_written
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Transport for SpoolTransport {
    async fn post(&self, _endpoint: &str, envelope: &IngestEnvelope) -> HeatlensResult<()> {
        self.append(envelope)
    }

    fn beacon(&self, _endpoint: &str, envelope: &IngestEnvelope) -> bool {
        match self.append(envelope) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Spool beacon failed");
                false
            }
        }
    }

    fn keepalive(&self, _endpoint: &str, envelope: IngestEnvelope) -> HeatlensResult<()> {
        self.append(&envelope)
    }

    fn name(&self) -> &str {
        "spool"
    }
}

impl Drop for SpoolTransport {
    fn drop(&mut self) {
        let _ = self.lock().writer.flush();
    }
}
