//! Heatlens Capture Tracker
//!
//! Observes user interactions on a host page and turns them into
//! weighted heatmap samples and named behavior events:
//!
//! - **Capture:** Clicks, pointer movement, scrolling, touches, form input
//!   and key presses, each weighted by a fixed intensity policy
//! - **Throttling:** Pointer samples at most every 100ms, scroll every 250ms
//! - **Rage clicks:** Four or more clicks in two seconds at one spot
//! - **Delivery:** A FIFO queue flushed in bounded batches; failed batches
//!   return to the front, and page unload sends everything as one final batch
//!
//! The host page and the network are seams ([`PageHost`] and
//! [`transport::Transport`]) so the tracker runs the same against a real
//! page, a simulation, or a test harness.

pub mod host;
pub mod policy;
pub mod queue;
pub mod rage;
pub mod service;
pub mod tracker;
pub mod transport;

use heatlens_common::error::HeatlensResult;

pub use host::{HostEvent, PageState, StaticPage};
pub use service::{spawn, TrackerHandle, TrackerReport};
pub use tracker::{BehaviorSnapshot, FlushOutcome, Tracker, TrackerState};
pub use transport::{MemoryTransport, SpoolTransport, Transport};

/// Trait for the page the tracker observes.
pub trait PageHost: Send {
    /// Attach listeners. Fails when the document is not available.
    fn attach(&mut self) -> HeatlensResult<()>;

    /// Snapshot of the page at this moment.
    fn page(&self) -> PageState;

    /// Host name for logging.
    fn name(&self) -> &str;
}
