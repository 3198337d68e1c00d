//! Heatlens Event Model
//!
//! Defines the data contracts shared by the capture tracker and the
//! heatmap engine:
//! - **Samples:** Typed, timestamped interaction samples with context
//! - **Records:** Named events, queued records, and ingestion envelopes
//! - **Geometry:** Viewport sizes, points, and canvas coordinate mapping
//! - **Ingest:** Validation and JSONL codecs at the consuming boundary
//!
//! Sample coordinates are viewport pixels at capture time. Each sample
//! carries its capture viewport so consumers can rescale it.

pub mod geometry;
pub mod ingest;
pub mod record;
pub mod sample;

pub use geometry::*;
pub use ingest::*;
pub use record::*;
pub use sample::*;
