//! Incremental checkpointed polling of vendor APIs.
//!
//! A collector repeatedly walks a paginated vendor listing starting at its watermark, pushes every
//! page to a [sink::Sink] and persists the advanced watermark, so that a restarted process resumes
//! where the previous one stopped:
//! - read the watermark from the [watermark::WatermarkStore] and clamp it with the
//!   [watermark::WatermarkBounds]
//! - drive the [paginate::Paginator] over a [paginate::VendorClient]
//! - push each batch and [watermark::advance] the watermark past its latest record
//! - persist the watermark and sleep until the next cycle of the [poll::PollLoop]

pub use crate::error::{Error, Result};

mod error;

/// Collector configuration loaded from the environment.
pub mod config;

/// Durable watermark and checkpoint state, and the pure rules that move it forward.
pub mod watermark;

pub mod paginate;

/// Destinations of collected records.
pub mod sink;

/// Fixed cadence driver of a [poll::PollTask].
pub mod poll;

/// Record counts and cycle durations, per collector.
pub mod metrics;

/// Poll tasks tying pagination, sink and watermark store together.
pub mod collector;

/// Adapters from the vendor clients to [paginate::VendorClient].
pub mod vendor;

/// A raw vendor record, forwarded untouched.
pub type Record = serde_json::Value;
