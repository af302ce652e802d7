//! Global backpressure and the per-request admission pipeline.
//!
//! Every inbound request is recorded in a bounded [`AdmissionQueue`]; once
//! the queue is full, requests are rejected regardless of per-client quota.
//! An [`EvictionSweeper`] running on its own task drops entries older than
//! the staleness window.

mod pipeline;
mod queue;
mod sweeper;

pub use pipeline::{AdmissionPipeline, AdmissionRequest, Rejection};
pub use queue::{AdmissionQueue, PendingRequest, DEFAULT_QUEUE_CAPACITY, MAX_QUEUE_CAPACITY};
pub use sweeper::{EvictionSweeper, SweeperHandle, DEFAULT_STALENESS_WINDOW, DEFAULT_SWEEP_INTERVAL};
