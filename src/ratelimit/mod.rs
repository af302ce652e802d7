//! Per-client, per-endpoint rate limiting.

mod bucket;
mod client;
mod registry;

pub use bucket::TokenBucket;
pub use client::{ClientRecord, ClientSpec, ResourceLimits};
pub use registry::{ClientRegistry, LimiterLookup, DEFAULT_REFILL_RATE};
