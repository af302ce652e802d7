//! Tollgate - Multi-tenant Admission Control
//!
//! This crate implements an admission-control layer for HTTP endpoints. Each
//! registered client holds an independent token-bucket quota per endpoint,
//! and a bounded, time-windowed queue of recent arrivals rejects all traffic
//! once outstanding load exceeds a global ceiling.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
