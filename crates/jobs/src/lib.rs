#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Job orchestration
//!
//! Admits acquisition jobs under a global concurrency ceiling, runs
//! each as a single pipeline task through a fixed phase ladder, and
//! serves polled progress subscriptions with heartbeats, cooperative
//! cancellation and TTL-based sweeping of stale records.

mod manager;
mod pipeline;
mod record;

pub use manager::{JobManager, JobRequest};
