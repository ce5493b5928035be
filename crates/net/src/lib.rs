#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Chunked concurrent downloader
//!
//! Fetches a large binary through bounded-concurrency ranged requests
//! with per-chunk retry, then merges the ranges in strictly ascending
//! index order. Peak disk use stays near (pool width + 1) chunk sizes
//! because each part file is deleted as soon as it has been consumed.

mod chunk;
mod client;
mod download;

pub use chunk::{plan_chunks, ChunkDescriptor};
pub use client::NetClient;
pub use download::ChunkedDownloader;
