#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Artifact publishing
//!
//! Uploads the finished archive and a companion installation manifest
//! to durable object storage, returns the delivery URLs, and schedules
//! best-effort deletion of both objects after a retention window.

mod manifest;
mod preflight;
mod publisher;
mod store;

pub use manifest::{install_manifest, install_uri};
pub use preflight::check_resources;
pub use publisher::{ArtifactPublisher, PublishedArtifact};
pub use store::{HttpObjectStore, MemoryObjectStore, ObjectStore};
