//! Domain-grouped event definitions

use ipaforge_types::{JobId, JobPhase};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level event wrapper, grouped by functional domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum AppEvent {
    General(GeneralEvent),
    Store(StoreEvent),
    Download(DownloadEvent),
    Publish(PublishEvent),
    Job(JobEvent),
}

/// Cross-cutting diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeneralEvent {
    Debug { message: String },
    Warning { message: String },
}

/// Storefront protocol lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    AuthenticationStarted { account: String },
    Authenticated { account: String },
    SecondFactorRequested { account: String },
    EntitlementResolved { package_id: String },
}

/// Chunked download lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DownloadEvent {
    Started {
        url: String,
        size: u64,
        chunks: usize,
    },
    ChunkCompleted {
        url: String,
        index: usize,
        total: usize,
    },
    ChunkRetrying {
        url: String,
        index: usize,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
    },
    Merged {
        url: String,
        size: u64,
    },
}

/// Artifact upload and retention lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishEvent {
    UploadStarted { key: String, size: u64 },
    UploadCompleted { key: String, url: String },
    RetentionExpired { key: String },
}

/// Job orchestration lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Started { id: JobId },
    PhaseChanged { id: JobId, phase: JobPhase },
    Completed { id: JobId },
    Failed { id: JobId, code: String },
    Cancelled { id: JobId },
    Swept { id: JobId },
}
