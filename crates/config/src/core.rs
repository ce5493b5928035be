//! Configuration sections and their serde defaults

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Storefront protocol client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_entitlement_url")]
    pub entitlement_url: String,
    #[serde(default = "default_store_user_agent")]
    pub user_agent: String,
    /// Seed for the per-process device identifier. Hostname when unset.
    #[serde(default)]
    pub device_seed: Option<String>,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            entitlement_url: default_entitlement_url(),
            user_agent: default_store_user_agent(),
            device_seed: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Chunked downloader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Fixed chunk size in bytes (default 5 MiB).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Maximum permitted total size in bytes (default 300 MiB).
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Worker pool width (default 2).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Per-range request timeout in seconds (default 15).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Per-range retry count (default 5).
    #[serde(default = "default_retries")]
    pub retries: u32,
    /// Fixed delay between retries in seconds (default 3).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_size: default_max_size(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout(),
            retries: default_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl DownloadConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Archive signer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Archives up to this size are re-signed fully in memory; larger
    /// ones go through an extract-and-recompress scratch directory.
    #[serde(default = "default_in_memory_limit")]
    pub in_memory_limit: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            in_memory_limit: default_in_memory_limit(),
        }
    }
}

/// Artifact publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Object storage endpoint, e.g. `https://storage.example.com/v1`.
    #[serde(default)]
    pub endpoint: String,
    /// Bucket or container name appended to the endpoint.
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// Bearer token for the storage API. Env `IPAFORGE_STORAGE_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,
    /// Base URL under which uploaded objects are publicly reachable.
    #[serde(default)]
    pub public_base: String,
    /// Minimum free memory required before publishing (bytes, 0 disables).
    #[serde(default = "default_min_free_memory")]
    pub min_free_memory: u64,
    /// Minimum free disk required at the staging path (bytes, 0 disables).
    #[serde(default = "default_min_free_disk")]
    pub min_free_disk: u64,
    /// Staging path whose filesystem is checked by the disk preflight.
    #[serde(default = "default_staging_path")]
    pub staging_path: PathBuf,
    /// Retention window before uploaded objects are deleted (default 5 min).
    #[serde(default = "default_retention")]
    pub retention_secs: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: default_bucket(),
            token: None,
            public_base: String::new(),
            min_free_memory: default_min_free_memory(),
            min_free_disk: default_min_free_disk(),
            staging_path: default_staging_path(),
            retention_secs: default_retention(),
        }
    }
}

impl PublishConfig {
    #[must_use]
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

/// Job orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Global ceiling on concurrently active jobs (default 2).
    #[serde(default = "default_max_active")]
    pub max_active: usize,
    /// Interval at which a subscription re-reads its job record.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Interval at which heartbeats keep a quiet subscription alive.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_ms: u64,
    /// Records untouched for this long are forcibly swept.
    #[serde(default = "default_job_ttl")]
    pub job_ttl_secs: u64,
    /// Cadence of the sweep task.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Working directory for per-job scratch files.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            max_active: default_max_active(),
            poll_interval_ms: default_poll_interval(),
            heartbeat_interval_ms: default_heartbeat_interval(),
            job_ttl_secs: default_job_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            work_dir: default_work_dir(),
        }
    }
}

impl JobsConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    #[must_use]
    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Abuse-prevention configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Keyed-hash secret for ticket signatures. Issuance is disabled
    /// when unset. Env `IPAFORGE_TICKET_SECRET`.
    #[serde(default)]
    pub secret: Option<String>,
    /// Ticket validity window in seconds (default 5).
    #[serde(default = "default_ticket_ttl")]
    pub ticket_ttl_secs: u64,
    /// Consumed tickets are purged this long after use (default 10).
    #[serde(default = "default_purge_after")]
    pub purge_after_secs: u64,
    /// Job-initiating requests allowed per client address per window.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// Rate-limit window in seconds (default 900).
    #[serde(default = "default_rate_window")]
    pub rate_window_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            secret: None,
            ticket_ttl_secs: default_ticket_ttl(),
            purge_after_secs: default_purge_after(),
            rate_limit: default_rate_limit(),
            rate_window_secs: default_rate_window(),
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn ticket_ttl(&self) -> Duration {
        Duration::from_secs(self.ticket_ttl_secs)
    }

    #[must_use]
    pub fn purge_after(&self) -> Duration {
        Duration::from_secs(self.purge_after_secs)
    }

    #[must_use]
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}

// Default value functions for serde

fn default_auth_url() -> String {
    "https://auth.store.example/authenticate".to_string()
}

fn default_entitlement_url() -> String {
    "https://buy.store.example/volumeStoreDownloadProduct".to_string()
}

fn default_store_user_agent() -> String {
    "Configurator/2.15 (Macintosh; OS X 10.15.1)".to_string()
}

fn default_store_timeout() -> u64 {
    30
}

fn default_chunk_size() -> u64 {
    5 * 1024 * 1024
}

fn default_max_size() -> u64 {
    300 * 1024 * 1024
}

fn default_concurrency() -> usize {
    2
}

fn default_request_timeout() -> u64 {
    15
}

fn default_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    3
}

fn default_in_memory_limit() -> u64 {
    64 * 1024 * 1024
}

fn default_bucket() -> String {
    "artifacts".to_string()
}

fn default_min_free_memory() -> u64 {
    256 * 1024 * 1024
}

fn default_min_free_disk() -> u64 {
    1024 * 1024 * 1024
}

fn default_staging_path() -> PathBuf {
    std::env::temp_dir()
}

fn default_retention() -> u64 {
    300
}

fn default_max_active() -> usize {
    2
}

fn default_poll_interval() -> u64 {
    2000
}

fn default_heartbeat_interval() -> u64 {
    500
}

fn default_job_ttl() -> u64 {
    600
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("ipaforge")
}

fn default_ticket_ttl() -> u64 {
    5
}

fn default_purge_after() -> u64 {
    10
}

fn default_rate_limit() -> u32 {
    5
}

fn default_rate_window() -> u64 {
    900
}
