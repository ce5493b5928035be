//! Job identity, phases and progress snapshots

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for one acquisition job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a job id from its string form.
    ///
    /// # Errors
    ///
    /// Returns `JobError::NotFound` when the string is not a valid id,
    /// so malformed ids and unknown ids are indistinguishable to callers.
    pub fn parse(s: &str) -> Result<Self, ipaforge_errors::JobError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ipaforge_errors::JobError::NotFound { id: s.to_string() })
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Pipeline phase ladder for one job.
///
/// Each phase maps to a fixed percent so progress is monotone by
/// construction: phases only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Authenticating,
    Authenticated,
    Preflight,
    Downloaded,
    Signed,
    Published,
    Complete,
}

impl JobPhase {
    /// Percent of overall work represented by reaching this phase.
    #[must_use]
    pub fn percent(self) -> u8 {
        match self {
            Self::Authenticating => 0,
            Self::Authenticated => 10,
            Self::Preflight => 20,
            Self::Downloaded => 40,
            Self::Signed => 60,
            Self::Published => 80,
            Self::Complete => 100,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Preflight => "preflight",
            Self::Downloaded => "downloaded",
            Self::Signed => "signed",
            Self::Published => "published",
            Self::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Terminal/non-terminal status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// Stable error code plus human-readable detail for a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    pub code: String,
    pub detail: String,
}

/// Delivery URLs and size of a finished artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Public URL of the signed archive.
    pub archive_url: String,
    /// `itms-services` URI that triggers a client-side install.
    pub install_uri: String,
    /// Size of the signed archive in bytes.
    pub size: u64,
}

/// Point-in-time view of a job, as delivered to subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub phase: JobPhase,
    pub percent: u8,
    pub status: JobStatus,
    pub error: Option<JobFailure>,
    pub result: Option<JobResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_percents_ascend() {
        let ladder = [
            JobPhase::Authenticating,
            JobPhase::Authenticated,
            JobPhase::Preflight,
            JobPhase::Downloaded,
            JobPhase::Signed,
            JobPhase::Published,
            JobPhase::Complete,
        ];
        for pair in ladder.windows(2) {
            assert!(pair[0].percent() < pair[1].percent());
        }
        assert_eq!(JobPhase::Complete.percent(), 100);
    }

    #[test]
    fn job_id_round_trips() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
        assert!(JobId::parse("not-a-uuid").is_err());
    }
}
