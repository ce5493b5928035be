//! Per-job state record

use ipaforge_types::{JobFailure, JobId, JobPhase, JobResult, JobSnapshot, JobStatus};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Mutable state for one job, owned by the arena.
pub(crate) struct JobRecord {
    pub phase: JobPhase,
    pub status: JobStatus,
    pub error: Option<JobFailure>,
    pub result: Option<JobResult>,
    pub touched: Instant,
    pub token: CancellationToken,
}

impl JobRecord {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            phase: JobPhase::Authenticating,
            status: JobStatus::Processing,
            error: None,
            result: None,
            touched: Instant::now(),
            token,
        }
    }

    /// Advance to a later phase. Earlier or equal phases are ignored
    /// so percent stays monotone.
    pub fn advance(&mut self, phase: JobPhase) {
        if phase > self.phase {
            self.phase = phase;
        }
        self.touched = Instant::now();
    }

    pub fn snapshot(&self, id: JobId) -> JobSnapshot {
        JobSnapshot {
            id,
            phase: self.phase,
            percent: self.phase.percent(),
            status: self.status,
            error: self.error.clone(),
            result: self.result.clone(),
        }
    }
}
