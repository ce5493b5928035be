//! Job orchestration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JobError {
    #[error("server busy: {active} of {limit} job slots in use")]
    TooBusy { active: usize, limit: usize },

    #[error("no job with id {id}")]
    NotFound { id: String },

    #[error("job {id} already exists")]
    AlreadyExists { id: String },
}

impl JobError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooBusy { .. } => "TOO_BUSY",
            Self::NotFound { .. } => "JOB_NOT_FOUND",
            Self::AlreadyExists { .. } => "JOB_EXISTS",
        }
    }
}
