#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for ipaforge
//!
//! This crate provides fine-grained error types organized by domain.
//! Every error that reaches a caller carries a stable machine-readable
//! code (see [`Error::code`]) next to its human-readable detail.

use thiserror::Error;

pub mod guard;
pub mod job;
pub mod network;
pub mod publish;
pub mod signing;
pub mod store;

// Re-export all error types at the root
pub use guard::GuardError;
pub use job::JobError;
pub use network::NetworkError;
pub use publish::PublishError;
pub use signing::SigningError;
pub use store::StoreError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("job error: {0}")]
    Job(#[from] JobError),

    #[error("guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Stable machine-readable code for this error.
    ///
    /// Codes are part of the external contract: callers match on them,
    /// so changing one is a breaking change.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Store(e) => e.code(),
            Self::Network(e) => e.code(),
            Self::Signing(_) => "SIGN_FAILED",
            Self::Publish(e) => e.code(),
            Self::Job(e) => e.code(),
            Self::Guard(e) => e.code(),
            Self::Config(_) => "CONFIG",
            Self::Internal(_) => "INTERNAL",
            Self::Cancelled => "CANCELLED",
            Self::Io { .. } => "IO",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::Cancelled.code(), "CANCELLED");
        assert_eq!(Error::from(StoreError::NotOwned).code(), "NOT_OWNED");
        assert_eq!(
            Error::from(NetworkError::TooLarge {
                size: 400,
                limit: 300
            })
            .code(),
            "TOO_LARGE"
        );
        assert_eq!(
            Error::from(JobError::TooBusy {
                active: 2,
                limit: 2
            })
            .code(),
            "TOO_BUSY"
        );
    }
}
