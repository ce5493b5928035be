//! Artifact publishing error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PublishError {
    #[error("insufficient free memory: {available} bytes available, {required} required")]
    InsufficientMemory { available: u64, required: u64 },

    #[error("insufficient free disk: {available} bytes available, {required} required")]
    InsufficientDisk { available: u64, required: u64 },

    #[error("upload of {key} failed: {message}")]
    UploadFailed { key: String, message: String },

    #[error("delete of {key} failed: {message}")]
    DeleteFailed { key: String, message: String },

    #[error("invalid storage endpoint: {0}")]
    InvalidEndpoint(String),
}

impl PublishError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientMemory { .. } => "NO_MEMORY",
            Self::InsufficientDisk { .. } => "NO_DISK",
            Self::UploadFailed { .. } | Self::DeleteFailed { .. } | Self::InvalidEndpoint(_) => {
                "PUBLISH_FAILED"
            }
        }
    }
}
