//! Archive signing error types
//!
//! All signing failures are fatal and non-retryable: they indicate a
//! malformed archive or an entitlement that cannot authorize this package.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SigningError {
    #[error("signing manifest entry not found in archive")]
    ManifestMissing,

    #[error("signing manifest declares no signature path")]
    SinfPathMissing,

    #[error("no signature blob with id {id} in entitlement")]
    SinfMissing { id: i64 },

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("malformed signing manifest: {0}")]
    MalformedManifest(String),
}
