#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Archive re-signing
//!
//! Injects the account-bound signature blob and purchaser metadata
//! into a downloaded package archive, producing an installable copy.
//! Two strategies sit behind one interface: small archives are
//! rewritten through a memory buffer, large ones through an
//! extract-and-recompress scratch directory that bounds peak memory.
//! Both yield the same logical entries; only compression parameters
//! may differ.

mod manifest;
mod rewrite;

pub use manifest::{find_manifest_entry, purchaser_metadata, sinf_target_path};

use ipaforge_config::SignerConfig;
use ipaforge_errors::{Error, SigningError};
use ipaforge_types::Entitlement;
use std::path::{Path, PathBuf};

/// The bundle signature blob always has id 0.
pub const BUNDLE_SINF_ID: i64 = 0;

/// Re-signing strategy, selected by archive size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Rewrite the archive through an in-memory buffer.
    InMemory,
    /// Extract to a scratch directory, patch on disk, recompress.
    Extract,
}

impl Strategy {
    #[must_use]
    pub fn for_size(size: u64, in_memory_limit: u64) -> Self {
        if size <= in_memory_limit {
            Self::InMemory
        } else {
            Self::Extract
        }
    }
}

/// Owned inputs for one signing run.
#[derive(Debug, Clone)]
pub(crate) struct SignRequest {
    pub archive: PathBuf,
    pub output: PathBuf,
    pub sinf: Vec<u8>,
    pub metadata_doc: Vec<u8>,
}

/// Signs downloaded archives with an account entitlement.
pub struct ArchiveSigner {
    config: SignerConfig,
}

impl ArchiveSigner {
    #[must_use]
    pub fn new(config: SignerConfig) -> Self {
        Self { config }
    }

    /// Sign `archive` into `output`.
    ///
    /// Writes the decoded bundle sinf at the path the signing manifest
    /// declares and a purchaser metadata document at the archive root.
    ///
    /// # Errors
    ///
    /// All failures are fatal and non-retryable: a missing manifest
    /// entry, a manifest that declares no signature path, or an
    /// entitlement without the expected signature blob.
    pub async fn sign(
        &self,
        archive: &Path,
        output: &Path,
        entitlement: &Entitlement,
        account: &str,
    ) -> Result<(), Error> {
        let sinf = entitlement
            .sinf(BUNDLE_SINF_ID)
            .ok_or(SigningError::SinfMissing { id: BUNDLE_SINF_ID })?
            .data
            .clone();
        let metadata_doc = purchaser_metadata(&entitlement.metadata, account)?;

        let size = tokio::fs::metadata(archive)
            .await
            .map_err(|e| Error::io_with_path(&e, archive))?
            .len();
        let strategy = Strategy::for_size(size, self.config.in_memory_limit);
        tracing::debug!(size, ?strategy, "signing archive");

        let request = SignRequest {
            archive: archive.to_path_buf(),
            output: output.to_path_buf(),
            sinf,
            metadata_doc,
        };

        tokio::task::spawn_blocking(move || match strategy {
            Strategy::InMemory => rewrite::sign_in_memory(&request),
            Strategy::Extract => rewrite::sign_extracted(&request),
        })
        .await
        .map_err(|e| Error::internal(format!("signing task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_selects_by_size() {
        assert_eq!(Strategy::for_size(10, 100), Strategy::InMemory);
        assert_eq!(Strategy::for_size(100, 100), Strategy::InMemory);
        assert_eq!(Strategy::for_size(101, 100), Strategy::Extract);
    }
}
