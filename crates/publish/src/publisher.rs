//! Upload orchestration and retention cleanup

use crate::manifest::{install_manifest, install_uri};
use crate::preflight::check_resources;
use crate::store::ObjectStore;
use ipaforge_config::PublishConfig;
use ipaforge_errors::Error;
use ipaforge_events::{AppEvent, EventEmitter, EventSender, PublishEvent};
use ipaforge_types::{Entitlement, JobId, JobResult};
use std::path::Path;
use std::sync::Arc;

/// Delivery URLs for a published archive.
#[derive(Clone, Debug)]
pub struct PublishedArtifact {
    /// Public URL of the uploaded archive.
    pub archive_url: String,
    /// Public URL of the companion installation manifest.
    pub manifest_url: String,
    /// Device-install URI pointing at the manifest.
    pub install_uri: String,
    /// Archive size in bytes.
    pub size: u64,
}

impl PublishedArtifact {
    /// Collapse into the result shape carried on job snapshots.
    #[must_use]
    pub fn into_result(self) -> JobResult {
        JobResult {
            archive_url: self.archive_url,
            install_uri: self.install_uri,
            size: self.size,
        }
    }
}

/// Uploads finished archives to object storage and schedules their
/// deletion once the retention window elapses.
pub struct ArtifactPublisher {
    config: PublishConfig,
    store: Arc<dyn ObjectStore>,
    tx: Option<EventSender>,
}

impl ArtifactPublisher {
    #[must_use]
    pub fn new(
        config: PublishConfig,
        store: Arc<dyn ObjectStore>,
        tx: Option<EventSender>,
    ) -> Self {
        Self { config, store, tx }
    }

    /// Verify the host has enough free memory and staging disk before
    /// any expensive work begins.
    ///
    /// # Errors
    ///
    /// Returns `PublishError::InsufficientMemory` or
    /// `PublishError::InsufficientDisk` when a configured threshold is
    /// not met.
    pub fn preflight(&self) -> Result<(), Error> {
        check_resources(&self.config)
    }

    /// Upload the signed archive plus its installation manifest and
    /// return the delivery URLs.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive cannot be read, either upload
    /// fails, or the manifest cannot be serialized.
    pub async fn publish(
        &self,
        job_id: JobId,
        entitlement: &Entitlement,
        archive: &Path,
    ) -> Result<PublishedArtifact, Error> {
        let bundle_id = entitlement.bundle_id().unwrap_or("unknown.bundle");
        let version = entitlement.version().unwrap_or("0");
        let title = entitlement.title().unwrap_or(bundle_id);

        let size = tokio::fs::metadata(archive)
            .await
            .map_err(|e| Error::io_with_path(&e, archive))?
            .len();

        let archive_key = format!("{bundle_id}/{job_id}/{bundle_id}-{version}.ipa");
        let manifest_key = format!("{bundle_id}/{job_id}/manifest.plist");

        self.tx.emit(AppEvent::Publish(PublishEvent::UploadStarted {
            key: archive_key.clone(),
            size,
        }));
        let archive_url = self
            .store
            .put_file(&archive_key, archive, "application/octet-stream")
            .await?;
        self.tx.emit(AppEvent::Publish(PublishEvent::UploadCompleted {
            key: archive_key.clone(),
            url: archive_url.clone(),
        }));

        let manifest = install_manifest(&archive_url, bundle_id, version, title)?;
        let manifest_url = self
            .store
            .put_bytes(&manifest_key, manifest, "text/xml")
            .await?;

        self.schedule_cleanup(vec![archive_key, manifest_key]);

        let install_uri = install_uri(&manifest_url);
        Ok(PublishedArtifact {
            archive_url,
            manifest_url,
            install_uri,
            size,
        })
    }

    /// Delete the uploaded objects once the retention window elapses.
    /// Failures are logged, never surfaced.
    fn schedule_cleanup(&self, keys: Vec<String>) {
        let retention = self.config.retention();
        let store = Arc::clone(&self.store);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(retention).await;
            for key in keys {
                match store.delete(&key).await {
                    Ok(()) => {
                        tx.emit(AppEvent::Publish(PublishEvent::RetentionExpired {
                            key: key.clone(),
                        }));
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "retention cleanup failed");
                    }
                }
            }
        });
    }
}
