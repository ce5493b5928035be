//! The per-job acquisition pipeline
//!
//! One task per job walks the phase ladder: authenticate, resolve the
//! entitlement, preflight host resources, download, sign, publish.
//! Cancellation is checked at every phase boundary; the download layer
//! additionally checks between chunks.

use crate::manager::{Inner, JobRequest};
use ipaforge_errors::{Error, StoreError};
use ipaforge_net::ChunkedDownloader;
use ipaforge_publish::ArtifactPublisher;
use ipaforge_signer::ArchiveSigner;
use ipaforge_store::StoreClient;
use ipaforge_types::{AuthOutcome, JobId, JobPhase, JobResult, Session};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub(crate) async fn run(
    inner: &Arc<Inner>,
    id: JobId,
    request: JobRequest,
    token: &CancellationToken,
) -> Result<JobResult, Error> {
    let work_dir = inner.config.jobs.work_dir.clone();
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|e| Error::io_with_path(&e, &work_dir))?;

    let raw = work_dir.join(format!("{id}.ipa"));
    let signed = work_dir.join(format!("{id}.signed.ipa"));

    let outcome = execute(inner, id, &request, token, &raw, &signed).await;

    for path in [&raw, &signed] {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %path.display(), error = %e, "scratch cleanup failed");
            }
        }
    }
    outcome
}

async fn execute(
    inner: &Arc<Inner>,
    id: JobId,
    request: &JobRequest,
    token: &CancellationToken,
    raw: &Path,
    signed: &Path,
) -> Result<JobResult, Error> {
    checkpoint(token)?;
    let client = StoreClient::new(inner.config.store.clone(), inner.tx.clone())?;
    let session = authenticate(&client, request).await?;
    inner.advance(id, JobPhase::Authenticated);

    checkpoint(token)?;
    let entitlement = client
        .resolve_entitlement(&request.package, &session)
        .await?;

    let publisher = ArtifactPublisher::new(
        inner.config.publish.clone(),
        Arc::clone(&inner.store),
        inner.tx.clone(),
    );
    publisher.preflight()?;
    inner.advance(id, JobPhase::Preflight);

    checkpoint(token)?;
    let downloader = ChunkedDownloader::new(inner.config.download.clone(), inner.tx.clone())?;
    downloader
        .download(&entitlement.download_url, raw, token)
        .await?;
    inner.advance(id, JobPhase::Downloaded);

    checkpoint(token)?;
    let signer = ArchiveSigner::new(inner.config.signer.clone());
    signer
        .sign(raw, signed, &entitlement, &request.credentials.account)
        .await?;
    inner.advance(id, JobPhase::Signed);

    checkpoint(token)?;
    let artifact = publisher.publish(id, &entitlement, signed).await?;
    inner.advance(id, JobPhase::Published);

    Ok(artifact.into_result())
}

async fn authenticate(client: &StoreClient, request: &JobRequest) -> Result<Session, Error> {
    match client.authenticate(&request.credentials).await? {
        AuthOutcome::Authenticated(session) => Ok(session),
        AuthOutcome::SecondFactorRequired => Err(StoreError::SecondFactorRequired.into()),
        AuthOutcome::Failed { message } => {
            Err(StoreError::AuthenticationFailed { message }.into())
        }
    }
}

fn checkpoint(token: &CancellationToken) -> Result<(), Error> {
    if token.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}
