//! Download orchestration: worker pool, retry, ordered merge

use crate::chunk::{plan_chunks, ChunkDescriptor};
use crate::client::NetClient;
use futures::stream::{FuturesUnordered, StreamExt};
use ipaforge_config::DownloadConfig;
use ipaforge_errors::{Error, NetworkError};
use ipaforge_events::{AppEvent, DownloadEvent, EventEmitter, EventSender};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Bounded-concurrency ranged downloader.
#[derive(Debug)]
pub struct ChunkedDownloader {
    client: NetClient,
    config: DownloadConfig,
    tx: Option<EventSender>,
}

impl ChunkedDownloader {
    /// Create a downloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable or the HTTP
    /// client cannot be initialized.
    pub fn new(config: DownloadConfig, tx: Option<EventSender>) -> Result<Self, Error> {
        if config.chunk_size == 0 {
            return Err(Error::Config(
                "download.chunk_size must be positive".to_string(),
            ));
        }
        let client = NetClient::new(&config)?;
        Ok(Self { client, config, tx })
    }

    /// Download `url` to `dest` and return the merged size in bytes.
    ///
    /// Probes the total size first; anything over the configured limit
    /// fails with `TooLarge` before a single content byte is fetched.
    /// Ranges are fetched by a pool of `concurrency` workers, each
    /// range retried with a fixed delay, then merged into `dest` in
    /// ascending index order with every part file deleted as soon as it
    /// has been consumed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` when the token fires, `TooLarge` when
    /// the probe exceeds the limit, and a transport error once a range
    /// has exhausted its retries.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        token: &CancellationToken,
    ) -> Result<u64, Error> {
        let total = self.client.probe_size(url).await?;
        if total > self.config.max_size {
            return Err(NetworkError::TooLarge {
                size: total,
                limit: self.config.max_size,
            }
            .into());
        }
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let chunks = plan_chunks(total, self.config.chunk_size, dest);
        self.tx.emit(AppEvent::Download(DownloadEvent::Started {
            url: url.to_string(),
            size: total,
            chunks: chunks.len(),
        }));

        if let Err(e) = self.fetch_all(url, &chunks, token).await {
            cleanup_parts(&chunks).await;
            return Err(e);
        }

        match merge_chunks(&chunks, dest, token).await {
            Ok(size) => {
                self.tx.emit(AppEvent::Download(DownloadEvent::Merged {
                    url: url.to_string(),
                    size,
                }));
                Ok(size)
            }
            Err(e) => {
                cleanup_parts(&chunks).await;
                let _ = tokio::fs::remove_file(dest).await;
                Err(e)
            }
        }
    }

    /// Run the worker pool over all ranges, failing fast on the first
    /// exhausted range. Dropping the remaining futures aborts their
    /// in-flight requests.
    async fn fetch_all(
        &self,
        url: &str,
        chunks: &[ChunkDescriptor],
        token: &CancellationToken,
    ) -> Result<(), Error> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let total_chunks = chunks.len();

        let mut futures = FuturesUnordered::new();
        for chunk in chunks {
            let client = self.client.clone();
            let config = self.config.clone();
            let tx = self.tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();
            let url = url.to_string();
            let chunk = chunk.clone();

            futures.push(async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| Error::internal("semaphore closed"))?;
                fetch_chunk(&client, &config, &url, &chunk, total_chunks, &token, &tx).await
            });
        }

        while let Some(result) = futures.next().await {
            result?;
        }
        Ok(())
    }
}

/// Fetch one range with retry. Cancellation is checked before every
/// attempt and interrupts both the in-flight request and the retry
/// delay; it is never retried.
async fn fetch_chunk(
    client: &NetClient,
    config: &DownloadConfig,
    url: &str,
    chunk: &ChunkDescriptor,
    total_chunks: usize,
    token: &CancellationToken,
    tx: &Option<EventSender>,
) -> Result<(), Error> {
    let max_attempts = config.retries.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let outcome = tokio::select! {
            () = token.cancelled() => return Err(Error::Cancelled),
            timed = tokio::time::timeout(
                config.request_timeout(),
                fetch_chunk_once(client, url, chunk),
            ) => match timed {
                Ok(result) => result,
                Err(_) => Err(NetworkError::Timeout {
                    url: url.to_string(),
                }
                .into()),
            },
        };

        match outcome {
            Ok(()) => {
                tx.emit(AppEvent::Download(DownloadEvent::ChunkCompleted {
                    url: url.to_string(),
                    index: chunk.index,
                    total: total_chunks,
                }));
                return Ok(());
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) if attempt >= max_attempts => {
                debug!(index = chunk.index, attempt, "range fetch exhausted retries");
                return Err(e);
            }
            Err(e) => {
                debug!(index = chunk.index, attempt, error = %e, "range fetch failed, retrying");
                tx.emit(AppEvent::Download(DownloadEvent::ChunkRetrying {
                    url: url.to_string(),
                    index: chunk.index,
                    attempt,
                    max_attempts,
                    delay: config.retry_delay(),
                }));
                tokio::select! {
                    () = token.cancelled() => return Err(Error::Cancelled),
                    () = tokio::time::sleep(config.retry_delay()) => {}
                }
            }
        }
    }
}

/// One attempt at one range: fetch, verify length, write the part file.
async fn fetch_chunk_once(
    client: &NetClient,
    url: &str,
    chunk: &ChunkDescriptor,
) -> Result<(), Error> {
    let response = client.get_range(url, chunk.start, chunk.end).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| NetworkError::DownloadFailed(e.to_string()))?;

    if bytes.len() as u64 != chunk.len() {
        return Err(NetworkError::DownloadFailed(format!(
            "range {}-{} returned {} bytes, expected {}",
            chunk.start,
            chunk.end,
            bytes.len(),
            chunk.len()
        ))
        .into());
    }

    tokio::fs::write(&chunk.path, &bytes)
        .await
        .map_err(|e| Error::io_with_path(&e, chunk.path.clone()))?;
    Ok(())
}

/// Concatenate part files into the destination in ascending index
/// order, deleting each part immediately after it has been consumed.
async fn merge_chunks(
    chunks: &[ChunkDescriptor],
    dest: &Path,
    token: &CancellationToken,
) -> Result<u64, Error> {
    let mut out = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io_with_path(&e, dest))?;
    let mut written = 0u64;

    for chunk in chunks {
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut part = tokio::fs::File::open(&chunk.path)
            .await
            .map_err(|e| Error::io_with_path(&e, chunk.path.clone()))?;
        written += tokio::io::copy(&mut part, &mut out)
            .await
            .map_err(|e| Error::io_with_path(&e, chunk.path.clone()))?;
        tokio::fs::remove_file(&chunk.path)
            .await
            .map_err(|e| Error::io_with_path(&e, chunk.path.clone()))?;
    }

    out.flush().await?;
    Ok(written)
}

/// Best-effort removal of any part files left behind by a failure.
async fn cleanup_parts(chunks: &[ChunkDescriptor]) {
    for chunk in chunks {
        let _ = tokio::fs::remove_file(&chunk.path).await;
    }
}
