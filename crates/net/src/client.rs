//! HTTP client wrapper for ranged fetches and size probes

use ipaforge_config::DownloadConfig;
use ipaforge_errors::{Error, NetworkError};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// Thin wrapper around `reqwest` for the downloader.
///
/// The per-range timeout is enforced by the caller around the whole
/// range fetch, so this client only carries a connect timeout.
#[derive(Debug, Clone)]
pub struct NetClient {
    client: Client,
}

impl NetClient {
    /// Create a new network client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &DownloadConfig) -> Result<Self, Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout() * config.retries.max(1))
            .build()
            .map_err(|e| NetworkError::ConnectionRefused(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetch one inclusive byte range.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn get_range(&self, url: &str, start: u64, end: u64) -> Result<Response, Error> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|e| classify_reqwest(url, &e))?;

        if response.status() == StatusCode::PARTIAL_CONTENT || response.status().is_success() {
            Ok(response)
        } else {
            Err(NetworkError::HttpError {
                status: response.status().as_u16(),
                message: format!("range {start}-{end} of {url}"),
            }
            .into())
        }
    }

    /// Determine the total size of the resource before fetching it.
    ///
    /// Tries a HEAD first; servers that refuse HEAD or omit the length
    /// get a one-byte ranged GET whose `Content-Range` carries the total.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError::SizeProbeFailed`] when neither strategy
    /// yields a size.
    pub async fn probe_size(&self, url: &str) -> Result<u64, Error> {
        if let Ok(response) = self.client.head(url).send().await {
            if response.status().is_success() {
                if let Some(len) = response.content_length() {
                    if len > 0 {
                        return Ok(len);
                    }
                }
            }
        }

        let response = self
            .client
            .get(url)
            .header(reqwest::header::RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| classify_reqwest(url, &e))?;

        response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                NetworkError::SizeProbeFailed {
                    url: url.to_string(),
                    message: "no usable content length or content range".to_string(),
                }
                .into()
            })
    }
}

/// Total size from a `Content-Range` header value, e.g. `bytes 0-0/1234`.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit('/').next()?.trim().parse().ok()
}

fn classify_reqwest(url: &str, error: &reqwest::Error) -> Error {
    if error.is_timeout() {
        NetworkError::Timeout {
            url: url.to_string(),
        }
        .into()
    } else if error.is_connect() {
        NetworkError::ConnectionRefused(error.to_string()).into()
    } else {
        NetworkError::DownloadFailed(error.to_string()).into()
    }
}
