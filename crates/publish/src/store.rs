//! Object storage abstraction and backends

use async_trait::async_trait;
use dashmap::DashMap;
use ipaforge_config::PublishConfig;
use ipaforge_errors::{Error, PublishError};
use std::path::Path;
use tokio_util::io::ReaderStream;

/// Durable object storage for published artifacts.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload a byte buffer and return the object's public URL.
    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error>;

    /// Upload a file without buffering it in memory.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str)
        -> Result<String, Error>;

    /// Delete an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), Error>;

    /// Public URL under which an uploaded key is reachable.
    fn public_url(&self, key: &str) -> String;
}

/// Bucket-style HTTP storage backend (PUT/DELETE with bearer auth).
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
    public_base: String,
}

impl HttpObjectStore {
    /// Build a backend from the publish configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when no endpoint is configured or the HTTP
    /// client cannot be built.
    pub fn new(config: &PublishConfig) -> Result<Self, Error> {
        if config.endpoint.is_empty() {
            return Err(PublishError::InvalidEndpoint(
                "no storage endpoint configured".to_string(),
            )
            .into());
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| PublishError::InvalidEndpoint(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            public_base: config.public_base.trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{key}", self.endpoint, self.bucket)
    }

    fn request(&self, method: reqwest::Method, key: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.request(method, self.object_url(key));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn upload(
        &self,
        key: &str,
        body: reqwest::Body,
        content_type: &str,
    ) -> Result<String, Error> {
        let response = self
            .request(reqwest::Method::PUT, key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::UploadFailed {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PublishError::UploadFailed {
                key: key.to_string(),
                message: format!("status {}", response.status()),
            }
            .into());
        }
        Ok(self.public_url(key))
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, Error> {
        self.upload(key, bytes.into(), content_type).await
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, Error> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        self.upload(key, body, content_type).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let response = self
            .request(reqwest::Method::DELETE, key)
            .send()
            .await
            .map_err(|e| PublishError::DeleteFailed {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(PublishError::DeleteFailed {
                key: key.to_string(),
                message: format!("status {status}"),
            }
            .into())
        }
    }

    fn public_url(&self, key: &str) -> String {
        if self.public_base.is_empty() {
            self.object_url(key)
        } else {
            format!("{}/{key}", self.public_base)
        }
    }
}

/// In-memory backend for tests.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.get(key).map(|v| v.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, Error> {
        self.objects.insert(key.to_string(), bytes);
        Ok(self.public_url(key))
    }

    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, Error> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        self.put_bytes(key, bytes, content_type).await
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.objects.remove(key);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{key}")
    }
}
