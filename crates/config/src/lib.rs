#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration for ipaforge
//!
//! TOML-backed configuration with serde defaults for every field, plus
//! environment merge for the secrets that should never live in a file.

mod core;

pub use core::{
    DownloadConfig, GuardConfig, JobsConfig, PublishConfig, SignerConfig, StoreConfig,
};

use ipaforge_errors::Error;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, one section per component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub guard: GuardConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io_with_path(&e, path))?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a TOML file, falling back to defaults when it is absent.
    ///
    /// # Errors
    ///
    /// Returns an error only when an existing file fails to read or parse.
    pub async fn load_or_default(path: &Path) -> Result<Self, Error> {
        if path.exists() {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Merge secret-bearing environment variables over the file config.
    ///
    /// `IPAFORGE_TICKET_SECRET` and `IPAFORGE_STORAGE_TOKEN` take
    /// precedence over anything the file carries.
    pub fn merge_env(&mut self) {
        if let Ok(secret) = std::env::var("IPAFORGE_TICKET_SECRET") {
            if !secret.is_empty() {
                self.guard.secret = Some(secret);
            }
        }
        if let Ok(token) = std::env::var("IPAFORGE_STORAGE_TOKEN") {
            if !token.is_empty() {
                self.publish.token = Some(token);
            }
        }
        if let Ok(seed) = std::env::var("IPAFORGE_DEVICE_SEED") {
            if !seed.is_empty() {
                self.store.device_seed = Some(seed);
            }
        }
    }
}
