//! Entitlement records resolved from the storefront

use serde::{Deserialize, Serialize};

/// A request for one package, optionally pinned to a historic version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRequest {
    /// Storefront catalog identifier of the package.
    pub package_id: String,
    /// Optional external version identifier; latest when absent.
    pub version_id: Option<String>,
}

impl PackageRequest {
    pub fn new(package_id: impl Into<String>) -> Self {
        Self {
            package_id: package_id.into(),
            version_id: None,
        }
    }

    #[must_use]
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }
}

/// One account-bound signature blob, selected by numeric id.
#[derive(Debug, Clone)]
pub struct Sinf {
    pub id: i64,
    /// Raw signature bytes (already base64-decoded from the wire).
    pub data: Vec<u8>,
}

/// The storefront's authorization to download one package.
///
/// Produced by the store client, consumed by the downloader (URL) and
/// the signer (sinfs + metadata).
#[derive(Debug, Clone)]
pub struct Entitlement {
    /// Direct download URL for the raw package archive.
    pub download_url: String,
    /// Account-bound signature blobs keyed by id; id 0 is the bundle sinf.
    pub sinfs: Vec<Sinf>,
    /// Catalog metadata (name, version, bundle id, release date).
    pub metadata: plist::Dictionary,
}

impl Entitlement {
    /// Signature blob with the given id, if the entitlement carries one.
    #[must_use]
    pub fn sinf(&self, id: i64) -> Option<&Sinf> {
        self.sinfs.iter().find(|s| s.id == id)
    }

    /// Catalog metadata string field, when present.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(plist::Value::as_string)
    }

    /// Bundle identifier from catalog metadata.
    #[must_use]
    pub fn bundle_id(&self) -> Option<&str> {
        self.metadata_str("softwareVersionBundleId")
    }

    /// Human-readable package title from catalog metadata.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.metadata_str("itemName")
    }

    /// Marketing version string from catalog metadata.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.metadata_str("bundleShortVersionString")
    }
}
