//! Installation manifest and install URI construction

use ipaforge_errors::Error;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

/// Build the OTA installation manifest referencing the uploaded archive.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn install_manifest(
    archive_url: &str,
    bundle_id: &str,
    version: &str,
    title: &str,
) -> Result<Vec<u8>, Error> {
    let mut asset = plist::Dictionary::new();
    asset.insert(
        "kind".to_string(),
        plist::Value::String("software-package".to_string()),
    );
    asset.insert(
        "url".to_string(),
        plist::Value::String(archive_url.to_string()),
    );

    let mut metadata = plist::Dictionary::new();
    metadata.insert(
        "bundle-identifier".to_string(),
        plist::Value::String(bundle_id.to_string()),
    );
    metadata.insert(
        "bundle-version".to_string(),
        plist::Value::String(version.to_string()),
    );
    metadata.insert(
        "kind".to_string(),
        plist::Value::String("software".to_string()),
    );
    metadata.insert("title".to_string(), plist::Value::String(title.to_string()));

    let mut item = plist::Dictionary::new();
    item.insert(
        "assets".to_string(),
        plist::Value::Array(vec![plist::Value::Dictionary(asset)]),
    );
    item.insert("metadata".to_string(), plist::Value::Dictionary(metadata));

    let mut root = plist::Dictionary::new();
    root.insert(
        "items".to_string(),
        plist::Value::Array(vec![plist::Value::Dictionary(item)]),
    );

    let mut buf = Vec::new();
    plist::Value::Dictionary(root)
        .to_writer_xml(&mut buf)
        .map_err(|e| Error::internal(format!("failed to encode install manifest: {e}")))?;
    Ok(buf)
}

/// The `itms-services` URI that triggers a client-side install from a
/// published manifest URL.
#[must_use]
pub fn install_uri(manifest_url: &str) -> String {
    format!(
        "itms-services://?action=download-manifest&url={}",
        utf8_percent_encode(manifest_url, NON_ALPHANUMERIC)
    )
}
