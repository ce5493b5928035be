//! Signing-manifest location and document construction

use ipaforge_errors::{Error, SigningError};
use std::io::Cursor;

/// Archive-root name of the purchaser metadata document.
pub const METADATA_ENTRY: &str = "iTunesMetadata.plist";

const MANIFEST_SUFFIX: &str = ".app/SC_Info/Manifest.plist";
const BUNDLE_PREFIX: &str = "Payload/";

/// Locate the inner application bundle's signing-manifest entry.
///
/// The entry always sits at `Payload/<App>.app/SC_Info/Manifest.plist`.
pub fn find_manifest_entry<'a, I>(names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .find(|name| name.starts_with(BUNDLE_PREFIX) && name.ends_with(MANIFEST_SUFFIX))
        .map(str::to_owned)
}

/// Resolve the archive path that must receive the signature bytes.
///
/// Parses the manifest document and joins its first declared relative
/// signature path onto the bundle root derived from the manifest's own
/// location.
///
/// # Errors
///
/// `SigningError::MalformedManifest` when the document does not parse,
/// `SigningError::SinfPathMissing` when it declares no signature path.
pub fn sinf_target_path(manifest_entry: &str, manifest_bytes: &[u8]) -> Result<String, Error> {
    let manifest = plist::Value::from_reader(Cursor::new(manifest_bytes))
        .map_err(|e| SigningError::MalformedManifest(e.to_string()))?
        .into_dictionary()
        .ok_or_else(|| {
            SigningError::MalformedManifest("manifest is not a dictionary".to_string())
        })?;

    let relative = manifest
        .get("SinfPaths")
        .and_then(plist::Value::as_array)
        .and_then(|paths| paths.first())
        .and_then(plist::Value::as_string)
        .ok_or(SigningError::SinfPathMissing)?;

    let bundle_root = manifest_entry
        .strip_suffix("SC_Info/Manifest.plist")
        .ok_or_else(|| {
            SigningError::MalformedManifest(format!(
                "unexpected manifest location: {manifest_entry}"
            ))
        })?;

    Ok(format!("{bundle_root}{relative}"))
}

/// Build the archive-root metadata document: original catalog metadata
/// merged with the purchaser identity fields.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn purchaser_metadata(catalog: &plist::Dictionary, account: &str) -> Result<Vec<u8>, Error> {
    let mut merged = catalog.clone();
    // The installer checks all three spellings.
    for key in ["apple-id", "userName", "appleId"] {
        merged.insert(key.to_string(), plist::Value::String(account.to_string()));
    }

    let mut buf = Vec::new();
    plist::Value::Dictionary(merged)
        .to_writer_xml(&mut buf)
        .map_err(|e| Error::internal(format!("failed to encode metadata document: {e}")))?;
    Ok(buf)
}
