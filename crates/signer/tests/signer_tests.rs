//! End-to-end signing tests over fixture archives

use ipaforge_config::SignerConfig;
use ipaforge_errors::{Error, SigningError};
use ipaforge_signer::ArchiveSigner;
use ipaforge_types::{Entitlement, Sinf};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>SinfPaths</key>
    <array><string>SC_Info/Demo.sinf</string></array>
</dict>
</plist>"#;

const SINF_BYTES: &[u8] = b"account-bound-signature";

fn fixture_ipa(dir: &Path, with_manifest: bool) -> PathBuf {
    let path = dir.join("raw.ipa");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    zip.start_file("Payload/Demo.app/Info.plist", options).unwrap();
    zip.write_all(b"<plist/>").unwrap();
    zip.start_file("Payload/Demo.app/Demo", options).unwrap();
    zip.write_all(b"\x00binary\x01").unwrap();
    if with_manifest {
        zip.start_file("Payload/Demo.app/SC_Info/Manifest.plist", options)
            .unwrap();
        zip.write_all(MANIFEST.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn entitlement() -> Entitlement {
    let mut metadata = plist::Dictionary::new();
    metadata.insert(
        "itemName".to_string(),
        plist::Value::String("Demo".to_string()),
    );
    metadata.insert(
        "softwareVersionBundleId".to_string(),
        plist::Value::String("com.example.demo".to_string()),
    );
    Entitlement {
        download_url: String::new(),
        sinfs: vec![Sinf {
            id: 0,
            data: SINF_BYTES.to_vec(),
        }],
        metadata,
    }
}

/// Non-directory entries of a zip as name -> contents.
fn file_entries(path: &Path) -> BTreeMap<String, Vec<u8>> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entries = BTreeMap::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        if entry.name().ends_with('/') {
            continue;
        }
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf).unwrap();
        entries.insert(entry.name().to_string(), buf);
    }
    entries
}

fn signer(in_memory_limit: u64) -> ArchiveSigner {
    ArchiveSigner::new(SignerConfig { in_memory_limit })
}

#[tokio::test]
async fn in_memory_signing_injects_sinf_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let raw = fixture_ipa(dir.path(), true);
    let signed = dir.path().join("signed.ipa");

    signer(u64::MAX)
        .sign(&raw, &signed, &entitlement(), "user@example.com")
        .await
        .unwrap();

    let entries = file_entries(&signed);
    assert_eq!(
        entries.get("Payload/Demo.app/SC_Info/Demo.sinf").unwrap(),
        SINF_BYTES
    );
    // Original entries survive untouched.
    assert_eq!(
        entries.get("Payload/Demo.app/Demo").unwrap(),
        b"\x00binary\x01"
    );

    let metadata = plist::Value::from_reader(std::io::Cursor::new(
        entries.get("iTunesMetadata.plist").unwrap().as_slice(),
    ))
    .unwrap()
    .into_dictionary()
    .unwrap();
    assert_eq!(
        metadata.get("apple-id").and_then(plist::Value::as_string),
        Some("user@example.com")
    );
    assert_eq!(
        metadata.get("itemName").and_then(plist::Value::as_string),
        Some("Demo")
    );
}

#[tokio::test]
async fn both_strategies_produce_identical_logical_output() {
    let dir = tempfile::tempdir().unwrap();
    let raw = fixture_ipa(dir.path(), true);
    let via_memory = dir.path().join("memory.ipa");
    let via_extract = dir.path().join("extract.ipa");

    // Limit of u64::MAX forces in-memory; 0 forces extraction.
    signer(u64::MAX)
        .sign(&raw, &via_memory, &entitlement(), "user@example.com")
        .await
        .unwrap();
    signer(0)
        .sign(&raw, &via_extract, &entitlement(), "user@example.com")
        .await
        .unwrap();

    assert_eq!(file_entries(&via_memory), file_entries(&via_extract));
}

#[tokio::test]
async fn missing_manifest_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let raw = fixture_ipa(dir.path(), false);

    let err = signer(u64::MAX)
        .sign(
            &raw,
            &dir.path().join("signed.ipa"),
            &entitlement(),
            "user@example.com",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Signing(SigningError::ManifestMissing)
    ));
}

#[tokio::test]
async fn missing_sinf_blob_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let raw = fixture_ipa(dir.path(), true);
    let mut entitlement = entitlement();
    entitlement.sinfs.clear();

    let err = signer(u64::MAX)
        .sign(
            &raw,
            &dir.path().join("signed.ipa"),
            &entitlement,
            "user@example.com",
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Signing(SigningError::SinfMissing { id: 0 })
    ));
    assert_eq!(err.code(), "SIGN_FAILED");
}
