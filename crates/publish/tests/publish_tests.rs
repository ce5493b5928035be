//! Publisher integration tests

use httpmock::prelude::*;
use ipaforge_config::PublishConfig;
use ipaforge_publish::{ArtifactPublisher, HttpObjectStore, MemoryObjectStore, ObjectStore};
use ipaforge_types::{Entitlement, JobId};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn entitlement() -> Entitlement {
    let mut metadata = plist::Dictionary::new();
    metadata.insert(
        "softwareVersionBundleId".to_string(),
        plist::Value::String("com.example.app".to_string()),
    );
    metadata.insert(
        "bundleShortVersionString".to_string(),
        plist::Value::String("2.1".to_string()),
    );
    metadata.insert(
        "itemName".to_string(),
        plist::Value::String("Example App".to_string()),
    );
    Entitlement {
        download_url: "https://dl.example/app.ipa".to_string(),
        sinfs: Vec::new(),
        metadata,
    }
}

fn write_archive(dir: &tempfile::TempDir) -> std::path::PathBuf {
    let path = dir.path().join("signed.ipa");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(b"archive-bytes").unwrap();
    path
}

#[tokio::test]
async fn publish_uploads_archive_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(&dir);
    let store = Arc::new(MemoryObjectStore::new());
    let publisher = ArtifactPublisher::new(
        PublishConfig::default(),
        store.clone() as Arc<dyn ObjectStore>,
        None,
    );

    let job_id = JobId::new();
    let artifact = publisher
        .publish(job_id, &entitlement(), &archive)
        .await
        .unwrap();

    assert_eq!(artifact.size, 13);
    assert_eq!(store.len(), 2);

    let archive_key = format!("com.example.app/{job_id}/com.example.app-2.1.ipa");
    let manifest_key = format!("com.example.app/{job_id}/manifest.plist");
    assert_eq!(store.get(&archive_key).unwrap(), b"archive-bytes");

    let manifest = store.get(&manifest_key).unwrap();
    let doc = plist::Value::from_reader(std::io::Cursor::new(manifest)).unwrap();
    let doc = doc.into_dictionary().unwrap();
    let item = doc.get("items").and_then(plist::Value::as_array).unwrap()[0]
        .as_dictionary()
        .unwrap();
    let asset = item.get("assets").and_then(plist::Value::as_array).unwrap()[0]
        .as_dictionary()
        .unwrap();
    assert_eq!(
        asset.get("url").and_then(plist::Value::as_string),
        Some(artifact.archive_url.as_str())
    );

    assert!(artifact
        .install_uri
        .starts_with("itms-services://?action=download-manifest&url="));
}

#[tokio::test]
async fn retention_deletes_uploaded_objects() {
    let dir = tempfile::tempdir().unwrap();
    let archive = write_archive(&dir);
    let store = Arc::new(MemoryObjectStore::new());
    let config = PublishConfig {
        retention_secs: 0,
        ..PublishConfig::default()
    };
    let publisher =
        ArtifactPublisher::new(config, store.clone() as Arc<dyn ObjectStore>, None);

    publisher
        .publish(JobId::new(), &entitlement(), &archive)
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !store.is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "cleanup never ran");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn http_store_puts_with_bearer_auth() {
    let server = MockServer::start_async().await;
    let put = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/artifacts/a/b.ipa")
                .header("authorization", "Bearer secret-token")
                .body("payload");
            then.status(200);
        })
        .await;

    let config = PublishConfig {
        endpoint: server.base_url(),
        token: Some("secret-token".to_string()),
        public_base: "https://cdn.example".to_string(),
        ..PublishConfig::default()
    };
    let store = HttpObjectStore::new(&config).unwrap();

    let url = store
        .put_bytes("a/b.ipa", b"payload".to_vec(), "application/octet-stream")
        .await
        .unwrap();

    put.assert_async().await;
    assert_eq!(url, "https://cdn.example/a/b.ipa");
}

#[tokio::test]
async fn http_store_delete_tolerates_missing_object() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/artifacts/gone.ipa");
            then.status(404);
        })
        .await;

    let config = PublishConfig {
        endpoint: server.base_url(),
        ..PublishConfig::default()
    };
    let store = HttpObjectStore::new(&config).unwrap();
    store.delete("gone.ipa").await.unwrap();
}
