//! End-to-end job pipeline tests against a mock storefront

use httpmock::prelude::*;
use ipaforge_config::Config;
use ipaforge_jobs::{JobManager, JobRequest};
use ipaforge_publish::{MemoryObjectStore, ObjectStore};
use ipaforge_types::{Credentials, JobStatus, PackageRequest};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const AUTH_OK: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>dsPersonId</key><integer>12345</integer>
    <key>passwordToken</key><string>token-abc</string>
</dict>
</plist>"#;

const AUTH_BAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>customerMessage</key><string>Your account name or password was entered incorrectly.</string>
</dict>
</plist>"#;

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>SinfPaths</key>
    <array><string>SC_Info/Demo.sinf</string></array>
</dict>
</plist>"#;

/// Entitlement response whose download URL points back at the mock
/// server. The sinf data is base64 of b"sinf-bytes-0".
fn entitlement_body(download_url: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>songList</key>
    <array>
        <dict>
            <key>URL</key><string>{download_url}</string>
            <key>sinfs</key>
            <array>
                <dict>
                    <key>id</key><integer>0</integer>
                    <key>sinf</key><data>c2luZi1ieXRlcy0w</data>
                </dict>
            </array>
            <key>metadata</key>
            <dict>
                <key>itemName</key><string>Demo</string>
                <key>bundleShortVersionString</key><string>1.0</string>
                <key>softwareVersionBundleId</key><string>com.example.demo</string>
            </dict>
        </dict>
    </array>
</dict>
</plist>"#
    )
}

fn fixture_ipa() -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("Payload/Demo.app/Info.plist", options).unwrap();
    zip.write_all(b"<plist/>").unwrap();
    zip.start_file("Payload/Demo.app/SC_Info/Manifest.plist", options)
        .unwrap();
    zip.write_all(MANIFEST.as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

fn test_config(server: &MockServer, work_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.store.auth_url = server.url("/authenticate");
    config.store.entitlement_url = server.url("/buyProduct");
    config.store.device_seed = Some("test-device".to_string());
    config.download.retries = 2;
    config.download.retry_delay_secs = 0;
    config.jobs.poll_interval_ms = 50;
    config.jobs.heartbeat_interval_ms = 25;
    config.jobs.work_dir = work_dir.to_path_buf();
    config
}

fn request() -> JobRequest {
    JobRequest {
        credentials: Credentials::new("user@example.com", "pw"),
        package: PackageRequest::new("321"),
    }
}

/// Storefront plus package mocks for a job that can run to completion.
fn mock_happy_path(server: &MockServer, ipa: &[u8]) {
    server.mock(|when, then| {
        when.method(POST).path("/authenticate");
        then.status(200).body(AUTH_OK);
    });
    let download_url = server.url("/pkg.ipa");
    server.mock(|when, then| {
        when.method(POST).path("/buyProduct");
        then.status(200).body(entitlement_body(&download_url));
    });
    server.mock(|when, then| {
        when.method(GET).path("/pkg.ipa").header("range", "bytes=0-0");
        then.status(206)
            .header("content-range", format!("bytes 0-0/{}", ipa.len()))
            .body(&ipa[0..1]);
    });
    let last = ipa.len() - 1;
    server.mock(|when, then| {
        when.method(GET)
            .path("/pkg.ipa")
            .header("range", format!("bytes=0-{last}"));
        then.status(206)
            .header("content-range", format!("bytes 0-{last}/{}", ipa.len()))
            .body(ipa);
    });
}

async fn collect_until_terminal(
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<ipaforge_types::JobSnapshot>,
) -> Vec<ipaforge_types::JobSnapshot> {
    let mut snapshots = Vec::new();
    while let Some(snapshot) = rx.recv().await {
        let terminal = snapshot.status.is_terminal();
        snapshots.push(snapshot);
        if terminal {
            break;
        }
    }
    snapshots
}

#[tokio::test]
async fn pipeline_runs_to_completion() {
    let server = MockServer::start_async().await;
    let ipa = fixture_ipa();
    mock_happy_path(&server, &ipa);

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(MemoryObjectStore::new());
    let manager = JobManager::new(
        test_config(&server, dir.path()),
        store.clone() as Arc<dyn ObjectStore>,
        None,
    );

    let id = manager.start(request()).unwrap();
    let mut rx = manager.subscribe(id).unwrap();
    let snapshots = collect_until_terminal(&mut rx).await;

    let last = snapshots.last().unwrap();
    assert_eq!(last.status, JobStatus::Complete);
    assert_eq!(last.percent, 100);
    let result = last.result.as_ref().unwrap();
    assert!(result
        .install_uri
        .starts_with("itms-services://?action=download-manifest&url="));
    assert!(result.size > 0);

    // signed archive plus installation manifest
    assert_eq!(store.len(), 2);

    // record is gone once the terminal snapshot was delivered
    assert!(manager.status(id).is_err());
}

#[tokio::test]
async fn progress_is_monotone() {
    let server = MockServer::start_async().await;
    let ipa = fixture_ipa();
    mock_happy_path(&server, &ipa);

    let dir = tempfile::tempdir().unwrap();
    let manager = JobManager::new(
        test_config(&server, dir.path()),
        Arc::new(MemoryObjectStore::new()),
        None,
    );

    let id = manager.start(request()).unwrap();
    let mut rx = manager.subscribe(id).unwrap();
    let snapshots = collect_until_terminal(&mut rx).await;

    for pair in snapshots.windows(2) {
        assert!(pair[1].percent >= pair[0].percent, "percent went backwards");
    }
}

#[tokio::test]
async fn auth_failure_surfaces_stable_code() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/authenticate");
        then.status(200).body(AUTH_BAD);
    });

    let dir = tempfile::tempdir().unwrap();
    let manager = JobManager::new(
        test_config(&server, dir.path()),
        Arc::new(MemoryObjectStore::new()),
        None,
    );

    let id = manager.start(request()).unwrap();
    let mut rx = manager.subscribe(id).unwrap();
    let snapshots = collect_until_terminal(&mut rx).await;

    let last = snapshots.last().unwrap();
    assert_eq!(last.status, JobStatus::Error);
    assert_eq!(last.error.as_ref().unwrap().code, "AUTH_FAILED");
}

#[tokio::test]
async fn admission_rejects_over_ceiling_and_releases_slots() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/authenticate");
        then.status(200)
            .body(AUTH_OK)
            .delay(Duration::from_secs(2));
    });

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.jobs.max_active = 1;
    let manager = JobManager::new(config, Arc::new(MemoryObjectStore::new()), None);

    let first = manager.start(request()).unwrap();
    let err = manager.start(request()).unwrap_err();
    assert_eq!(err.code(), "TOO_BUSY");

    manager.cancel(first).unwrap();
    let mut rx = manager.subscribe(first).unwrap();
    let snapshots = collect_until_terminal(&mut rx).await;
    assert_eq!(
        snapshots.last().unwrap().error.as_ref().unwrap().code,
        "CANCELLED"
    );

    // terminal exit released the slot
    manager.start(request()).unwrap();
}

#[tokio::test]
async fn cancellation_records_terminal_error_once() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/authenticate");
        then.status(200)
            .body(AUTH_OK)
            .delay(Duration::from_millis(500));
    });

    let dir = tempfile::tempdir().unwrap();
    let manager = JobManager::new(
        test_config(&server, dir.path()),
        Arc::new(MemoryObjectStore::new()),
        None,
    );

    let id = manager.start(request()).unwrap();
    manager.cancel(id).unwrap();

    let mut rx = manager.subscribe(id).unwrap();
    let snapshots = collect_until_terminal(&mut rx).await;
    let terminal: Vec<_> = snapshots
        .iter()
        .filter(|s| s.status.is_terminal())
        .collect();
    assert_eq!(terminal.len(), 1);
    assert_eq!(terminal[0].error.as_ref().unwrap().code, "CANCELLED");
}

#[tokio::test]
async fn sweep_reaps_stale_jobs_and_frees_their_slot() {
    let server = MockServer::start_async().await;
    server.mock(|when, then| {
        when.method(POST).path("/authenticate");
        then.status(200)
            .body(AUTH_OK)
            .delay(Duration::from_secs(5));
    });

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&server, dir.path());
    config.jobs.max_active = 1;
    config.jobs.job_ttl_secs = 0;
    let manager = JobManager::new(config, Arc::new(MemoryObjectStore::new()), None);

    let id = manager.start(request()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.sweep_now();

    let err = manager.status(id).unwrap_err();
    assert_eq!(err.code(), "JOB_NOT_FOUND");

    // the reaped job gave its slot back
    manager.start(request()).unwrap();
}

#[tokio::test]
async fn subscribing_to_unknown_job_fails() {
    let server = MockServer::start_async().await;
    let dir = tempfile::tempdir().unwrap();
    let manager = JobManager::new(
        test_config(&server, dir.path()),
        Arc::new(MemoryObjectStore::new()),
        None,
    );

    let err = manager.subscribe(ipaforge_types::JobId::new()).unwrap_err();
    assert_eq!(err.code(), "JOB_NOT_FOUND");
}
