//! End-to-end scenarios for the import session, driven against an
//! `httpmock` server.
//!
//! These exercise the full `Session::pull` path including finalize, so they
//! require `qemu-img` on `PATH` (the probe step shells out to it for every
//! successful download, matching production deployments of the importer).
//! The COW-container scenario below swaps in a stand-in binary via
//! `RAWPULL_QEMU_IMG` instead, so it doesn't need a real one.

use httpmock::prelude::*;
use rawpull_config::core::ImportConfig;
use rawpull_import::Session;
use std::io::Write;
use std::sync::Mutex;

// Guards tests that override RAWPULL_QEMU_IMG so they don't race each other.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

fn xz_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Writes a stand-in `qemu-img` that reports every input as a qcow2
/// container and "converts" by copying the source bytes straight through.
/// `probe`/`convert` only care about exit status and the shape of `info`'s
/// JSON, so this is enough to exercise the conversion branch without a real
/// COW-container toolchain.
fn write_fake_qemu_img(dir: &std::path::Path) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("qemu-img");
    std::fs::write(
        &script,
        r#"#!/bin/sh
case "$1" in
  info)
    echo '{"format": "qcow2", "virtual-size": 1048576}'
    ;;
  convert)
    cp "$4" "$5"
    ;;
  *)
    exit 1
    ;;
esac
"#,
    )
    .unwrap();
    let mut perms = std::fs::metadata(&script).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&script, perms).unwrap();
    script
}

#[tokio::test]
async fn downloads_a_plain_raw_image() {
    let server = MockServer::start();
    let body = b"raw disk image bytes, not compressed, not a container".to_vec();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/disk.raw");
        then.status(200)
            .header("etag", "\"v1\"")
            .body(&body);
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    let url = server.url("/disk.raw");
    session.pull(url.clone(), None, false).await.unwrap();
    session.wait_idle().await.unwrap();

    mock.assert();
    let summary = session.summary();
    assert_eq!(summary.downloads_completed, 1);
    assert_eq!(summary.downloads_failed, 0);

    let cache_name = rawpull_fsutil::naming::cache_filename(&url, Some("\"v1\""));
    let cache_path = dir.path().join(&cache_name);
    assert_eq!(tokio::fs::read(&cache_path).await.unwrap(), body);
}

#[tokio::test]
async fn downloads_and_decompresses_an_xz_image() {
    let server = MockServer::start();
    let plaintext = b"the quick brown fox jumps over the lazy dog".repeat(200);
    let compressed = xz_compress(&plaintext);

    let mock = server.mock(|when, then| {
        when.method(GET).path("/disk.raw.xz");
        then.status(200).header("etag", "\"xz1\"").body(&compressed);
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    let url = server.url("/disk.raw.xz");
    session.pull(url.clone(), None, false).await.unwrap();
    session.wait_idle().await.unwrap();

    mock.assert();
    assert_eq!(session.summary().downloads_completed, 1);

    let cache_name = rawpull_fsutil::naming::cache_filename(&url, Some("\"xz1\""));
    let cache_path = dir.path().join(&cache_name);
    assert_eq!(tokio::fs::read(&cache_path).await.unwrap(), plaintext);
}

#[tokio::test]
async fn not_modified_short_circuits_without_rewriting_cache() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/disk.raw");
        then.status(304);
    });

    let dir = tempfile::tempdir().unwrap();
    let url = server.url("/disk.raw");
    let cache_name = rawpull_fsutil::naming::cache_filename(&url, None);
    tokio::fs::write(dir.path().join(&cache_name), b"already cached")
        .await
        .unwrap();

    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();
    session.pull(url, None, false).await.unwrap();
    session.wait_idle().await.unwrap();

    mock.assert();
    assert_eq!(session.summary().downloads_completed, 1);
    assert_eq!(
        tokio::fs::read(dir.path().join(&cache_name)).await.unwrap(),
        b"already cached"
    );
}

#[tokio::test]
async fn truncated_download_fails_and_leaves_no_cache_file() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/disk.raw");
        then.status(200)
            .header("content-length", "1000")
            .header("etag", "\"trunc\"")
            .body(b"short body");
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    let url = server.url("/disk.raw");
    session.pull(url.clone(), None, false).await.unwrap();
    let result = session.wait_idle().await;

    assert!(result.is_err());
    assert_eq!(session.summary().downloads_failed, 1);

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .collect();
    assert!(entries.is_empty(), "expected no leftover staging or cache files");
}

#[tokio::test]
async fn oversized_download_is_rejected_by_a_reduced_cap() {
    let server = MockServer::start();
    let body = vec![0u8; 4096];
    server.mock(|when, then| {
        when.method(GET).path("/disk.raw");
        then.status(200).header("etag", "\"big\"").body(&body);
    });

    let dir = tempfile::tempdir().unwrap();
    let mut config = ImportConfig::default();
    config.raw_max_size = 1024;

    let session = Session::create(dir.path().to_path_buf(), None, Some(config), None)
        .await
        .unwrap();

    let url = server.url("/disk.raw");
    session.pull(url, None, false).await.unwrap();
    let result = session.wait_idle().await;

    assert!(result.is_err());
    assert_eq!(session.summary().downloads_failed, 1);
}

#[tokio::test]
async fn two_distinct_urls_download_independently() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/a.raw");
        then.status(200).header("etag", "\"a\"").body(b"image a");
    });
    server.mock(|when, then| {
        when.method(GET).path("/b.raw");
        then.status(200).header("etag", "\"b\"").body(b"image b");
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    session.pull(server.url("/a.raw"), None, false).await.unwrap();
    session.pull(server.url("/b.raw"), None, false).await.unwrap();
    session.wait_idle().await.unwrap();

    assert_eq!(session.summary().downloads_completed, 2);
}

#[tokio::test]
async fn pull_rejects_duplicate_in_flight_url() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/disk.raw");
        then.status(200).header("etag", "\"v1\"").body(b"x");
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    let url = server.url("/disk.raw");
    session.pull(url.clone(), None, false).await.unwrap();
    let second = session.pull(url, None, false).await;
    assert!(second.is_err());

    session.wait_idle().await.unwrap();
}

#[tokio::test]
async fn materializes_a_named_writable_local_copy() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/disk.raw");
        then.status(200).header("etag", "\"v1\"").body(b"vm image bytes");
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    session
        .pull(server.url("/disk.raw"), Some("my-vm".to_string()), false)
        .await
        .unwrap();
    session.wait_idle().await.unwrap();

    let local_path = dir.path().join("my-vm.raw");
    assert_eq!(tokio::fs::read(&local_path).await.unwrap(), b"vm image bytes");
}

#[tokio::test]
async fn xz_wrapped_cow_container_is_converted_and_copied_local() {
    let _guard = ENV_TEST_MUTEX.lock().unwrap();

    let bin_dir = tempfile::tempdir().unwrap();
    let fake_qemu_img = write_fake_qemu_img(bin_dir.path());
    std::env::set_var("RAWPULL_QEMU_IMG", &fake_qemu_img);

    let server = MockServer::start();
    // Content doesn't need to be a real qcow2 image: the fake qemu-img
    // above reports every probed file as qcow2 regardless of content.
    let container_bytes = b"fake qcow2 container payload, opaque to this test".repeat(50);
    let compressed = xz_compress(&container_bytes);

    let mock = server.mock(|when, then| {
        when.method(GET).path("/vm1.qcow2.xz");
        then.status(200).header("etag", "\"cow1\"").body(&compressed);
    });

    let dir = tempfile::tempdir().unwrap();
    let session = Session::create(dir.path().to_path_buf(), None, None, None)
        .await
        .unwrap();

    let url = server.url("/vm1.qcow2.xz");
    let result = session
        .pull(url.clone(), Some("vm1".to_string()), true)
        .await;

    let outcome = result.and(session.wait_idle().await);
    std::env::remove_var("RAWPULL_QEMU_IMG");
    outcome.unwrap();

    mock.assert();
    assert_eq!(session.summary().downloads_completed, 1);
    assert_eq!(session.summary().downloads_failed, 0);

    let cache_name = rawpull_fsutil::naming::cache_filename(&url, Some("\"cow1\""));
    let cache_path = dir.path().join(&cache_name);
    assert_eq!(
        tokio::fs::read(&cache_path).await.unwrap(),
        container_bytes,
        "cache entry should hold the (fake-)converted raw bytes"
    );

    let local_path = dir.path().join("vm1.raw");
    assert_eq!(
        tokio::fs::read(&local_path).await.unwrap(),
        container_bytes,
        "force_local=true should materialize a writable copy alongside the cache entry"
    );
}
