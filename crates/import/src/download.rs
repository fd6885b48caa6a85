//! The per-URL download state machine: *Fresh → Sniffing →
//! (ShortCircuitNotModified | Streaming) → Finalizing → Done*.
//!
//! Written as a single linear async routine rather than a callback chain:
//! Rust's structured concurrency collapses the states above into ordinary
//! control flow, while every invariant and transition they describe is still
//! exactly what this function does.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use rawpull_config::core::ImportConfig;
use rawpull_errors::{Error, ImportError, StorageError};
use rawpull_events::{
    AppEvent, DownloadEvent, EventSender, FailureContext, ProgressThrottle, SniffedFormat,
};
use rawpull_fsutil::{atomic_rename, chmod_readonly, cleanup, naming, nocow, provenance, tempname, timestamps};
use rawpull_fsutil::sparse::SparseWriter;
use rawpull_net::{begin_conditional_get, NetClient, ResponseMeta};

use crate::decompress::Decoder;
use crate::local_copy;
use crate::sniff;
use crate::staging::StagingGuard;

/// A single `pull` request as accepted by [`crate::Session::pull`].
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub local: Option<String>,
    pub force_local: bool,
}

/// The result of a completed (non-cancelled) download, used to populate the
/// completion events the owning session emits.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub url: String,
    pub final_size: u64,
    pub etag: Option<String>,
    pub cache_path: PathBuf,
    pub local_path: Option<PathBuf>,
}

/// Run a download to completion. Cancellation is external: the caller aborts
/// the `JoinHandle` this function runs under, which this routine has no way
/// to observe, but whose abort point always leaves a `Drop`-armed
/// [`StagingGuard`] (or no staging file at all) behind.
pub async fn run(
    client: NetClient,
    image_root: PathBuf,
    config: ImportConfig,
    events: Option<EventSender>,
    request: DownloadRequest,
) -> Result<DownloadOutcome, Error> {
    let url = request.url.clone();

    let old_etags = scan_old_etags(&image_root, &url).await?;
    let if_none_match = if old_etags.is_empty() {
        None
    } else {
        Some(old_etags.join(", "))
    };

    let response = begin_conditional_get(&client, &url, if_none_match.as_deref()).await?;
    let meta = ResponseMeta::from_response(&response);
    let status = response.status();

    emit(&events, AppEvent::Download(DownloadEvent::Started {
        url: url.clone(),
        cached_etag: old_etags.first().cloned(),
    }));

    let already_cached = meta
        .etag
        .as_ref()
        .is_some_and(|etag| old_etags.iter().any(|old| old == etag));

    if status == reqwest::StatusCode::NOT_MODIFIED || already_cached {
        let cache_path = naming::cache_filename(&url, meta.etag.as_deref());
        let cache_path = image_root.join(cache_path);
        let final_size = tokio::fs::metadata(&cache_path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);

        emit(&events, AppEvent::Download(DownloadEvent::NotModified {
            url: url.clone(),
            etag: meta.etag.clone(),
        }));

        let local_path = materialize_local_copy(&image_root, &cache_path, &request).await?;

        return Ok(DownloadOutcome {
            url,
            final_size,
            etag: meta.etag,
            cache_path,
            local_path,
        });
    }

    if !status.is_success() {
        return Err(rawpull_errors::NetworkError::HttpError {
            status: status.as_u16(),
            url: url.clone(),
            message: status.to_string(),
        }
        .into());
    }

    let mtime = meta
        .last_modified
        .as_deref()
        .and_then(parse_http_date);

    stream_and_finalize(
        &client,
        &image_root,
        &config,
        &events,
        request,
        response,
        meta,
        mtime,
    )
    .await
}

#[allow(clippy::too_many_arguments)]
async fn stream_and_finalize(
    _client: &NetClient,
    image_root: &Path,
    config: &ImportConfig,
    events: &Option<EventSender>,
    request: DownloadRequest,
    response: reqwest::Response,
    meta: ResponseMeta,
    mtime: Option<SystemTime>,
) -> Result<DownloadOutcome, Error> {
    let url = request.url.clone();
    let content_length = meta.content_length;

    let mut payload: Vec<u8> = Vec::new();
    let mut compressed = false;
    let mut classified = false;

    let mut written_compressed: u64 = 0;
    let mut written_uncompressed: u64 = 0;

    let mut writer: Option<SparseWriter> = None;
    let mut decoder: Option<Decoder> = None;
    let mut guard: Option<StagingGuard> = None;
    let mut temp_path: Option<PathBuf> = None;

    let mut progress = ProgressThrottle::new(content_length);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            rawpull_errors::NetworkError::DownloadFailed(format!("body stream error: {e}"))
        })?;

        written_compressed = written_compressed
            .checked_add(chunk.len() as u64)
            .ok_or_else(|| ImportError::Overflow {
                what: "written_compressed".to_string(),
            })?;
        if let Some(limit) = content_length {
            if written_compressed > limit {
                return Err(ImportError::TooLarge {
                    size: written_compressed,
                    limit,
                }
                .into());
            }
        }

        if !classified {
            payload.extend_from_slice(&chunk);
            if let Some(decision) = sniff::classify(&payload, false) {
                classified = true;
                compressed = decision;
                tracing::debug!(
                    "{url} sniffed as {}",
                    if compressed { "xz" } else { "raw" }
                );
                emit(
                    events,
                    AppEvent::Download(DownloadEvent::SniffedFormat {
                        url: url.clone(),
                        format: if compressed {
                            SniffedFormat::Xz
                        } else {
                            SniffedFormat::Raw
                        },
                    }),
                );

                if compressed {
                    decoder = Some(Decoder::new()?);
                }

                let (w, g, t) = open_for_write(image_root, config.sparse_alignment).await?;
                writer = Some(w);
                guard = Some(g);
                temp_path = Some(t);

                let pending = std::mem::take(&mut payload);
                write_chunk(
                    &pending,
                    compressed,
                    decoder.as_mut(),
                    writer.as_mut().expect("writer just opened"),
                    &mut written_uncompressed,
                    &config.raw_max_size,
                )
                .await?;
            }
        } else {
            write_chunk(
                &chunk,
                compressed,
                decoder.as_mut(),
                writer.as_mut().expect("writer opened once classified"),
                &mut written_uncompressed,
                &config.raw_max_size,
            )
            .await?;
        }

        if let Some(sample) = progress.sample(written_compressed) {
            emit(
                events,
                AppEvent::Download(DownloadEvent::Progress {
                    url: url.clone(),
                    bytes_written: written_compressed,
                    total_bytes: content_length,
                }),
            );
            emit(events, AppEvent::Progress(rawpull_events::ProgressEvent::from_sample(url.clone(), sample)));
        }
    }

    if !classified && !payload.is_empty() {
        // Stream ended before 6 bytes arrived, too short to ever be XZ;
        // resolve it definitively and flush the tiny payload as raw bytes.
        let decision = sniff::classify(&payload, true).unwrap_or(false);
        classified = true;
        compressed = decision;

        let (w, g, t) = open_for_write(image_root, config.sparse_alignment).await?;
        writer = Some(w);
        guard = Some(g);
        temp_path = Some(t);

        let pending = std::mem::take(&mut payload);
        write_chunk(
            &pending,
            compressed,
            decoder.as_mut(),
            writer.as_mut().expect("writer just opened"),
            &mut written_uncompressed,
            &config.raw_max_size,
        )
        .await?;
    }

    let Some(mut writer) = writer else {
        return Err(rawpull_errors::NetworkError::NoDataReceived { url }.into());
    };
    let temp_path = temp_path.expect("writer implies temp_path was set");
    let mut guard = guard.expect("writer implies guard was armed");

    if let Some(limit) = content_length {
        if written_compressed != limit {
            return Err(rawpull_errors::NetworkError::DownloadTruncated {
                declared: limit,
                received: written_compressed,
            }
            .into());
        }
    }

    // Drain any trailing decoder output the final `feed` call hasn't emitted
    // yet (the compressed path only flushes on new input; an empty final
    // flush call is a harmless no-op when there's nothing left to drain).
    if let Some(dec) = decoder.as_mut() {
        drain_decoder(dec, &mut writer, &mut written_uncompressed, config.raw_max_size).await?;
    }

    let file = writer.finish().await?;
    drop(file);

    let final_path = finalize(
        image_root,
        &temp_path,
        &url,
        meta.etag.as_deref(),
        mtime,
        &mut guard,
    )
    .await?;

    let final_size = tokio::fs::metadata(&final_path).await?.len();
    let local_path = materialize_local_copy(image_root, &final_path, &request).await?;

    Ok(DownloadOutcome {
        url,
        final_size,
        etag: meta.etag,
        cache_path: final_path,
        local_path,
    })
}

async fn open_for_write(
    image_root: &Path,
    sparse_alignment: u64,
) -> Result<(SparseWriter, StagingGuard, PathBuf), Error> {
    let temp_path = tempname::staging_path(image_root);

    let file = open_exclusive(&temp_path).await?;
    let _ = nocow::disable_cow(&temp_path);

    let guard = StagingGuard::new(temp_path.clone());
    let writer = SparseWriter::new(file, sparse_alignment);

    Ok((writer, guard, temp_path))
}

#[cfg(unix)]
async fn open_exclusive(path: &Path) -> Result<tokio::fs::File, Error> {
    tokio::fs::OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .mode(0o644)
        .open(path)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

#[cfg(not(unix))]
async fn open_exclusive(path: &Path) -> Result<tokio::fs::File, Error> {
    tokio::fs::OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .open(path)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))
}

/// The file's current permission bits, as a mask input for `chmod_readonly`.
#[cfg(unix)]
async fn current_mode(path: &Path) -> Result<u32, Error> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, path)))?;
    Ok(metadata.permissions().mode())
}

#[cfg(not(unix))]
async fn current_mode(_path: &Path) -> Result<u32, Error> {
    Ok(0)
}

async fn write_chunk(
    data: &[u8],
    compressed: bool,
    decoder: Option<&mut Decoder>,
    writer: &mut SparseWriter,
    written_uncompressed: &mut u64,
    max_size: &u64,
) -> Result<(), Error> {
    if !compressed {
        return write_uncompressed(data, writer, written_uncompressed, *max_size).await;
    }

    let decoder = decoder.expect("compressed path always has a decoder");
    let mut pending_err: Option<Error> = None;
    let mut chunks: Vec<Vec<u8>> = Vec::new();

    decoder.feed(data, |out| {
        chunks.push(out.to_vec());
        Ok(())
    })?;

    for chunk in chunks {
        if let Err(e) = write_uncompressed(&chunk, writer, written_uncompressed, *max_size).await {
            pending_err = Some(e);
            break;
        }
    }

    match pending_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn drain_decoder(
    decoder: &mut Decoder,
    writer: &mut SparseWriter,
    written_uncompressed: &mut u64,
    max_size: u64,
) -> Result<(), Error> {
    let mut chunks: Vec<Vec<u8>> = Vec::new();
    decoder.feed(&[], |out| {
        chunks.push(out.to_vec());
        Ok(())
    })?;
    for chunk in chunks {
        write_uncompressed(&chunk, writer, written_uncompressed, max_size).await?;
    }
    Ok(())
}

async fn write_uncompressed(
    data: &[u8],
    writer: &mut SparseWriter,
    written_uncompressed: &mut u64,
    max_size: u64,
) -> Result<(), Error> {
    let next = written_uncompressed
        .checked_add(data.len() as u64)
        .ok_or_else(|| ImportError::Overflow {
            what: "written_uncompressed".to_string(),
        })?;
    if next > max_size {
        return Err(ImportError::TooLarge {
            size: next,
            limit: max_size,
        }
        .into());
    }
    writer.write_all(data).await?;
    *written_uncompressed = next;
    Ok(())
}

async fn finalize(
    image_root: &Path,
    temp_path: &Path,
    url: &str,
    etag: Option<&str>,
    mtime: Option<SystemTime>,
    guard: &mut StagingGuard,
) -> Result<PathBuf, Error> {
    let mut working_path = temp_path.to_path_buf();

    if rawpull_convert::probe(&working_path).await? {
        tracing::info!("{url} is a COW container, converting to raw");
        let converted_path = tempname::staging_path(image_root);
        rawpull_convert::convert(&working_path, &converted_path).await?;
        let _ = tokio::fs::remove_file(&working_path).await;
        working_path = converted_path;
        guard.disarm();
        *guard = StagingGuard::new(working_path.clone());
    }

    if provenance::tag_source(&working_path, url, etag).is_err() {
        tracing::warn!("failed to tag provenance xattrs on {}", working_path.display());
    }

    if let Some(mtime) = mtime {
        if timestamps::set_mtime(&working_path, mtime).is_err() {
            tracing::warn!("failed to set mtime on {}", working_path.display());
        }
    }

    let existing_mode = current_mode(&working_path).await?;
    chmod_readonly(
        &working_path,
        existing_mode & rawpull_config::fixed::CACHE_FILE_MODE,
    )
    .await?;

    let final_name = naming::cache_filename(url, etag);
    let final_path = image_root.join(final_name);
    atomic_rename(&working_path, &final_path).await?;
    guard.disarm();

    Ok(final_path)
}

async fn materialize_local_copy(
    image_root: &Path,
    cache_path: &Path,
    request: &DownloadRequest,
) -> Result<Option<PathBuf>, Error> {
    match &request.local {
        Some(local) => {
            let path =
                local_copy::materialize(image_root, cache_path, local, request.force_local)
                    .await?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

async fn scan_old_etags(image_root: &Path, url: &str) -> Result<Vec<String>, Error> {
    let mut entries = match tokio::fs::read_dir(image_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::from(StorageError::from_io_with_path(&e, image_root))),
    };

    let mut etags = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, image_root)))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some((entry_url, Some(etag))) = naming::parse_cache_filename(name) {
            if entry_url == url {
                etags.push(etag);
            }
        }
    }
    Ok(etags)
}

fn parse_http_date(value: &str) -> Option<SystemTime> {
    let parsed: DateTime<Utc> = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let seconds = parsed.timestamp();
    if seconds < 0 {
        return None;
    }
    #[allow(clippy::cast_sign_loss)]
    Some(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(seconds as u64))
}

fn emit(events: &Option<EventSender>, event: AppEvent) {
    if let Some(sender) = events {
        let _ = sender.send(event);
    }
}

/// Best-effort cleanup of a download's staging artifacts, used when a
/// download is cancelled or its session is dropped before completion.
pub async fn remove_staging(image_root: &Path, url: &str) -> Result<(), Error> {
    let mut entries = match tokio::fs::read_dir(image_root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::from(StorageError::from_io_with_path(&e, image_root))),
    };
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::from(StorageError::from_io_with_path(&e, image_root)))?
    {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(".rawpull-tmp-") {
            let _ = cleanup::remove_staging(&entry.path()).await;
        }
    }
    let _ = url;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc2822_http_date() {
        let parsed = parse_http_date("Tue, 15 Nov 1994 08:12:31 GMT").unwrap();
        let secs = parsed.duration_since(SystemTime::UNIX_EPOCH).unwrap().as_secs();
        assert_eq!(secs, 784_887_151);
    }

    #[test]
    fn rejects_malformed_http_date() {
        assert!(parse_http_date("not a date").is_none());
    }

    #[tokio::test]
    async fn scan_old_etags_finds_only_matching_url() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://example.com/disk.raw.xz";
        let other_url = "https://example.com/other.raw.xz";

        let name_a = naming::cache_filename(url, Some("v1"));
        let name_b = naming::cache_filename(url, Some("v2"));
        let name_other = naming::cache_filename(other_url, Some("v1"));

        tokio::fs::write(dir.path().join(&name_a), b"x").await.unwrap();
        tokio::fs::write(dir.path().join(&name_b), b"x").await.unwrap();
        tokio::fs::write(dir.path().join(&name_other), b"x").await.unwrap();

        let mut etags = scan_old_etags(dir.path(), url).await.unwrap();
        etags.sort();
        assert_eq!(etags, vec!["v1".to_string(), "v2".to_string()]);
    }

    #[tokio::test]
    async fn scan_old_etags_on_missing_root_returns_empty() {
        let etags = scan_old_etags(Path::new("/nonexistent/rawpull-scan-test"), "u")
            .await
            .unwrap();
        assert!(etags.is_empty());
    }
}
