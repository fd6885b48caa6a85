//! The import session: the process-wide coordinator that owns the HTTP
//! client, the image root, and the set of in-flight downloads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rawpull_config::core::ImportConfig;
use rawpull_errors::{Error, ImportError};
use rawpull_events::{AppEvent, EventEmitter, EventSender, FailureContext, ImportEvent};
use rawpull_fsutil::ensure_dir;
use rawpull_net::NetClient;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::download::{self, DownloadRequest};
use crate::validate::{validate_local_name, validate_url};

/// Summary handed to a session's completion observers once every tracked
/// download has reached a terminal state.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub downloads_completed: usize,
    pub downloads_failed: usize,
}

struct Inner {
    session_id: String,
    image_root: PathBuf,
    client: NetClient,
    config: ImportConfig,
    events: Option<EventSender>,
    downloads: Mutex<HashMap<String, JoinHandle<()>>>,
    completed: AtomicUsize,
    failed: AtomicUsize,
    finished: AtomicBool,
    idle: Notify,
    first_error: Mutex<Option<Error>>,
}

/// Coordinates a batch of concurrent image downloads rooted at one
/// `image_root`. Cloning a `Session` shares the same underlying state; the
/// last clone's drop cancels any download still in flight.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Create a session rooted at `image_root`, creating the directory if it
    /// doesn't already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if `image_root` can't be created, or if no `client`
    /// is supplied and the default HTTP client can't be built.
    pub async fn create(
        image_root: impl Into<PathBuf>,
        client: Option<NetClient>,
        config: Option<ImportConfig>,
        events: Option<EventSender>,
    ) -> Result<Self, Error> {
        let image_root = image_root.into();
        ensure_dir(&image_root).await?;

        let client = match client {
            Some(client) => client,
            None => NetClient::with_defaults()?,
        };

        let session_id = Uuid::new_v4().to_string();
        let inner = Arc::new(Inner {
            session_id: session_id.clone(),
            image_root: image_root.clone(),
            client,
            config: config.unwrap_or_default(),
            events,
            downloads: Mutex::new(HashMap::new()),
            completed: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
            idle: Notify::new(),
            first_error: Mutex::new(None),
        });

        tracing::info!("session {session_id} started at {}", image_root.display());
        inner.emit(AppEvent::Import(ImportEvent::SessionStarted {
            session_id,
            image_root: image_root.display().to_string(),
        }));

        Ok(Self { inner })
    }

    #[must_use]
    pub fn image_root(&self) -> &Path {
        &self.inner.image_root
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    /// Begin downloading `url`, optionally materializing a writable copy
    /// named `local` once it's cached.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::InvalidArgument`] if `url` or `local` fail
    /// validation, or [`ImportError::AlreadyInProgress`] if `url` is already
    /// being downloaded by this session.
    pub async fn pull(
        &self,
        url: impl Into<String>,
        local: Option<String>,
        force_local: bool,
    ) -> Result<(), Error> {
        let url = url.into();
        validate_url(&url)?;
        if let Some(local) = &local {
            validate_local_name(local)?;
        }

        let mut downloads = self.inner.downloads.lock().await;
        if downloads.contains_key(&url) {
            tracing::warn!("rejected pull for {url}: already in progress");
            self.inner.emit(AppEvent::Import(ImportEvent::DownloadRejected {
                session_id: self.inner.session_id.clone(),
                url: url.clone(),
                reason: "already in progress".to_string(),
            }));
            return Err(ImportError::AlreadyInProgress { url }.into());
        }

        let request = DownloadRequest {
            url: url.clone(),
            local,
            force_local,
        };

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(run_and_report(inner, request));
        downloads.insert(url.clone(), handle);
        drop(downloads);

        self.inner.emit(AppEvent::Import(ImportEvent::DownloadBegun {
            session_id: self.inner.session_id.clone(),
            url,
        }));

        Ok(())
    }

    /// Cancel an in-flight download. Returns `true` if one was found and
    /// cancelled, `false` if `url` wasn't being tracked.
    pub async fn cancel(&self, url: &str) -> bool {
        let handle = self.inner.downloads.lock().await.remove(url);
        match handle {
            Some(handle) => {
                handle.abort();
                tracing::info!("cancelled download for {url}");
                self.inner.emit(AppEvent::Import(ImportEvent::DownloadCancelled {
                    session_id: self.inner.session_id.clone(),
                    url: url.to_string(),
                }));
                self.inner.maybe_finish().await;
                true
            }
            None => false,
        }
    }

    /// Wait until every tracked download has reached a terminal state.
    /// Returns the first error observed across all downloads, if any.
    pub async fn wait_idle(&self) -> Result<(), Error> {
        loop {
            if self.inner.downloads.lock().await.is_empty() {
                break;
            }
            self.inner.idle.notified().await;
        }
        let error = self.inner.first_error.lock().await.clone();
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            downloads_completed: self.inner.completed.load(Ordering::Relaxed),
            downloads_failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = &self.events {
            sender.emit(event);
        }
    }

    async fn maybe_finish(&self) {
        if self.downloads.lock().await.is_empty() && !self.finished.swap(true, Ordering::SeqCst) {
            let summary = SessionSummary {
                downloads_completed: self.completed.load(Ordering::Relaxed),
                downloads_failed: self.failed.load(Ordering::Relaxed),
            };
            self.emit(AppEvent::Import(ImportEvent::SessionCompleted {
                session_id: self.session_id.clone(),
                downloads_completed: summary.downloads_completed,
                downloads_failed: summary.downloads_failed,
            }));
            self.idle.notify_waiters();
        } else {
            // Not globally idle yet, but wake any waiter so it can re-check
            // (e.g. after a cancellation that didn't finish the session).
            self.idle.notify_waiters();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // Only the last handle matters: if other clones are still alive,
        // leave their downloads running.
        if Arc::strong_count(&self.inner) > 1 {
            return;
        }
        if let Ok(mut downloads) = self.inner.downloads.try_lock() {
            for (_, handle) in downloads.drain() {
                handle.abort();
            }
        }
    }
}

async fn run_and_report(inner: Arc<Inner>, request: DownloadRequest) {
    let url = request.url.clone();
    let result = download::run(
        inner.client.clone(),
        inner.image_root.clone(),
        inner.config.clone(),
        inner.events.clone(),
        request,
    )
    .await;

    match result {
        Ok(outcome) => {
            inner.completed.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                "download finalized for {}: {}",
                outcome.url,
                outcome.cache_path.display()
            );
            inner.emit(AppEvent::Import(ImportEvent::DownloadFinalized {
                session_id: inner.session_id.clone(),
                url: outcome.url.clone(),
                cache_path: outcome.cache_path.display().to_string(),
            }));
            if let Some(local_path) = &outcome.local_path {
                inner.emit(AppEvent::Import(ImportEvent::LocalCopyMaterialized {
                    session_id: inner.session_id.clone(),
                    url: outcome.url,
                    local_path: local_path.display().to_string(),
                }));
            }
        }
        Err(error) => {
            inner.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!("download failed for {url}: {error}");
            let failure = FailureContext::new(error.to_string(), false);
            inner.emit(AppEvent::Import(ImportEvent::DownloadFailed {
                session_id: inner.session_id.clone(),
                url: url.clone(),
                failure,
            }));
            let _ = download::remove_staging(&inner.image_root, &url).await;

            let mut first_error = inner.first_error.lock().await;
            if first_error.is_none() {
                *first_error = Some(error);
            }
        }
    }

    inner.downloads.lock().await.remove(&url);
    inner.maybe_finish().await;
}
