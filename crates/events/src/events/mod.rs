use serde::{Deserialize, Serialize};

// Declare all domain modules
pub mod download;
pub mod general;
pub mod import;
pub mod progress;

// Re-export all domain events
pub use download::*;
pub use general::*;
pub use import::*;
pub use progress::*;

/// Structured detail attached to `*Failed` events so consumers don't have to
/// re-parse a formatted error string to get at the retryability/hint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub message: String,
    pub code: Option<String>,
    pub retryable: bool,
}

impl FailureContext {
    #[must_use]
    pub fn new(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable,
        }
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Download-specific events (HTTP transport, sniffing, writing)
    Download(DownloadEvent),

    /// Import session lifecycle events (begin, cancel, completion)
    Import(ImportEvent),

    /// Progress tracking events (throttled percent/ETA updates)
    Progress(ProgressEvent),
}

impl AppEvent {
    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            AppEvent::General(GeneralEvent::Error { .. }) => Level::ERROR,
            AppEvent::Download(DownloadEvent::Failed { .. }) => Level::ERROR,
            AppEvent::Import(ImportEvent::SessionFailed { .. } | ImportEvent::DownloadFailed { .. }) => {
                Level::ERROR
            }
            AppEvent::Progress(ProgressEvent::Failed { .. }) => Level::ERROR,

            AppEvent::General(GeneralEvent::Warning { .. }) => Level::WARN,
            AppEvent::Download(DownloadEvent::Stalled { .. }) => Level::WARN,

            AppEvent::Download(DownloadEvent::Completed { .. } | DownloadEvent::NotModified { .. }) => {
                Level::INFO
            }
            AppEvent::Import(
                ImportEvent::SessionStarted { .. }
                | ImportEvent::SessionCompleted { .. }
                | ImportEvent::DownloadBegun { .. }
                | ImportEvent::DownloadFinalized { .. },
            ) => Level::INFO,
            AppEvent::Progress(ProgressEvent::Completed { .. }) => Level::INFO,

            AppEvent::General(GeneralEvent::DebugLog { .. }) => Level::DEBUG,
            AppEvent::Download(DownloadEvent::Progress { .. } | DownloadEvent::SniffedFormat { .. }) => {
                Level::DEBUG
            }
            AppEvent::Progress(ProgressEvent::Updated { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            AppEvent::General(_) => "rawpull::events::general",
            AppEvent::Download(_) => "rawpull::events::download",
            AppEvent::Import(_) => "rawpull::events::import",
            AppEvent::Progress(_) => "rawpull::events::progress",
        }
    }

    /// Structured fields for logging, currently just a debug rendering.
    #[must_use]
    pub fn log_fields(&self) -> String {
        format!("{self:?}")
    }
}
