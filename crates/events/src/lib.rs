#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Event system for async communication inside the raw disk-image importer
//!
//! All output goes through events: no direct logging or printing is allowed
//! outside the `Internal error` boundary. Events are grouped by domain
//! (general, download, import, progress) under a single [`AppEvent`]
//! aggregate and a unified [`EventEmitter`] trait.
//!
//! ## Architecture
//!
//! - **Domain-driven events**: grouped by functional domain.
//! - **Unified `EventEmitter` trait**: single, consistent API for emission.
//! - **Tracing integration**: built-in structured logging via [`AppEvent::log_level`].
//! - **Throttled progress**: see [`ProgressThrottle`] for the 1s/percent-change gate.

pub mod meta;
pub use meta::{EventLevel, EventMeta, EventSource};

pub mod progress;
pub use progress::{ProgressSample, ProgressThrottle};

pub mod events;
pub use events::{
    AppEvent, DownloadEvent, FailureContext, GeneralEvent, ImportEvent, ProgressEvent,
    SniffedFormat,
};

use tokio::sync::mpsc::UnboundedSender;

/// Type alias for event sender using the `AppEvent` system
pub type EventSender = UnboundedSender<AppEvent>;

/// Type alias for event receiver using the `AppEvent` system
pub type EventReceiver = tokio::sync::mpsc::UnboundedReceiver<AppEvent>;

/// Create a new event channel
#[must_use]
pub fn channel() -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::unbounded_channel()
}

/// The unified trait for emitting events throughout the importer
///
/// This trait provides a single, consistent API for emitting events regardless of
/// whether you have a raw `EventSender` or a struct that contains one.
pub trait EventEmitter {
    /// Get the event sender for this emitter
    fn event_sender(&self) -> Option<&EventSender>;

    /// Emit an event through this emitter
    fn emit(&self, event: AppEvent) {
        if let Some(sender) = self.event_sender() {
            // Ignore send errors - if receiver is dropped, we just continue
            let _ = sender.send(event);
        }
    }

    /// Emit a debug log event
    fn emit_debug(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::debug(message)));
    }

    /// Emit a debug log event with context
    fn emit_debug_with_context(
        &self,
        message: impl Into<String>,
        context: std::collections::HashMap<String, String>,
    ) {
        self.emit(AppEvent::General(GeneralEvent::debug_with_context(
            message, context,
        )));
    }

    /// Emit a warning event
    fn emit_warning(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning(message)));
    }

    /// Emit a warning event with context
    fn emit_warning_with_context(&self, message: impl Into<String>, context: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::warning_with_context(
            message, context,
        )));
    }

    /// Emit an error event
    fn emit_error(&self, message: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error(message)));
    }

    /// Emit an error event with details
    fn emit_error_with_details(&self, message: impl Into<String>, details: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::error_with_details(
            message, details,
        )));
    }

    /// Emit an operation started event
    fn emit_operation_started(&self, operation: impl Into<String>) {
        self.emit(AppEvent::General(GeneralEvent::OperationStarted {
            operation: operation.into(),
        }));
    }

    /// Emit an operation completed event
    fn emit_operation_completed(&self, operation: impl Into<String>, success: bool) {
        self.emit(AppEvent::General(GeneralEvent::OperationCompleted {
            operation: operation.into(),
            success,
        }));
    }

    /// Emit a download started event
    fn emit_download_started(&self, url: impl Into<String>, cached_etag: Option<String>) {
        self.emit(AppEvent::Download(DownloadEvent::Started {
            url: url.into(),
            cached_etag,
        }));
    }

    /// Emit a download completed event
    fn emit_download_completed(&self, url: impl Into<String>, final_size: u64, etag: Option<String>) {
        self.emit(AppEvent::Download(DownloadEvent::Completed {
            url: url.into(),
            final_size,
            etag,
        }));
    }

    /// Emit a download failed event
    fn emit_download_failed(&self, url: impl Into<String>, failure: FailureContext) {
        self.emit(AppEvent::Download(DownloadEvent::Failed {
            url: url.into(),
            failure,
        }));
    }

    /// Emit a progress started event
    fn emit_progress_started(&self, id: impl Into<String>, total: Option<u64>) {
        self.emit(AppEvent::Progress(ProgressEvent::started(id, total)));
    }

    /// Emit a throttled progress sample
    fn emit_progress_sample(&self, id: impl Into<String>, sample: ProgressSample) {
        self.emit(AppEvent::Progress(ProgressEvent::from_sample(id, sample)));
    }

    /// Emit a progress completed event
    fn emit_progress_completed(&self, id: impl Into<String>, total_processed: u64) {
        self.emit(AppEvent::Progress(ProgressEvent::completed(
            id,
            total_processed,
        )));
    }

    /// Emit a progress failed event
    fn emit_progress_failed(
        &self,
        id: impl Into<String>,
        failure: FailureContext,
        completed_items: u64,
    ) {
        self.emit(AppEvent::Progress(ProgressEvent::failed(
            id,
            failure,
            completed_items,
        )));
    }
}

/// Implementation of `EventEmitter` for the raw `EventSender`
/// This allows `EventSender` to be used directly where `EventEmitter` is expected
impl EventEmitter for EventSender {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(self)
    }
}
