//! Utilities to track the progression of a sync

use std::fmt::{Display, Error, Formatter};

/// An event that happens during a sync
#[derive(Clone, Debug)]
pub enum SyncEvent {
    /// Sync has not started
    NotStarted,
    /// Sync has just started but nothing is reconciled yet
    Started,
    /// Sync is in progress
    InProgress { details: String },
    /// Sync is finished
    Finished { success: bool },
}

impl Display for SyncEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        match self {
            SyncEvent::NotStarted => write!(f, "Not started"),
            SyncEvent::Started => write!(f, "Sync has started..."),
            SyncEvent::InProgress { details } => write!(f, "{}...", details),
            SyncEvent::Finished { success } => match success {
                true => write!(f, "Sync successfully finished"),
                false => write!(f, "Sync finished with errors"),
            }
        }
    }
}

impl Default for SyncEvent {
    fn default() -> Self {
        Self::NotStarted
    }
}

/// See [`feedback_channel`]
pub type FeedbackSender = tokio::sync::watch::Sender<SyncEvent>;
/// See [`feedback_channel`]
pub type FeedbackReceiver = tokio::sync::watch::Receiver<SyncEvent>;

/// Create a feedback channel, that can be used to retrieve the current progress of a sync operation
pub fn feedback_channel() -> (FeedbackSender, FeedbackReceiver) {
    tokio::sync::watch::channel(SyncEvent::default())
}

/// Tracks the progression of a sync, and collects the errors that happen during it.
///
/// Collected errors become [`SyncStatus::errors`](super::SyncStatus), in the
/// order they were recorded.
pub struct SyncProgress {
    errors: Vec<String>,
    feedback_channel: Option<FeedbackSender>,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self { errors: Vec::new(), feedback_channel: None }
    }
    pub fn new_with_feedback_channel(channel: FeedbackSender) -> Self {
        Self { errors: Vec::new(), feedback_channel: Some(channel) }
    }

    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Log an error and record it for the returned status
    pub fn error(&mut self, text: &str) {
        log::error!("{}", text);
        self.errors.push(text.to_string());
    }
    /// Log a warning. Warnings are not recorded into the status
    pub fn warn(&mut self, text: &str) {
        log::warn!("{}", text);
    }
    /// Log an info
    pub fn info(&mut self, text: &str) {
        log::info!("{}", text);
    }
    /// Log a debug message
    pub fn debug(&mut self, text: &str) {
        log::debug!("{}", text);
    }
    /// Log a trace message
    pub fn trace(&mut self, text: &str) {
        log::trace!("{}", text);
    }

    /// Send an event as a feedback to the listener (if any)
    pub fn feedback(&mut self, event: SyncEvent) {
        self.feedback_channel
            .as_ref()
            .map(|sender| {
                sender.send(event)
            });
    }

    /// Hand the recorded errors over, leaving this tracker empty
    pub fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self::new()
    }
}
