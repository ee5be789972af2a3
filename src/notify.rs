//! # Notification Side-Channel
//!
//! The executor never renders anything itself. Every validation failure,
//! provider failure and successful run is pushed as one [`Notification`] to a
//! [`Notifier`], which decides how to display it.
//!
//! Three notifiers ship with the crate:
//!
//! - [`TracingNotifier`]: forwards to `tracing`, the default for headless use
//! - [`ChannelNotifier`]: forwards into a tokio channel for a UI task to drain
//! - [`MemoryNotifier`]: records notifications, mostly for tests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

/// How a notification should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Error,
}

/// One user-visible event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    /// Create a notification stamped with the current time
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    /// Informational notification
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Info, title, description)
    }

    /// Error notification
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Severity::Error, title, description)
    }

    /// Check whether this is an error notification
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Receives notifications produced during a run.
///
/// `notify` is called from inside the run and must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs notifications through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notification: Notification) {
        match notification.severity {
            Severity::Info => tracing::info!(
                title = %notification.title,
                "{}",
                notification.description
            ),
            Severity::Error => tracing::error!(
                title = %notification.title,
                "{}",
                notification.description
            ),
        }
    }
}

/// Sends notifications into an unbounded tokio channel.
///
/// Notifications sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.sender.send(notification).is_err() {
            tracing::debug!("notification receiver dropped");
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notifications: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far, oldest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Only the error notifications
    pub fn errors(&self) -> Vec<Notification> {
        self.lock()
            .iter()
            .filter(|n| n.is_error())
            .cloned()
            .collect()
    }

    /// Number of notifications received
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forget everything received so far
    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the Vec half-written.
    fn lock(&self) -> MutexGuard<'_, Vec<Notification>> {
        self.notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) {
        self.lock().push(notification);
    }
}
