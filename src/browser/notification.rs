//! Transient status notifications.

use std::time::{Duration, Instant};

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The action completed.
    Success,
    /// The action failed.
    Error,
    /// Neutral information.
    Info,
}

impl NotificationKind {
    /// Short tag used when rendering.
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::Success => "OK",
            NotificationKind::Error => "ERROR",
            NotificationKind::Info => "INFO",
        }
    }
}

/// A message shown to the user until it expires or is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Message text.
    pub message: String,
    /// Severity.
    pub kind: NotificationKind,
    /// When it was shown.
    pub shown_at: Instant,
}

/// Single-slot notification holder with auto-hide.
///
/// Showing a new notification replaces the current one.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    current: Option<Notification>,
    ttl: Duration,
}

impl NotificationCenter {
    /// Create a center whose notifications hide after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self { current: None, ttl }
    }

    /// Show a notification, replacing any current one.
    pub fn show(&mut self, message: impl Into<String>, kind: NotificationKind) {
        self.show_at(message, kind, Instant::now());
    }

    /// Show a notification as of `now`.
    pub fn show_at(&mut self, message: impl Into<String>, kind: NotificationKind, now: Instant) {
        self.current = Some(Notification {
            message: message.into(),
            kind,
            shown_at: now,
        });
    }

    /// The notification visible at `now`, if any.
    pub fn current(&self, now: Instant) -> Option<&Notification> {
        self.current
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.shown_at) < self.ttl)
    }

    /// The most recent notification, regardless of expiry.
    pub fn last(&self) -> Option<&Notification> {
        self.current.as_ref()
    }

    /// Hide the current notification.
    pub fn dismiss(&mut self) {
        self.current = None;
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}
