//! Transient user-visible notices.
//!
//! SYSTEM CONTEXT
//! ==============
//! The gateway and session report outcomes ("Post created", "Signed out",
//! server errors) through a [`Notifier`] instead of printing, so each front
//! end decides how a notice is shown.

#[cfg(test)]
#[path = "notify_test.rs"]
mod tests;

pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, text: text.into() }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => tracing::info!(notice = %notice.text, "success"),
            NoticeLevel::Error => tracing::warn!(notice = %notice.text, "error"),
        }
    }
}
