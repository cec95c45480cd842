//! Failures while the controller handles a single message, and where they go.
//!
//! A failed message never unwinds the controller thread. It is turned into
//! an [`EventError`] and handed to an [`ErrorReporter`]; only a fatal error
//! changes the session state.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The message is dropped and the session keeps running.
    Recoverable(String),
    /// The session moves to `Stopping` and drains.
    Fatal(String),
}

impl EventError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, EventError::Fatal(_))
    }

    pub fn message(&self) -> &str {
        match self {
            EventError::Recoverable(msg) | EventError::Fatal(msg) => msg,
        }
    }
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventError::Recoverable(msg) => write!(f, "event dropped: {msg}"),
            EventError::Fatal(msg) => write!(f, "session aborted: {msg}"),
        }
    }
}

impl std::error::Error for EventError {}

/// Sink for per-message failures. `component` names the collaborator or
/// stage the failure came from (`controller`, `recognizer`, `calibration`).
pub trait ErrorReporter: Send + Sync {
    fn report(&self, component: &str, error: &EventError);
}

/// Logs recoverable errors at `warn` and fatal ones at `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, component: &str, error: &EventError) {
        if error.is_fatal() {
            tracing::error!(component, "session aborted: {}", error.message());
        } else {
            tracing::warn!(component, "{}", error.message());
        }
    }
}
