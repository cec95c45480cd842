//! Data types flowing through the dubbing pipeline.

use std::fmt;
use std::time::{Duration, Instant};

/// An event from the recognizer.
///
/// `Partial` and `Final` carry the cumulative translation of the current
/// utterance, not a delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslationEvent {
    Partial(String),
    Final(String),
    SessionEnded,
}

/// A newly stabilized span of a partial translation, ready to be spoken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableChunk {
    /// The not-yet-emitted part of the stabilized prefix.
    pub text: String,
    /// Length of the whole stabilized prefix, in characters.
    pub stable_len: usize,
}

/// Whether the text already spoken from partials agrees with the final translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Ok,
    Mismatch,
}

impl fmt::Display for Consistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consistency::Ok => write!(f, "OK"),
            Consistency::Mismatch => write!(f, "MISMATCH"),
        }
    }
}

/// Text the emission tracker wants sent to synthesis. May be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchDecision {
    pub text: String,
}

impl DispatchDecision {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// An empty dispatch is a no-op the controller skips.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Identifier pairing a synthesis submission with its notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which recognizer event produced an [`EventRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Intermediate,
    Final,
}

/// Log-worthy record produced for every processed recognizer event that
/// dispatched text or finished an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub kind: RecordKind,
    pub text: String,
    /// `None` for intermediate records.
    pub consistency: Option<Consistency>,
    pub estimated_backlog: Duration,
}

/// Everything the controller reacts to, funneled through one channel.
#[derive(Debug, Clone)]
pub enum ControlMessage {
    Recognition(TranslationEvent),
    RecognizerFailed(String),
    SynthesisStarted {
        id: RequestId,
        at: Instant,
    },
    SynthesisCompleted {
        id: RequestId,
        at: Instant,
    },
    SynthesisCanceled {
        id: RequestId,
        reason: String,
        details: Option<String>,
    },
    Stop,
}

/// Returns the part of `text` starting at character `offset`.
///
/// An offset past the end yields an empty string.
pub(crate) fn char_suffix(text: &str, offset: usize) -> &str {
    match text.char_indices().nth(offset) {
        Some((byte_idx, _)) => &text[byte_idx..],
        None => "",
    }
}

/// Returns the first `count` characters of `text` (or all of it if shorter).
pub(crate) fn char_prefix(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
