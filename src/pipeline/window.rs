//! Sliding window over the most recent partial translations.
//!
//! A prefix is stable once every slot in the window agrees on it up to its
//! last sentence boundary. Upstream revises its hypothesis freely, so the
//! window tolerates partials that shrink or change non-monotonically.

use crate::defaults::{SENTENCE_BOUNDARY, WINDOW_SIZE};
use crate::pipeline::types::{StableChunk, char_suffix};
use std::collections::VecDeque;

/// Fixed-size FIFO of the last [`WINDOW_SIZE`] partial texts.
#[derive(Debug, Clone)]
pub struct StabilizationWindow {
    entries: VecDeque<String>,
}

impl StabilizationWindow {
    /// Creates a window pre-filled with empty strings.
    pub fn new() -> Self {
        let mut entries = VecDeque::with_capacity(WINDOW_SIZE);
        entries.resize(WINDOW_SIZE, String::new());
        Self { entries }
    }

    /// Pushes a partial translation and returns the newly stable span, if any.
    ///
    /// `emitted_len` is how many characters of the current utterance have
    /// already been dispatched. A stabilized prefix that is not longer than
    /// that produces nothing.
    pub fn observe(&mut self, partial: &str, emitted_len: usize) -> Option<StableChunk> {
        self.entries.pop_front();
        self.entries.push_back(partial.to_string());

        let prefix = self.stabilized_prefix()?;
        let stable_len = prefix.chars().count();
        if stable_len <= emitted_len {
            tracing::trace!(stable_len, emitted_len, "stable prefix already emitted");
            return None;
        }

        Some(StableChunk {
            text: char_suffix(prefix, emitted_len).to_string(),
            stable_len,
        })
    }

    /// The prefix, ending at a sentence boundary, shared by every slot.
    pub fn stabilized_prefix(&self) -> Option<&str> {
        let mut prefixes = self.entries.iter().map(|entry| up_to_last_boundary(entry));
        let first = prefixes.next()??;
        for prefix in prefixes {
            if prefix? != first {
                return None;
            }
        }
        Some(first)
    }

    /// Clears the window back to empty slots.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.clear();
        }
    }

    /// Number of slots; always [`WINDOW_SIZE`].
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current slots, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl Default for StabilizationWindow {
    fn default() -> Self {
        Self::new()
    }
}

/// `text` up to and including its last sentence boundary marker.
fn up_to_last_boundary(text: &str) -> Option<&str> {
    text.rfind(SENTENCE_BOUNDARY)
        .map(|idx| &text[..idx + SENTENCE_BOUNDARY.len()])
}
