//! Bookkeeping of what has already been sent to synthesis for the current utterance.

use crate::pipeline::types::{
    Consistency, DispatchDecision, StableChunk, char_prefix, char_suffix,
};

/// Tracks the emitted offset so every character of an utterance is spoken
/// exactly once, and reconciles early output against the final translation.
#[derive(Debug, Clone, Default)]
pub struct EmissionTracker {
    /// Characters of the current utterance already dispatched.
    emitted_len: usize,
    /// Text dispatched so far from partial stabilizations.
    emitted_text: String,
}

impl EmissionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted_len(&self) -> usize {
        self.emitted_len
    }

    pub fn emitted_text(&self) -> &str {
        &self.emitted_text
    }

    /// Accepts a stable chunk from the window and dispatches it.
    ///
    /// The offset only moves forward within an utterance.
    pub fn on_partial_stable(&mut self, chunk: StableChunk) -> DispatchDecision {
        if chunk.stable_len <= self.emitted_len {
            return DispatchDecision::default();
        }
        self.emitted_len = chunk.stable_len;
        self.emitted_text.push_str(&chunk.text);
        DispatchDecision::new(chunk.text)
    }

    /// Finishes the utterance with the authoritative final translation.
    ///
    /// Dispatches whatever of `final_text` lies past the emitted offset and
    /// resets for the next utterance. A mismatch between the early output and
    /// the final text is reported but never blocks the final dispatch.
    pub fn on_final(&mut self, final_text: &str) -> (DispatchDecision, Consistency) {
        let consistency = if char_prefix(final_text, self.emitted_len) == self.emitted_text {
            Consistency::Ok
        } else {
            Consistency::Mismatch
        };

        let decision = DispatchDecision::new(char_suffix(final_text, self.emitted_len));
        self.reset();
        (decision, consistency)
    }

    pub fn reset(&mut self) {
        self.emitted_len = 0;
        self.emitted_text.clear();
    }
}
