//! Speech recognizer + translator collaborator.
//!
//! The recognizer turns speech in the source language into a stream of
//! cumulative partial and final translations. Its events are funneled into
//! the controller's single inbound channel through a [`RecognitionSink`].

pub mod scripted;

pub use scripted::{ScriptStep, ScriptedRecognizer, parse_script};

use crate::error::Result;
use crate::pipeline::types::{ControlMessage, TranslationEvent};
use crossbeam_channel::Sender;

/// Source language, target language pair a recognizer is configured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self {
            source: crate::defaults::SOURCE_LANGUAGE.to_string(),
            target: crate::defaults::TARGET_LANGUAGE.to_string(),
        }
    }
}

/// A continuous recognizer producing translated events.
///
/// Events for one utterance must be delivered in emission order.
pub trait Recognizer: Send + 'static {
    /// Starts continuous recognition, delivering events into `sink`.
    fn start(&mut self, sink: RecognitionSink) -> Result<()>;

    /// Stops recognition. No events are delivered after this returns.
    fn stop(&mut self) -> Result<()>;

    /// Language pair being recognized and translated.
    fn languages(&self) -> &LanguagePair;
}

/// Handle the recognizer uses to deliver events to the controller.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    tx: Sender<ControlMessage>,
}

impl RecognitionSink {
    pub fn new(tx: Sender<ControlMessage>) -> Self {
        Self { tx }
    }

    /// Delivers an event. Returns `false` once the controller has gone away.
    pub fn deliver(&self, event: TranslationEvent) -> bool {
        self.tx.send(ControlMessage::Recognition(event)).is_ok()
    }

    pub fn partial(&self, text: impl Into<String>) -> bool {
        self.deliver(TranslationEvent::Partial(text.into()))
    }

    pub fn final_text(&self, text: impl Into<String>) -> bool {
        self.deliver(TranslationEvent::Final(text.into()))
    }

    pub fn session_ended(&self) -> bool {
        self.deliver(TranslationEvent::SessionEnded)
    }

    /// Reports an unrecoverable recognizer failure; ends the session.
    pub fn failed(&self, message: impl Into<String>) -> bool {
        self.tx
            .send(ControlMessage::RecognizerFailed(message.into()))
            .is_ok()
    }
}
