//! The synthesis collaborator: voice settings, the submit seam and the
//! notifier that reports progress back to the controller.

use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::pipeline::types::{ControlMessage, RequestId};
use crossbeam_channel::Sender;
use std::time::Instant;

/// Voice a synthesizer speaks with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSettings {
    pub language: String,
    pub voice: String,
    /// Relative speaking rate, e.g. "+30%".
    pub prosody_rate: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: defaults::TARGET_LANGUAGE.to_string(),
            voice: defaults::VOICE.to_string(),
            prosody_rate: defaults::PROSODY_RATE.to_string(),
        }
    }
}

impl From<&Config> for VoiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            language: config.translation.target_language.clone(),
            voice: config.synthesis.voice.clone(),
            prosody_rate: config.synthesis.prosody_rate.clone(),
        }
    }
}

/// Trait for text-to-speech backends.
///
/// `submit` must not block on synthesis: audio is produced asynchronously and
/// progress is reported through the [`SynthesisNotifier`].
pub trait Synthesizer: Send + 'static {
    /// Queues `text` for synthesis under request `id`.
    fn submit(&self, id: RequestId, text: &str, notifier: SynthesisNotifier) -> Result<()>;

    /// Voice settings in use.
    fn settings(&self) -> &VoiceSettings;

    /// Name for logging.
    fn name(&self) -> &'static str {
        "synthesizer"
    }
}

/// Channel back into the controller for synthesis progress.
#[derive(Debug, Clone)]
pub struct SynthesisNotifier {
    tx: Sender<ControlMessage>,
}

impl SynthesisNotifier {
    pub fn new(tx: Sender<ControlMessage>) -> Self {
        Self { tx }
    }

    /// Reports that audio output for `id` started. Returns `false` once the
    /// controller has gone away; late notifications are simply discarded.
    pub fn started(&self, id: RequestId) -> bool {
        self.started_at(id, Instant::now())
    }

    pub fn started_at(&self, id: RequestId, at: Instant) -> bool {
        self.tx
            .send(ControlMessage::SynthesisStarted { id, at })
            .is_ok()
    }

    pub fn completed(&self, id: RequestId) -> bool {
        self.completed_at(id, Instant::now())
    }

    pub fn completed_at(&self, id: RequestId, at: Instant) -> bool {
        self.tx
            .send(ControlMessage::SynthesisCompleted { id, at })
            .is_ok()
    }

    pub fn canceled(&self, id: RequestId, reason: &str, details: Option<String>) -> bool {
        self.tx
            .send(ControlMessage::SynthesisCanceled {
                id,
                reason: reason.to_string(),
                details,
            })
            .is_ok()
    }
}
