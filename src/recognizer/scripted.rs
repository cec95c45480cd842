//! Recognizer that replays a prepared sequence of translation events.
//!
//! Used by the `replay` command and by tests. Scripts are JSON lines:
//!
//! ```text
//! {"kind": "partial", "text": "Hello world. ", "delay_ms": 120}
//! {"kind": "final", "text": "Hello world. I am fine."}
//! {"kind": "end"}
//! ```

use crate::error::{LivedubError, Result};
use crate::pipeline::types::TranslationEvent;
use crate::recognizer::{LanguagePair, RecognitionSink, Recognizer};
use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use serde::Deserialize;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// One scripted event and the pause before it is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptStep {
    pub delay: Duration,
    pub event: TranslationEvent,
}

impl ScriptStep {
    pub fn partial(text: &str) -> Self {
        Self::immediate(TranslationEvent::Partial(text.to_string()))
    }

    pub fn final_text(text: &str) -> Self {
        Self::immediate(TranslationEvent::Final(text.to_string()))
    }

    pub fn end() -> Self {
        Self::immediate(TranslationEvent::SessionEnded)
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn immediate(event: TranslationEvent) -> Self {
        Self {
            delay: Duration::ZERO,
            event,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ScriptKind {
    Partial,
    Final,
    End,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptLine {
    kind: ScriptKind,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    delay_ms: u64,
}

/// Parses a JSON-lines script. Blank lines and `#` comments are skipped.
pub fn parse_script(contents: &str) -> Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: ScriptLine = serde_json::from_str(line).map_err(|e| LivedubError::Script {
            line: idx + 1,
            message: e.to_string(),
        })?;

        let event = match (parsed.kind, parsed.text) {
            (ScriptKind::Partial, Some(text)) => TranslationEvent::Partial(text),
            (ScriptKind::Final, Some(text)) => TranslationEvent::Final(text),
            (ScriptKind::End, _) => TranslationEvent::SessionEnded,
            (_, None) => {
                return Err(LivedubError::Script {
                    line: idx + 1,
                    message: "missing \"text\"".to_string(),
                });
            }
        };
        steps.push(ScriptStep {
            delay: Duration::from_millis(parsed.delay_ms),
            event,
        });
    }
    Ok(steps)
}

/// Replays [`ScriptStep`]s from a background thread.
///
/// A session-ended event is appended if the script does not contain one.
pub struct ScriptedRecognizer {
    steps: Vec<ScriptStep>,
    languages: LanguagePair,
    /// Dropping the sender cancels the replay, including a pending delay
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ScriptedRecognizer {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            languages: LanguagePair::default(),
            stop_tx: None,
            handle: None,
        }
    }

    pub fn with_languages(mut self, languages: LanguagePair) -> Self {
        self.languages = languages;
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Blocks until every step has been delivered or delivery failed.
    pub fn wait_for_replay(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.join().map_err(|_| LivedubError::Recognizer {
                message: "replay thread panicked".to_string(),
            })?;
        }
        Ok(())
    }
}

impl Recognizer for ScriptedRecognizer {
    fn start(&mut self, sink: RecognitionSink) -> Result<()> {
        if self.handle.is_some() {
            return Err(LivedubError::Recognizer {
                message: "already started".to_string(),
            });
        }

        let mut steps = self.steps.clone();
        if !steps.iter().any(|s| s.event == TranslationEvent::SessionEnded) {
            steps.push(ScriptStep::end());
        }
        let (stop_tx, stop_rx) = bounded::<()>(0);
        self.stop_tx = Some(stop_tx);

        self.handle = Some(thread::spawn(move || {
            for step in steps {
                match stop_rx.recv_timeout(step.delay) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                let ended = step.event == TranslationEvent::SessionEnded;
                if !sink.deliver(step.event) || ended {
                    break;
                }
            }
        }));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stop_tx = None;
        self.wait_for_replay()
    }

    fn languages(&self) -> &LanguagePair {
        &self.languages
    }
}
