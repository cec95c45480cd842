//! Single owner of all per-session dubbing state.
//!
//! Recognizer events and synthesizer notifications arrive from independent
//! threads; the orchestrator funnels them into one channel and hands them to
//! [`PipelineController::process`] one at a time, so the window, the emission
//! tracker and the synthesis queue are plain owned data.

use crate::config::Config;
use crate::defaults;
use crate::error::{LivedubError, Result};
use crate::pipeline::calibration::{CalibrationModel, CalibrationStore};
use crate::pipeline::emission::EmissionTracker;
use crate::pipeline::error::{ErrorReporter, LogReporter, EventError};
use crate::pipeline::latency::{SessionStats, SynthesisQueue, format_duration};
use crate::pipeline::types::{
    Consistency, ControlMessage, EventRecord, RecordKind, RequestId, TranslationEvent,
};
use crate::pipeline::window::StabilizationWindow;
use crate::tts::{SynthesisNotifier, Synthesizer};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Lifecycle of a dubbing session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
}

impl PipelineState {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Unknown values map to `Idle`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PipelineState::Running,
            2 => PipelineState::Stopping,
            _ => PipelineState::Idle,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Running => write!(f, "running"),
            PipelineState::Stopping => write!(f, "stopping"),
        }
    }
}

/// Behaviour switches for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Speak stabilized parts of partial translations before the final arrives.
    pub intermediate_translations: bool,
    /// Log event records at info instead of debug.
    pub verbose: bool,
    /// Key the calibration model is stored under (the prosody rate).
    pub calibration_key: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            intermediate_translations: true,
            verbose: false,
            calibration_key: defaults::PROSODY_RATE.to_string(),
        }
    }
}

impl From<&Config> for ControllerConfig {
    fn from(config: &Config) -> Self {
        Self {
            intermediate_translations: config.translation.intermediate_translations,
            verbose: config.pipeline.verbose,
            calibration_key: config.synthesis.prosody_rate.clone(),
        }
    }
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub stats: SessionStats,
    pub model: CalibrationModel,
}

/// The dubbing state machine: `Idle → Running → Stopping → Idle`.
pub struct PipelineController {
    config: ControllerConfig,
    state: PipelineState,
    window: StabilizationWindow,
    tracker: EmissionTracker,
    queue: SynthesisQueue,
    synthesizer: Box<dyn Synthesizer>,
    notifier: SynthesisNotifier,
    next_request: u64,
    stats: SessionStats,
    error_reporter: Arc<dyn ErrorReporter>,
    record_tx: Option<Sender<EventRecord>>,
    store: Option<CalibrationStore>,
}

impl PipelineController {
    /// Creates an idle controller.
    ///
    /// `notifier` is handed to the synthesizer with every request and must
    /// lead back into the channel this controller is fed from.
    pub fn new(
        config: ControllerConfig,
        synthesizer: Box<dyn Synthesizer>,
        notifier: SynthesisNotifier,
    ) -> Self {
        Self {
            config,
            state: PipelineState::Idle,
            window: StabilizationWindow::new(),
            tracker: EmissionTracker::new(),
            queue: SynthesisQueue::new(CalibrationModel::default()),
            synthesizer,
            notifier,
            next_request: 1,
            stats: SessionStats::default(),
            error_reporter: Arc::new(LogReporter),
            record_tx: None,
            store: None,
        }
    }

    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Loads the calibration model from `store` on start and saves it on finish.
    pub fn with_calibration_store(mut self, store: CalibrationStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Publishes every [`EventRecord`] on `tx`. Records are dropped when the
    /// channel is full.
    pub fn with_record_sender(mut self, tx: Sender<EventRecord>) -> Self {
        self.record_tx = Some(tx);
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn queue(&self) -> &SynthesisQueue {
        &self.queue
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Starts a session, resetting all per-session state.
    pub fn start(&mut self) -> Result<()> {
        if self.state != PipelineState::Idle {
            return Err(LivedubError::PipelineState {
                state: self.state.to_string(),
                action: "start".to_string(),
            });
        }

        self.window.reset();
        self.tracker.reset();
        self.stats = SessionStats::default();
        self.queue = SynthesisQueue::new(self.load_model());
        self.state = PipelineState::Running;

        tracing::info!(
            synthesizer = self.synthesizer.name(),
            voice = %self.synthesizer.settings().voice,
            intermediate = self.config.intermediate_translations,
            "session started"
        );
        Ok(())
    }

    /// Handles one message, timestamped now.
    pub fn process(
        &mut self,
        message: ControlMessage,
    ) -> std::result::Result<Option<EventRecord>, EventError> {
        self.process_at(message, Instant::now())
    }

    /// Handles one message as if it arrived at `now`.
    ///
    /// Returns the event record for recognizer events that dispatched text
    /// or finished an utterance.
    pub fn process_at(
        &mut self,
        message: ControlMessage,
        now: Instant,
    ) -> std::result::Result<Option<EventRecord>, EventError> {
        match message {
            ControlMessage::Recognition(event) => {
                if self.state != PipelineState::Running {
                    self.stats.dropped_events += 1;
                    return Err(EventError::Recoverable(format!(
                        "recognizer event dropped, pipeline is {}",
                        self.state
                    )));
                }
                match event {
                    TranslationEvent::Partial(text) => self.on_partial(&text, now),
                    TranslationEvent::Final(text) => self.on_final(&text, now),
                    TranslationEvent::SessionEnded => {
                        self.begin_stopping("session ended");
                        Ok(None)
                    }
                }
            }
            ControlMessage::RecognizerFailed(message) => {
                self.begin_stopping("recognizer failed");
                Err(EventError::Fatal(format!("recognizer failed: {message}")))
            }
            ControlMessage::SynthesisStarted { id, at } => {
                if self.state != PipelineState::Idle {
                    self.queue.on_started(id, at);
                }
                Ok(None)
            }
            ControlMessage::SynthesisCompleted { id, at } => {
                if self.state == PipelineState::Idle {
                    tracing::debug!(%id, "late synthesis completion ignored");
                    return Ok(None);
                }
                let sample = self.queue.on_completed(id, at);
                self.stats.record_completion(sample.as_ref());
                Ok(None)
            }
            ControlMessage::SynthesisCanceled {
                id,
                reason,
                details,
            } => {
                if self.state != PipelineState::Idle && self.queue.on_canceled(id) {
                    self.stats.canceled += 1;
                }
                tracing::warn!(%id, %reason, details = details.as_deref().unwrap_or(""), "synthesis canceled");
                Ok(None)
            }
            ControlMessage::Stop => {
                self.begin_stopping("stop requested");
                Ok(None)
            }
        }
    }

    /// Ends a stopping session: persists calibration and goes back to `Idle`.
    ///
    /// Synthesis still in flight is abandoned; its notifications are ignored.
    pub fn finish(&mut self) -> Result<SessionReport> {
        if self.state == PipelineState::Idle {
            return Err(LivedubError::PipelineState {
                state: self.state.to_string(),
                action: "finish".to_string(),
            });
        }

        if !self.queue.is_empty() {
            tracing::warn!(
                pending = self.queue.len(),
                "session finished with synthesis still in flight"
            );
        }

        let model = self.queue.model().clone();
        if let Some(store) = &self.store
            && let Err(e) = store.save(&self.config.calibration_key, &model)
        {
            self.error_reporter.report(
                "calibration",
                &EventError::Recoverable(format!("failed to save calibration: {e}")),
            );
        }

        self.queue.clear();
        self.window.reset();
        self.tracker.reset();
        self.state = PipelineState::Idle;

        tracing::info!("session finished: {}", self.stats.summary());
        Ok(SessionReport {
            stats: self.stats.clone(),
            model,
        })
    }

    fn on_partial(
        &mut self,
        text: &str,
        now: Instant,
    ) -> std::result::Result<Option<EventRecord>, EventError> {
        self.queue.mark_event(now);
        if !self.config.intermediate_translations {
            return Ok(None);
        }

        let Some(chunk) = self.window.observe(text, self.tracker.emitted_len()) else {
            return Ok(None);
        };
        tracing::debug!(stable_len = chunk.stable_len, "prefix stabilized");

        let decision = self.tracker.on_partial_stable(chunk);
        if decision.is_empty() {
            return Ok(None);
        }

        self.stats.intermediate_chunks += 1;
        self.dispatch(&decision.text, now)?;
        Ok(Some(self.record(
            RecordKind::Intermediate,
            decision.text,
            None,
            now,
        )))
    }

    fn on_final(
        &mut self,
        text: &str,
        now: Instant,
    ) -> std::result::Result<Option<EventRecord>, EventError> {
        self.queue.mark_event(now);

        let emitted = self.tracker.emitted_text().to_string();
        let (decision, consistency) = self.tracker.on_final(text);
        self.window.reset();
        self.stats.utterances += 1;

        if consistency == Consistency::Mismatch {
            self.stats.mismatches += 1;
            tracing::warn!(%emitted, final_text = %text, "spoken text diverges from final translation");
        }

        if !decision.is_empty() {
            self.stats.final_chunks += 1;
            self.dispatch(&decision.text, now)?;
        }

        Ok(Some(self.record(
            RecordKind::Final,
            decision.text,
            Some(consistency),
            now,
        )))
    }

    /// Hands `text` to the synthesizer. A rejected submission is removed
    /// from the queue again.
    fn dispatch(&mut self, text: &str, now: Instant) -> std::result::Result<RequestId, EventError> {
        let id = RequestId(self.next_request);
        self.next_request += 1;

        self.queue.enqueue(id, text, now);
        if let Err(e) = self.synthesizer.submit(id, text, self.notifier.clone()) {
            self.queue.on_canceled(id);
            self.stats.canceled += 1;
            return Err(EventError::Recoverable(format!(
                "synthesis request {id} rejected: {e}"
            )));
        }

        tracing::info!(%id, chars = text.chars().count(), "dispatched: {text}");
        Ok(id)
    }

    fn record(
        &mut self,
        kind: RecordKind,
        text: String,
        consistency: Option<Consistency>,
        now: Instant,
    ) -> EventRecord {
        let estimated_backlog = self.queue.estimate_backlog(now);
        self.stats.record_backlog(estimated_backlog);

        let record = EventRecord {
            kind,
            text,
            consistency,
            estimated_backlog,
        };

        let consistency = consistency.map_or_else(|| "n/a".to_string(), |c| c.to_string());
        let backlog = format_duration(estimated_backlog);
        if self.config.verbose {
            tracing::info!(kind = ?record.kind, %consistency, %backlog, "{}", record.text);
        } else {
            tracing::debug!(kind = ?record.kind, %consistency, %backlog, "{}", record.text);
        }

        if let Some(tx) = &self.record_tx
            && tx.try_send(record.clone()).is_err()
        {
            tracing::debug!("event record dropped, no room on record channel");
        }
        record
    }

    fn begin_stopping(&mut self, reason: &str) {
        if self.state == PipelineState::Running {
            tracing::info!(reason, pending = self.queue.len(), "stopping session");
            self.state = PipelineState::Stopping;
        }
    }

    fn load_model(&self) -> CalibrationModel {
        let Some(store) = &self.store else {
            return CalibrationModel::default();
        };
        match store.load(&self.config.calibration_key) {
            Ok(Some(model)) => {
                tracing::info!(
                    key = %self.config.calibration_key,
                    base = model.base_latency_seconds,
                    per_char = model.per_char_latency_seconds,
                    samples = model.samples.len(),
                    "calibration loaded"
                );
                model
            }
            Ok(None) => CalibrationModel::default(),
            Err(e) => {
                self.error_reporter.report(
                    "calibration",
                    &EventError::Recoverable(format!(
                        "failed to load calibration, using defaults: {e}"
                    )),
                );
                CalibrationModel::default()
            }
        }
    }
}
