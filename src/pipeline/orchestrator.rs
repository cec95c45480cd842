//! Dubbing pipeline that runs one session from start until the speaker stops.

use crate::config::Config;
use crate::defaults;
use crate::error::{LivedubError, Result};
use crate::pipeline::calibration::CalibrationStore;
use crate::pipeline::controller::{
    ControllerConfig, PipelineController, PipelineState, SessionReport,
};
use crate::pipeline::error::{ErrorReporter, LogReporter, EventError};
use crate::pipeline::types::{ControlMessage, EventRecord};
use crate::recognizer::{RecognitionSink, Recognizer};
use crate::tts::{SynthesisNotifier, Synthesizer};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub controller: ControllerConfig,
    /// Capacity of the event record channel
    pub event_buffer: usize,
    /// How long `Stopping` waits for in-flight synthesis
    pub drain_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            event_buffer: defaults::EVENT_BUFFER,
            drain_timeout: Duration::from_millis(defaults::DRAIN_TIMEOUT_MS),
        }
    }
}

impl From<&Config> for PipelineConfig {
    fn from(config: &Config) -> Self {
        Self {
            controller: ControllerConfig::from(config),
            event_buffer: config.pipeline.event_buffer,
            drain_timeout: Duration::from_millis(config.pipeline.drain_timeout_ms),
        }
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    /// Inbound channel of the controller, for stop requests
    control_tx: Sender<ControlMessage>,
    /// Published controller state
    state: Arc<AtomicU8>,
    records: Receiver<EventRecord>,
    thread: JoinHandle<Result<SessionReport>>,
}

impl PipelineHandle {
    /// Requests a stop and waits for the session to wind down.
    ///
    /// In-flight synthesis gets up to the drain timeout to complete.
    pub fn stop(self) -> Result<SessionReport> {
        if self.control_tx.send(ControlMessage::Stop).is_err() {
            tracing::debug!("session already ended before stop request");
        }
        self.wait()
    }

    /// Waits for the session to end by itself (e.g. the recognizer's
    /// session-ended event) and returns its report.
    pub fn wait(self) -> Result<SessionReport> {
        self.thread.join().map_err(|panic_info| {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            LivedubError::Other(format!("pipeline thread panicked: {msg}"))
        })?
    }

    /// Event records, one per dispatched chunk or finished utterance.
    ///
    /// The channel disconnects once the session is over.
    pub fn records(&self) -> Receiver<EventRecord> {
        self.records.clone()
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Returns true until the session starts stopping.
    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }
}

/// Dubbing pipeline: Recognizer → Controller → Synthesizer.
pub struct Pipeline {
    config: PipelineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
    store: Option<CalibrationStore>,
}

impl Pipeline {
    /// Creates a new pipeline with default error reporter.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
            store: None,
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Persists the calibration model across sessions.
    pub fn with_calibration_store(mut self, store: CalibrationStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Starts a session.
    ///
    /// The recognizer is started before this returns, so a recognizer that
    /// cannot start is reported here rather than through the handle.
    pub fn start(
        self,
        mut recognizer: Box<dyn Recognizer>,
        synthesizer: Box<dyn Synthesizer>,
    ) -> Result<PipelineHandle> {
        // Unbounded: neither collaborator may block on the controller
        let (control_tx, control_rx) = unbounded();
        let (record_tx, record_rx) = bounded(self.config.event_buffer.max(1));

        let mut controller = PipelineController::new(
            self.config.controller.clone(),
            synthesizer,
            SynthesisNotifier::new(control_tx.clone()),
        )
        .with_error_reporter(self.error_reporter.clone())
        .with_record_sender(record_tx);
        if let Some(store) = self.store {
            controller = controller.with_calibration_store(store);
        }

        controller.start()?;
        recognizer.start(RecognitionSink::new(control_tx.clone()))?;
        tracing::info!(
            source = %recognizer.languages().source,
            target = %recognizer.languages().target,
            "recognizer started"
        );

        let state = Arc::new(AtomicU8::new(PipelineState::Running.as_u8()));
        let session = Session {
            controller,
            recognizer,
            rx: control_rx,
            state: state.clone(),
            drain_timeout: self.config.drain_timeout,
            error_reporter: self.error_reporter,
        };
        let thread = thread::Builder::new()
            .name("livedub-controller".to_string())
            .spawn(move || session.run())?;

        Ok(PipelineHandle {
            control_tx,
            state,
            records: record_rx,
            thread,
        })
    }
}

/// Everything the controller thread owns.
struct Session {
    controller: PipelineController,
    recognizer: Box<dyn Recognizer>,
    rx: Receiver<ControlMessage>,
    state: Arc<AtomicU8>,
    drain_timeout: Duration,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl Session {
    fn run(mut self) -> Result<SessionReport> {
        while self.controller.state() == PipelineState::Running {
            // The controller's notifier keeps a sender alive, so this only
            // fails if that invariant is broken
            let Ok(message) = self.rx.recv() else {
                break;
            };
            self.handle(message);
        }
        self.state
            .store(PipelineState::Stopping.as_u8(), Ordering::SeqCst);

        if let Err(e) = self.recognizer.stop() {
            self.error_reporter.report(
                "recognizer",
                &EventError::Recoverable(format!("failed to stop: {e}")),
            );
        }

        let deadline = Instant::now() + self.drain_timeout;
        while !self.controller.queue().is_empty() {
            match self.rx.recv_deadline(deadline) {
                Ok(message) => self.handle(message),
                Err(_) => break,
            }
        }

        let report = self.controller.finish();
        self.state
            .store(PipelineState::Idle.as_u8(), Ordering::SeqCst);
        report
    }

    fn handle(&mut self, message: ControlMessage) {
        if let Err(e) = self.controller.process(message) {
            self.error_reporter.report("controller", &e);
        }
    }
}
