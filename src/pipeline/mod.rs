//! Dubbing pipeline core.
//!
//! A single controller owns the stabilization window, the emission tracker
//! and the synthesis queue. Recognizer events and synthesizer notifications
//! reach it through one crossbeam channel, drained on its own thread.

pub mod calibration;
pub mod controller;
pub mod emission;
pub mod error;
pub mod latency;
pub mod orchestrator;
pub mod types;
pub mod window;

pub use calibration::{CalibrationModel, CalibrationSample, CalibrationStore};
pub use controller::{ControllerConfig, PipelineController, PipelineState, SessionReport};
pub use emission::EmissionTracker;
pub use error::{ErrorReporter, LogReporter, EventError};
pub use latency::{SessionStats, SynthesisQueue};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use types::{
    Consistency, ControlMessage, DispatchDecision, EventRecord, RecordKind, RequestId,
    StableChunk, TranslationEvent,
};
pub use window::StabilizationWindow;
