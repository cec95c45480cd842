//! livedub - live speech-to-speech dubbing
//!
//! Speaks the stable part of a streaming translation before the speaker has
//! finished the sentence, then reconciles with the final translation so every
//! character is spoken exactly once.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod recognizer;
pub mod tts;

// Collaborator traits (recognizer → controller → synthesizer)
pub use recognizer::{RecognitionSink, Recognizer};
pub use tts::{SynthesisNotifier, Synthesizer};

// Pipeline
pub use pipeline::orchestrator::{Pipeline, PipelineConfig, PipelineHandle};
pub use pipeline::{PipelineController, PipelineState, SessionReport};

// Error handling
pub use error::{LivedubError, Result};

// Config
pub use config::Config;

// Per-event error reporting
pub use pipeline::error::{ErrorReporter, EventError};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
