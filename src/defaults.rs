//! Default configuration constants for livedub.
//!
//! Shared between the configuration types and the pipeline so both agree
//! on the same values.

/// Number of consecutive partial translations that must agree before a
/// prefix is considered stable.
pub const WINDOW_SIZE: usize = 3;

/// Sentence boundary marker: a period followed by a space.
pub const SENTENCE_BOUNDARY: &str = ". ";

/// Default source language of the recognizer.
pub const SOURCE_LANGUAGE: &str = "de-DE";

/// Default target language of the translation and synthesis.
pub const TARGET_LANGUAGE: &str = "en";

/// Default synthesis voice.
pub const VOICE: &str = "en-US-GuyNeural";

/// Default prosody rate. Faster than normal speech so the dub can catch up
/// with the speaker. Also the key under which calibration is persisted.
pub const PROSODY_RATE: &str = "+30%";

/// Initial fixed synthesis overhead before any calibration sample exists.
pub const BASE_LATENCY_SECS: f64 = 0.5;

/// Initial per-character synthesis cost before any calibration sample exists.
pub const PER_CHAR_LATENCY_SECS: f64 = 0.06;

/// Maximum number of calibration samples kept; the oldest are evicted.
pub const MAX_CALIBRATION_SAMPLES: usize = 200;

/// Upper bound on any persisted latency figure, in seconds. Calibration
/// records beyond it are rejected on load.
pub const MAX_LATENCY_SECS: f64 = 600.0;

/// Capacity of the channel event records are published on.
pub const EVENT_BUFFER: usize = 256;

/// How long `Stopping` waits for in-flight synthesis to complete, in milliseconds.
pub const DRAIN_TIMEOUT_MS: u64 = 2000;

/// Directory name used under the platform config/data directories.
pub const APP_DIR: &str = "livedub";
