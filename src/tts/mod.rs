//! Speech synthesis collaborator.

pub mod simulated;
pub mod synthesizer;

pub use simulated::{SimulatedSynthesizer, SimulatedTiming};
pub use synthesizer::{SynthesisNotifier, Synthesizer, VoiceSettings};
