//! Synthesizer that takes as long as a real voice would, without producing audio.

use crate::error::{LivedubError, Result};
use crate::pipeline::calibration::CalibrationModel;
use crate::pipeline::types::RequestId;
use crate::tts::synthesizer::{SynthesisNotifier, Synthesizer, VoiceSettings};
use crossbeam_channel::{Sender, unbounded};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How long the simulated voice takes per request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatedTiming {
    pub base: Duration,
    pub per_char: Duration,
}

impl SimulatedTiming {
    /// No delay at all; requests complete as fast as the worker can run.
    pub fn instant() -> Self {
        Self {
            base: Duration::ZERO,
            per_char: Duration::ZERO,
        }
    }

    /// Multiplies both terms; a factor of zero makes synthesis instant.
    pub fn scaled(self, factor: f64) -> Self {
        let factor = if factor.is_finite() { factor.max(0.0) } else { 1.0 };
        Self {
            base: secs_saturating(self.base.as_secs_f64() * factor),
            per_char: secs_saturating(self.per_char.as_secs_f64() * factor),
        }
    }

    pub fn duration_for(&self, char_count: usize) -> Duration {
        let chars = u32::try_from(char_count).unwrap_or(u32::MAX);
        self.base.saturating_add(self.per_char.saturating_mul(chars))
    }
}

impl From<&CalibrationModel> for SimulatedTiming {
    fn from(model: &CalibrationModel) -> Self {
        Self {
            base: secs_saturating(model.base_latency_seconds),
            per_char: secs_saturating(model.per_char_latency_seconds),
        }
    }
}

fn secs_saturating(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

struct Job {
    id: RequestId,
    text: String,
    notifier: SynthesisNotifier,
}

/// Speaks one request at a time, in submission order, on a worker thread.
pub struct SimulatedSynthesizer {
    settings: VoiceSettings,
    jobs: Sender<Job>,
    spoken: Arc<Mutex<Vec<String>>>,
}

impl SimulatedSynthesizer {
    pub fn new(settings: VoiceSettings, timing: SimulatedTiming) -> Self {
        Self::spawn(settings, timing, None)
    }

    /// Requests whose text contains `pattern` are canceled instead of spoken.
    pub fn failing_on(settings: VoiceSettings, timing: SimulatedTiming, pattern: &str) -> Self {
        Self::spawn(settings, timing, Some(pattern.to_string()))
    }

    fn spawn(settings: VoiceSettings, timing: SimulatedTiming, fail_on: Option<String>) -> Self {
        let (jobs, job_rx) = unbounded::<Job>();
        let spoken = Arc::new(Mutex::new(Vec::new()));
        let worker_spoken = Arc::clone(&spoken);

        thread::spawn(move || {
            while let Ok(job) = job_rx.recv() {
                if fail_on.as_deref().is_some_and(|p| job.text.contains(p)) {
                    job.notifier.canceled(
                        job.id,
                        "Error",
                        Some(format!("simulated failure for {:?}", job.text)),
                    );
                    continue;
                }

                job.notifier.started(job.id);
                let duration = timing.duration_for(job.text.chars().count());
                if !duration.is_zero() {
                    thread::sleep(duration);
                }
                if let Ok(mut spoken) = worker_spoken.lock() {
                    spoken.push(job.text);
                }
                job.notifier.completed(job.id);
            }
        });

        Self {
            settings,
            jobs,
            spoken,
        }
    }

    /// Shared log of every text spoken so far, in completion order.
    pub fn spoken_log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.spoken)
    }
}

impl Synthesizer for SimulatedSynthesizer {
    fn submit(&self, id: RequestId, text: &str, notifier: SynthesisNotifier) -> Result<()> {
        self.jobs
            .send(Job {
                id,
                text: text.to_string(),
                notifier,
            })
            .map_err(|_| LivedubError::Synthesis {
                message: "simulated voice worker stopped".to_string(),
            })
    }

    fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::ControlMessage;
    use std::time::Instant;

    fn recv_all(
        rx: &crossbeam_channel::Receiver<ControlMessage>,
        count: usize,
    ) -> Vec<ControlMessage> {
        (0..count)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect()
    }

    #[test]
    fn test_timing_from_calibration() {
        let model = CalibrationModel {
            base_latency_seconds: 0.25,
            per_char_latency_seconds: 0.01,
            samples: Vec::new(),
        };
        let timing = SimulatedTiming::from(&model);
        assert_eq!(timing.duration_for(10), Duration::from_millis(350));
        assert_eq!(SimulatedTiming::instant().duration_for(100), Duration::ZERO);
    }

    #[test]
    fn test_timing_saturates_on_out_of_range_model() {
        let model = CalibrationModel {
            base_latency_seconds: 1e30,
            per_char_latency_seconds: f64::NAN,
            samples: Vec::new(),
        };
        let timing = SimulatedTiming::from(&model);
        assert_eq!(timing.base, Duration::MAX);
        assert_eq!(timing.per_char, Duration::ZERO);
        assert_eq!(timing.duration_for(usize::MAX), Duration::MAX);
        assert_eq!(timing.scaled(2.0).base, Duration::MAX);
    }

    #[test]
    fn test_timing_scaled() {
        let timing = SimulatedTiming {
            base: Duration::from_millis(400),
            per_char: Duration::from_millis(20),
        };
        assert_eq!(timing.scaled(0.5).duration_for(10), Duration::from_millis(300));
        assert_eq!(timing.scaled(0.0), SimulatedTiming::instant());
        assert_eq!(timing.scaled(-2.0), SimulatedTiming::instant());
    }

    #[test]
    fn test_requests_start_and_complete_in_order() {
        let (tx, rx) = unbounded();
        let synth = SimulatedSynthesizer::new(VoiceSettings::default(), SimulatedTiming::instant());
        let notifier = SynthesisNotifier::new(tx);

        synth.submit(RequestId(1), "Hello. ", notifier.clone()).unwrap();
        synth.submit(RequestId(2), "World.", notifier).unwrap();

        let ids: Vec<(&'static str, RequestId)> = recv_all(&rx, 4)
            .into_iter()
            .map(|msg| match msg {
                ControlMessage::SynthesisStarted { id, .. } => ("started", id),
                ControlMessage::SynthesisCompleted { id, .. } => ("completed", id),
                other => panic!("unexpected message {other:?}"),
            })
            .collect();
        assert_eq!(
            ids,
            vec![
                ("started", RequestId(1)),
                ("completed", RequestId(1)),
                ("started", RequestId(2)),
                ("completed", RequestId(2)),
            ]
        );

        let spoken = synth.spoken_log();
        assert_eq!(*spoken.lock().unwrap(), vec!["Hello. ", "World."]);
    }

    #[test]
    fn test_synthesis_takes_simulated_time() {
        let (tx, rx) = unbounded();
        let timing = SimulatedTiming {
            base: Duration::from_millis(20),
            per_char: Duration::from_millis(1),
        };
        let synth = SimulatedSynthesizer::new(VoiceSettings::default(), timing);
        synth
            .submit(RequestId(7), &"x".repeat(30), SynthesisNotifier::new(tx))
            .unwrap();

        let messages = recv_all(&rx, 2);
        let (started, completed): (Instant, Instant) = match (&messages[0], &messages[1]) {
            (
                ControlMessage::SynthesisStarted { at: s, .. },
                ControlMessage::SynthesisCompleted { at: c, .. },
            ) => (*s, *c),
            other => panic!("unexpected messages {other:?}"),
        };
        assert!(completed.duration_since(started) >= Duration::from_millis(50));
    }

    #[test]
    fn test_failing_pattern_cancels_request() {
        let (tx, rx) = unbounded();
        let synth = SimulatedSynthesizer::failing_on(
            VoiceSettings::default(),
            SimulatedTiming::instant(),
            "boom",
        );
        synth
            .submit(RequestId(3), "it goes boom", SynthesisNotifier::new(tx))
            .unwrap();

        match rx.recv_timeout(Duration::from_secs(2)).unwrap() {
            ControlMessage::SynthesisCanceled { id, reason, details } => {
                assert_eq!(id, RequestId(3));
                assert_eq!(reason, "Error");
                assert!(details.unwrap().contains("boom"));
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert!(synth.spoken_log().lock().unwrap().is_empty());
    }

    #[test]
    fn test_settings_and_name() {
        let synth = SimulatedSynthesizer::new(VoiceSettings::default(), SimulatedTiming::instant());
        assert_eq!(synth.settings().prosody_rate, "+30%");
        assert_eq!(synth.name(), "simulated");
    }
}
