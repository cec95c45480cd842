//! Outstanding synthesis requests and the estimate of how far the spoken
//! output lags behind the speaker.

use crate::pipeline::calibration::{CalibrationModel, CalibrationSample};
use crate::pipeline::types::RequestId;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A chunk handed to the synthesizer that has not completed yet.
#[derive(Debug, Clone)]
pub struct PendingSynthesis {
    pub id: RequestId,
    pub char_count: usize,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
}

/// Queue of in-flight synthesis requests plus the calibrated timing model.
///
/// Requests normally complete in submission order, but they are matched by
/// [`RequestId`] so an out-of-order completion still removes the right entry.
#[derive(Debug)]
pub struct SynthesisQueue {
    pending: VecDeque<PendingSynthesis>,
    model: CalibrationModel,
    last_started_at: Option<Instant>,
    last_event_at: Option<Instant>,
}

impl SynthesisQueue {
    pub fn new(model: CalibrationModel) -> Self {
        Self {
            pending: VecDeque::new(),
            model,
            last_started_at: None,
            last_event_at: None,
        }
    }

    /// Records a submitted chunk at the back of the queue.
    pub fn enqueue(&mut self, id: RequestId, text: &str, now: Instant) {
        self.pending.push_back(PendingSynthesis {
            id,
            char_count: text.chars().count(),
            submitted_at: now,
            started_at: None,
        });
    }

    /// Marks the request as started. Unknown ids only update the start time.
    pub fn on_started(&mut self, id: RequestId, at: Instant) {
        self.last_started_at = Some(at);
        match self.pending.iter_mut().find(|p| p.id == id) {
            Some(entry) => entry.started_at = Some(at),
            None => tracing::debug!(%id, "start notification for unknown synthesis request"),
        }
    }

    /// Removes a completed request and feeds its timing into the model.
    ///
    /// Returns the calibration sample if one could be derived. Requests with
    /// no characters or without any known start time yield no sample.
    pub fn on_completed(&mut self, id: RequestId, at: Instant) -> Option<CalibrationSample> {
        let Some(entry) = self.remove(id) else {
            tracing::warn!(%id, "completion for unknown synthesis request");
            return None;
        };

        let started = entry.started_at.or(self.last_started_at)?;
        let latency = at.checked_duration_since(started)?.as_secs_f64();
        let sample = CalibrationSample {
            char_count: entry.char_count,
            latency,
        };

        if self.model.record(sample) {
            tracing::debug!(
                %id,
                chars = sample.char_count,
                latency_secs = latency,
                per_char = sample.observed_per_char(),
                base = self.model.base_latency_seconds,
                slope = self.model.per_char_latency_seconds,
                "calibration updated"
            );
            Some(sample)
        } else {
            tracing::debug!(%id, chars = entry.char_count, "calibration sample dropped");
            None
        }
    }

    /// Removes a canceled request without producing a calibration sample.
    pub fn on_canceled(&mut self, id: RequestId) -> bool {
        self.remove(id).is_some()
    }

    /// Notes when the recognizer last produced an event.
    pub fn mark_event(&mut self, at: Instant) {
        self.last_event_at = Some(at);
    }

    /// How far behind real time the spoken output currently is.
    ///
    /// Sums the predicted synthesis time of everything still queued, minus
    /// the time the oldest request has already been synthesizing, minus the
    /// time since the last recognizer event. Never negative.
    pub fn estimate_backlog(&self, now: Instant) -> Duration {
        let queued = self
            .pending
            .iter()
            .map(|p| self.model.predict(p.char_count))
            .fold(Duration::ZERO, Duration::saturating_add);

        let in_progress = self
            .pending
            .front()
            .and_then(|p| p.started_at)
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();

        let since_event = self
            .last_event_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();

        queued
            .saturating_sub(in_progress)
            .saturating_sub(since_event)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingSynthesis> {
        self.pending.iter()
    }

    pub fn model(&self) -> &CalibrationModel {
        &self.model
    }

    /// Drops queued requests and timing marks, keeping the calibration.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.last_started_at = None;
        self.last_event_at = None;
    }

    fn remove(&mut self, id: RequestId) -> Option<PendingSynthesis> {
        // Front first: in-order completion is the common case
        if self.pending.front().is_some_and(|p| p.id == id) {
            return self.pending.pop_front();
        }
        let position = self.pending.iter().position(|p| p.id == id)?;
        self.pending.remove(position)
    }
}

/// Counters for one recognition session, reported when it stops.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub utterances: usize,
    pub intermediate_chunks: usize,
    pub final_chunks: usize,
    pub mismatches: usize,
    pub completed: usize,
    pub canceled: usize,
    pub dropped_events: usize,
    /// Completions that yielded a calibration sample.
    pub sampled: usize,
    pub synthesis_total: Duration,
    pub max_backlog: Duration,
}

impl SessionStats {
    pub fn record_backlog(&mut self, backlog: Duration) {
        self.max_backlog = self.max_backlog.max(backlog);
    }

    pub fn record_completion(&mut self, sample: Option<&CalibrationSample>) {
        self.completed += 1;
        if let Some(latency) = sample.and_then(|s| Duration::try_from_secs_f64(s.latency).ok()) {
            self.sampled += 1;
            self.synthesis_total = self.synthesis_total.saturating_add(latency);
        }
    }

    /// Mean over completions with a measured latency only.
    pub fn mean_synthesis(&self) -> Option<Duration> {
        let sampled = u32::try_from(self.sampled).ok().filter(|&n| n > 0)?;
        Some(self.synthesis_total / sampled)
    }

    /// One-line summary for the end-of-session log.
    pub fn summary(&self) -> String {
        let mean = self
            .mean_synthesis()
            .map(format_duration)
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "{} utterance{}, {} early + {} final chunk{}, {} mismatch{}, mean synthesis {}, max backlog {}",
            self.utterances,
            if self.utterances == 1 { "" } else { "s" },
            self.intermediate_chunks,
            self.final_chunks,
            if self.final_chunks == 1 { "" } else { "s" },
            self.mismatches,
            if self.mismatches == 1 { "" } else { "es" },
            mean,
            format_duration(self.max_backlog),
        )
    }
}

/// Formats a duration as a human-friendly string.
/// Under 1s: "450ms", at or above 1s: "1.5s".
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}
