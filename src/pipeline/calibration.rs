//! Linear timing model for speech synthesis and its on-disk store.
//!
//! Synthesis time is modelled as `base + per_char * chars`. The coefficients
//! are refitted from observed samples after every completion and persisted
//! per prosody rate, since the rate changes how long a chunk takes to speak.

use crate::defaults;
use crate::error::{LivedubError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One observed synthesis: how long `char_count` characters took.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSample {
    pub char_count: usize,
    /// Seconds from synthesis start to completion.
    pub latency: f64,
}

impl CalibrationSample {
    pub fn observed_per_char(&self) -> f64 {
        self.latency / self.char_count as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationModel {
    pub base_latency_seconds: f64,
    pub per_char_latency_seconds: f64,
    #[serde(default)]
    pub samples: Vec<CalibrationSample>,
}

impl Default for CalibrationModel {
    fn default() -> Self {
        Self {
            base_latency_seconds: defaults::BASE_LATENCY_SECS,
            per_char_latency_seconds: defaults::PER_CHAR_LATENCY_SECS,
            samples: Vec::new(),
        }
    }
}

impl CalibrationModel {
    /// Predicted synthesis time for a chunk of `char_count` characters.
    pub fn predict(&self, char_count: usize) -> Duration {
        let secs =
            self.base_latency_seconds + self.per_char_latency_seconds * char_count as f64;
        Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Checks that the coefficients and samples are usable latencies.
    ///
    /// Everything must be finite, non-negative and at most
    /// [`defaults::MAX_LATENCY_SECS`]. Samples must also have characters.
    pub fn validate(&self) -> std::result::Result<(), String> {
        for (name, value) in [
            ("baseLatencySeconds", self.base_latency_seconds),
            ("perCharLatencySeconds", self.per_char_latency_seconds),
        ] {
            if !is_valid_latency(value) {
                return Err(format!("{name} out of range: {value}"));
            }
        }
        if let Some((i, s)) = self
            .samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.char_count == 0 || !is_valid_latency(s.latency))
        {
            return Err(format!(
                "sample {i} out of range: {} chars in {}s",
                s.char_count, s.latency
            ));
        }
        Ok(())
    }

    /// Adds a sample and refits the coefficients.
    ///
    /// Samples with no characters or a latency outside `0..=MAX_LATENCY_SECS`
    /// are dropped; returns whether the sample was used.
    pub fn record(&mut self, sample: CalibrationSample) -> bool {
        if sample.char_count == 0 || !is_valid_latency(sample.latency) {
            return false;
        }
        self.samples.push(sample);
        if self.samples.len() > defaults::MAX_CALIBRATION_SAMPLES {
            let excess = self.samples.len() - defaults::MAX_CALIBRATION_SAMPLES;
            self.samples.drain(..excess);
        }
        self.refit();
        true
    }

    /// Least-squares fit over the stored samples.
    ///
    /// With fewer than two distinct chunk lengths the intercept cannot be
    /// separated from the slope, so the line is forced through the origin.
    /// A negative slope from noisy data falls back to the same origin fit.
    fn refit(&mut self) {
        let n = self.samples.len() as f64;
        if n == 0.0 {
            return;
        }

        let (sum_x, sum_y, sum_xx, sum_xy) = self.samples.iter().fold(
            (0.0, 0.0, 0.0, 0.0),
            |(sx, sy, sxx, sxy), s| {
                let x = s.char_count as f64;
                (sx + x, sy + s.latency, sxx + x * x, sxy + x * s.latency)
            },
        );

        let denom = n * sum_xx - sum_x * sum_x;
        if denom > f64::EPSILON {
            let slope = (n * sum_xy - sum_x * sum_y) / denom;
            let intercept = (sum_y - slope * sum_x) / n;
            if slope >= 0.0 {
                self.per_char_latency_seconds = slope;
                self.base_latency_seconds = intercept.max(0.0);
                return;
            }
        }

        // sum_xx > 0 because every sample has char_count > 0
        self.per_char_latency_seconds = (sum_xy / sum_xx).max(0.0);
        self.base_latency_seconds = 0.0;
    }

    /// Mean observed synthesis latency across stored samples.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(|s| s.latency).sum();
        Duration::try_from_secs_f64(total / self.samples.len() as f64).ok()
    }
}

fn is_valid_latency(secs: f64) -> bool {
    secs.is_finite() && (0.0..=defaults::MAX_LATENCY_SECS).contains(&secs)
}

/// JSON file holding one [`CalibrationModel`] per synthesis style key.
#[derive(Debug, Clone)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the model for `key`, or `None` if the file or key is absent.
    ///
    /// A record that parses but fails [`CalibrationModel::validate`] is an
    /// error, so callers fall back to the default model.
    pub fn load(&self, key: &str) -> Result<Option<CalibrationModel>> {
        let Some(model) = self.read_all()?.remove(key) else {
            return Ok(None);
        };
        model
            .validate()
            .map_err(|reason| LivedubError::Calibration {
                path: self.path.display().to_string(),
                message: format!("invalid record for {key}: {reason}"),
            })?;
        Ok(Some(model))
    }

    /// Writes the model for `key`, keeping other keys intact.
    pub fn save(&self, key: &str, model: &CalibrationModel) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(key.to_string(), model.clone());
        self.write_all(&all)
    }

    /// Removes the model for `key`. Returns whether anything was removed.
    pub fn reset(&self, key: &str) -> Result<bool> {
        let mut all = self.read_all()?;
        let removed = all.remove(key).is_some();
        if removed {
            self.write_all(&all)?;
        }
        Ok(removed)
    }

    fn read_all(&self) -> Result<BTreeMap<String, CalibrationModel>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.store_error(e)),
        };
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_all(&self, all: &BTreeMap<String, CalibrationModel>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.store_error(e))?;
        }
        let json = serde_json::to_string_pretty(all)?;
        fs::write(&self.path, json).map_err(|e| self.store_error(e))
    }

    fn store_error(&self, e: std::io::Error) -> LivedubError {
        LivedubError::Calibration {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(char_count: usize, latency: f64) -> CalibrationSample {
        CalibrationSample {
            char_count,
            latency,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-6,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_default_model_predicts_from_defaults() {
        let model = CalibrationModel::default();
        assert_close(model.predict(10).as_secs_f64(), 0.5 + 0.6);
        assert!(model.samples.is_empty());
        assert_eq!(model.mean_latency(), None);
    }

    #[test]
    fn test_single_sample_fits_through_origin() {
        let mut model = CalibrationModel::default();
        let s = sample(20, 2.0);
        assert_close(s.observed_per_char(), 0.1);

        assert!(model.record(s));
        assert_close(model.per_char_latency_seconds, 0.1);
        assert_close(model.base_latency_seconds, 0.0);
        assert_close(model.predict(10).as_secs_f64(), 1.0);
    }

    #[test]
    fn test_two_lengths_recover_exact_line() {
        let mut model = CalibrationModel::default();
        model.record(sample(10, 1.5));
        model.record(sample(30, 2.5));
        assert_close(model.per_char_latency_seconds, 0.05);
        assert_close(model.base_latency_seconds, 1.0);
    }

    #[test]
    fn test_fit_converges_with_more_samples() {
        // True line: 0.3 + 0.04 * x, with alternating noise
        let mut model = CalibrationModel::default();
        let mut first_round_error = None;
        for round in 0..5 {
            for (i, x) in [10usize, 20, 40, 80].iter().enumerate() {
                let noise = if (i + round) % 2 == 0 { 0.05 } else { -0.05 };
                model.record(sample(*x, 0.3 + 0.04 * *x as f64 + noise));
            }
            first_round_error.get_or_insert((model.per_char_latency_seconds - 0.04).abs());
        }
        let final_error = (model.per_char_latency_seconds - 0.04).abs();
        assert!(final_error <= first_round_error.unwrap_or(f64::MAX));
        assert!(final_error < 0.005);
        assert!((model.base_latency_seconds - 0.3).abs() < 0.2);
    }

    #[test]
    fn test_negative_slope_falls_back_to_origin_fit() {
        let mut model = CalibrationModel::default();
        model.record(sample(10, 3.0));
        model.record(sample(40, 1.0));
        assert_close(model.base_latency_seconds, 0.0);
        assert!(model.per_char_latency_seconds >= 0.0);
    }

    #[test]
    fn test_invalid_samples_are_dropped() {
        let mut model = CalibrationModel::default();
        assert!(!model.record(sample(0, 1.0)));
        assert!(!model.record(sample(5, -1.0)));
        assert!(!model.record(sample(5, f64::NAN)));
        assert!(!model.record(sample(5, 1e30)));
        assert!(model.samples.is_empty());
        assert_eq!(model, CalibrationModel::default());
    }

    #[test]
    fn test_samples_are_capped() {
        let mut model = CalibrationModel::default();
        for i in 0..(defaults::MAX_CALIBRATION_SAMPLES + 25) {
            model.record(sample(10 + i % 7, 1.0));
        }
        assert_eq!(model.samples.len(), defaults::MAX_CALIBRATION_SAMPLES);
        assert_eq!(model.samples[0].char_count, 10 + 25 % 7);
    }

    #[test]
    fn test_mean_latency() {
        let mut model = CalibrationModel::default();
        model.record(sample(10, 1.0));
        model.record(sample(20, 3.0));
        assert_eq!(model.mean_latency(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_record_serializes_with_camel_case_keys() {
        let mut model = CalibrationModel::default();
        model.record(sample(20, 2.0));
        let json = serde_json::to_string(&model).unwrap();
        assert!(json.contains("baseLatencySeconds"));
        assert!(json.contains("perCharLatencySeconds"));
        assert!(json.contains("\"charCount\":20"));
    }

    #[test]
    fn test_store_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let store = CalibrationStore::new(dir.path().join("missing.json"));
        assert_eq!(store.load("+30%").unwrap(), None);
    }

    #[test]
    fn test_store_roundtrip_keeps_keys_apart() {
        let dir = TempDir::new().unwrap();
        let store = CalibrationStore::new(dir.path().join("nested").join("calibration.json"));

        let mut fast = CalibrationModel::default();
        fast.record(sample(20, 2.0));
        let slow = CalibrationModel::default();

        store.save("+30%", &fast).unwrap();
        store.save("+0%", &slow).unwrap();

        assert_eq!(store.load("+30%").unwrap(), Some(fast));
        assert_eq!(store.load("+0%").unwrap(), Some(slow));
        assert_eq!(store.load("-10%").unwrap(), None);
    }

    #[test]
    fn test_store_reset_removes_key() {
        let dir = TempDir::new().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));
        store.save("+30%", &CalibrationModel::default()).unwrap();

        assert!(store.reset("+30%").unwrap());
        assert!(!store.reset("+30%").unwrap());
        assert_eq!(store.load("+30%").unwrap(), None);
    }

    #[test]
    fn test_store_reports_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calibration.json");
        fs::write(&path, "{ not json").unwrap();
        let store = CalibrationStore::new(path);
        assert!(matches!(
            store.load("+30%"),
            Err(LivedubError::CalibrationFormat(_))
        ));
    }

    #[test]
    fn test_predict_saturates_on_huge_coefficients() {
        let model = CalibrationModel {
            base_latency_seconds: 1e30,
            per_char_latency_seconds: 0.1,
            samples: Vec::new(),
        };
        assert_eq!(model.predict(10), Duration::MAX);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_samples() {
        let mut model = CalibrationModel::default();
        assert!(model.validate().is_ok());

        model.samples.push(sample(0, 1.0));
        assert!(model.validate().unwrap_err().starts_with("sample 0"));

        model.samples[0] = sample(10, f64::INFINITY);
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_store_rejects_out_of_range_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("calibration.json");
        fs::write(
            &path,
            r#"{
                "+30%": {"baseLatencySeconds": 1e30, "perCharLatencySeconds": 0.06, "samples": []},
                "+0%": {"baseLatencySeconds": 0.4, "perCharLatencySeconds": -0.1}
            }"#,
        )
        .unwrap();
        let store = CalibrationStore::new(path);

        let err = store.load("+30%").unwrap_err();
        assert!(matches!(err, LivedubError::Calibration { .. }));
        assert!(err.to_string().contains("baseLatencySeconds"));
        assert!(store.load("+0%").is_err());

        // A bad record can still be reset
        assert!(store.reset("+30%").unwrap());
        assert_eq!(store.load("+30%").unwrap(), None);
    }
}
