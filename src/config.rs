use crate::defaults;
use crate::error::{LivedubError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub translation: TranslationConfig,
    pub synthesis: SynthesisConfig,
    pub pipeline: PipelineSettings,
    pub calibration: CalibrationConfig,
}

/// Recognizer/translation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranslationConfig {
    pub source_language: String,
    pub target_language: String,
    /// Speak stabilized partial translations before the final arrives.
    pub intermediate_translations: bool,
}

/// Speech synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SynthesisConfig {
    pub voice: String,
    pub prosody_rate: String,
}

/// Controller behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub verbose: bool,
    pub event_buffer: usize,
    pub drain_timeout_ms: u64,
}

/// Calibration persistence
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CalibrationConfig {
    pub path: Option<PathBuf>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: defaults::SOURCE_LANGUAGE.to_string(),
            target_language: defaults::TARGET_LANGUAGE.to_string(),
            intermediate_translations: true,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice: defaults::VOICE.to_string(),
            prosody_rate: defaults::PROSODY_RATE.to_string(),
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            verbose: true,
            event_buffer: defaults::EVENT_BUFFER,
            drain_timeout_ms: defaults::DRAIN_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values. The loaded values are validated.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML or invalid values are still reported as errors.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(LivedubError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.translation.target_language.trim().is_empty() {
            return Err(LivedubError::ConfigInvalidValue {
                key: "translation.target_language".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.synthesis.prosody_rate.trim().is_empty() {
            return Err(LivedubError::ConfigInvalidValue {
                key: "synthesis.prosody_rate".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.pipeline.event_buffer == 0 {
            return Err(LivedubError::ConfigInvalidValue {
                key: "pipeline.event_buffer".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LIVEDUB_SOURCE_LANGUAGE → translation.source_language
    /// - LIVEDUB_TARGET_LANGUAGE → translation.target_language
    /// - LIVEDUB_PROSODY_RATE → synthesis.prosody_rate
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(language) = std::env::var("LIVEDUB_SOURCE_LANGUAGE")
            && !language.is_empty()
        {
            self.translation.source_language = language;
        }

        if let Ok(language) = std::env::var("LIVEDUB_TARGET_LANGUAGE")
            && !language.is_empty()
        {
            self.translation.target_language = language;
        }

        if let Ok(rate) = std::env::var("LIVEDUB_PROSODY_RATE")
            && !rate.is_empty()
        {
            self.synthesis.prosody_rate = rate;
        }

        self
    }

    /// Where calibration data is read from and written to.
    pub fn calibration_path(&self) -> PathBuf {
        self.calibration.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(defaults::APP_DIR)
                .join("calibration.json")
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/livedub/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(defaults::APP_DIR)
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_livedub_env() {
        remove_env("LIVEDUB_SOURCE_LANGUAGE");
        remove_env("LIVEDUB_TARGET_LANGUAGE");
        remove_env("LIVEDUB_PROSODY_RATE");
    }

    fn write_temp(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.translation.source_language, "de-DE");
        assert_eq!(config.translation.target_language, "en");
        assert!(config.translation.intermediate_translations);

        assert_eq!(config.synthesis.voice, "en-US-GuyNeural");
        assert_eq!(config.synthesis.prosody_rate, "+30%");

        assert!(config.pipeline.verbose);
        assert_eq!(config.pipeline.event_buffer, 256);
        assert_eq!(config.pipeline.drain_timeout_ms, 2000);

        assert_eq!(config.calibration.path, None);
    }

    #[test]
    fn test_load_from_toml_file() {
        let temp_file = write_temp(
            r#"
            [translation]
            source_language = "fr-FR"
            target_language = "de"
            intermediate_translations = false

            [synthesis]
            voice = "de-DE-ConradNeural"
            prosody_rate = "+10%"

            [pipeline]
            verbose = false
            event_buffer = 32
            drain_timeout_ms = 500

            [calibration]
            path = "/var/lib/livedub/cal.json"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.translation.source_language, "fr-FR");
        assert_eq!(config.translation.target_language, "de");
        assert!(!config.translation.intermediate_translations);
        assert_eq!(config.synthesis.voice, "de-DE-ConradNeural");
        assert_eq!(config.synthesis.prosody_rate, "+10%");
        assert!(!config.pipeline.verbose);
        assert_eq!(config.pipeline.event_buffer, 32);
        assert_eq!(config.pipeline.drain_timeout_ms, 500);
        assert_eq!(
            config.calibration_path(),
            PathBuf::from("/var/lib/livedub/cal.json")
        );
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let temp_file = write_temp(
            r#"
            [synthesis]
            prosody_rate = "+50%"
        "#,
        );

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.synthesis.prosody_rate, "+50%");
        assert_eq!(config.synthesis.voice, "en-US-GuyNeural");
        assert_eq!(config.translation, TranslationConfig::default());
        assert_eq!(config.pipeline, PipelineSettings::default());
    }

    #[test]
    fn test_validate_rejects_empty_target_language() {
        let temp_file = write_temp(
            r#"
            [translation]
            target_language = "  "
        "#,
        );

        let err = Config::load(temp_file.path()).unwrap_err();
        assert!(matches!(
            err,
            LivedubError::ConfigInvalidValue { ref key, .. } if key == "translation.target_language"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_event_buffer() {
        let mut config = Config::default();
        config.pipeline.event_buffer = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_prosody_rate() {
        let mut config = Config::default();
        config.synthesis.prosody_rate = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_override_languages() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_livedub_env();

        set_env("LIVEDUB_SOURCE_LANGUAGE", "es-ES");
        set_env("LIVEDUB_TARGET_LANGUAGE", "fr");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.translation.source_language, "es-ES");
        assert_eq!(config.translation.target_language, "fr");
        assert_eq!(config.synthesis.prosody_rate, "+30%"); // Not overridden

        clear_livedub_env();
    }

    #[test]
    fn test_env_override_prosody_rate() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_livedub_env();

        set_env("LIVEDUB_PROSODY_RATE", "+0%");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.synthesis.prosody_rate, "+0%");

        clear_livedub_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_livedub_env();

        set_env("LIVEDUB_TARGET_LANGUAGE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.translation.target_language, "en");

        clear_livedub_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let temp_file = write_temp(
            r#"
            [translation
            target_language = "broken
        "#,
        );

        let result = Config::load(temp_file.path());
        assert!(matches!(result, Err(LivedubError::Config(_))));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_livedub_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_missing_file_is_io_not_found() {
        let missing_path = Path::new("/tmp/nonexistent_livedub_config_12345.toml");
        match Config::load(missing_path) {
            Err(LivedubError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_or_default_reports_invalid_toml() {
        let temp_file = write_temp("[pipeline\nverbose = ");
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_default_paths_end_with_app_dir() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains("livedub"));
        assert!(path.to_string_lossy().ends_with("config.toml"));

        let cal = Config::default().calibration_path();
        assert!(cal.to_string_lossy().ends_with("calibration.json"));
    }
}
