//! Error types for livedub.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LivedubError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Calibration persistence errors
    #[error("Calibration store error at {path}: {message}")]
    Calibration { path: String, message: String },

    #[error("Calibration format error: {0}")]
    CalibrationFormat(#[from] serde_json::Error),

    // Collaborator errors
    #[error("Recognizer error: {message}")]
    Recognizer { message: String },

    #[error("Synthesis error: {message}")]
    Synthesis { message: String },

    // Lifecycle errors
    #[error("Pipeline is {state}, cannot {action}")]
    PipelineState { state: String, action: String },

    #[error("Replay script error on line {line}: {message}")]
    Script { line: usize, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LivedubError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = LivedubError::ConfigInvalidValue {
            key: "translation.target_language".to_string(),
            message: "must not be empty".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for translation.target_language: must not be empty"
        );
    }

    #[test]
    fn test_calibration_display() {
        let error = LivedubError::Calibration {
            path: "/tmp/calibration.json".to_string(),
            message: "permission denied".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Calibration store error at /tmp/calibration.json: permission denied"
        );
    }

    #[test]
    fn test_pipeline_state_display() {
        let error = LivedubError::PipelineState {
            state: "running".to_string(),
            action: "start".to_string(),
        };
        assert_eq!(error.to_string(), "Pipeline is running, cannot start");
    }

    #[test]
    fn test_script_display() {
        let error = LivedubError::Script {
            line: 3,
            message: "unknown kind".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Replay script error on line 3: unknown kind"
        );
    }

    #[test]
    fn test_collaborator_display() {
        let error = LivedubError::Recognizer {
            message: "session rejected".to_string(),
        };
        assert_eq!(error.to_string(), "Recognizer error: session rejected");

        let error = LivedubError::Synthesis {
            message: "voice unavailable".to_string(),
        };
        assert_eq!(error.to_string(), "Synthesis error: voice unavailable");
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: LivedubError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: LivedubError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: LivedubError = json_error.into();
        assert!(error.to_string().starts_with("Calibration format error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: LivedubError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<LivedubError>();
        assert_sync::<LivedubError>();
    }
}
