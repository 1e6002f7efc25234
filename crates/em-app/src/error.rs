//! Error types for the em-app service layer.

use std::path::PathBuf;

/// Application error type that wraps errors from the backend crates and
/// gives the CLI one error surface.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Failed to read config file: {path}")]
    ConfigFileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("Results error: {0}")]
    Results(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for em-app operations.
pub type AppResult<T> = Result<T, AppError>;

impl From<em_core::CoreError> for AppError {
    fn from(err: em_core::CoreError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<em_sim::SimError> for AppError {
    fn from(err: em_sim::SimError) -> Self {
        AppError::Simulation(err.to_string())
    }
}

impl From<em_results::ResultsError> for AppError {
    fn from(err: em_results::ResultsError) -> Self {
        AppError::Results(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Config(format!("Failed to parse config YAML: {}", err))
    }
}
