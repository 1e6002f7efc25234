//! Error types for simulation operations.

use em_core::CoreError;
use thiserror::Error;

/// Errors encountered while setting up or running an integration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Invalid state: {what}")]
    InvalidState { what: &'static str },

    #[error("Non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("{backend} initialization failed ({resource}): {message}")]
    BackendInit {
        backend: &'static str,
        resource: &'static str,
        message: String,
    },
}

pub type SimResult<T> = Result<T, SimError>;

impl From<CoreError> for SimError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NonFinite { what, value } => SimError::NonFinite { what, value },
            CoreError::InvalidArg { what } => SimError::InvalidArg { what },
            CoreError::LengthMismatch { what, .. } => SimError::InvalidArg { what },
        }
    }
}
