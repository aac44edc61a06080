//! Error types shared by the model, the decoders and the generator.

use thiserror::Error;

/// Result type alias for HMM operations.
pub type Result<T> = std::result::Result<T, HmmError>;

#[derive(Debug, Error)]
pub enum HmmError {
    /// A probability table or alphabet violates the model invariants.
    #[error("invalid model: {message}")]
    InvalidModel { message: String },

    /// Caller-supplied sequence, state, symbol or length is not usable.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Linear-domain products fell below the smallest normal f64.
    #[error("numeric degradation: probabilities underflowed at step {step}")]
    NumericDegradation { step: usize },

    /// Malformed run configuration.
    #[error("config error: {message}")]
    Config { message: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HmmError {
    pub(crate) fn model(message: impl Into<String>) -> Self {
        HmmError::InvalidModel { message: message.into() }
    }

    pub(crate) fn input(message: impl Into<String>) -> Self {
        HmmError::InvalidInput { message: message.into() }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        HmmError::Config { message: message.into() }
    }
}
