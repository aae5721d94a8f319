//! Error types for eva-core.

use thiserror::Error;

/// Result type alias for eva-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the correction pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// An enum-like parameter had an unrecognised value, or a numeric
    /// parameter was out of range.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Normalisation by events was requested but the event count is
    /// unavailable.
    #[error("normalisation by events failed: {0}")]
    Normalisation(String),

    /// Position and intensity axes differ in length.
    #[error("detector {detector}: x has {x} points but y has {y}")]
    LengthMismatch {
        detector: String,
        x: usize,
        y: usize,
    },
}

impl Error {
    /// Returns true if this is a normalisation failure.
    #[must_use]
    pub fn is_normalisation(&self) -> bool {
        matches!(self, Self::Normalisation(_))
    }
}
