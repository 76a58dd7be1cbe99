//! Error type shared by the engine.

use thiserror::Error;

/// Errors surfaced by the neuroevolution engine.
///
/// Structural mutation no-ops and quota rounding are not errors; they are
/// reported through [`super::mutation::MutationReport`] and logs instead.
#[derive(Debug, Error)]
pub enum NeatError {
    /// The input vector handed to a network does not match the configured input count.
    #[error("expected {expected} network inputs, got {actual}")]
    Dimension {
        /// Configured input count.
        expected: usize,
        /// Length of the vector that was supplied.
        actual: usize,
    },
    /// Configuration values that cannot be used.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// A generation transition was requested without any scored genome.
    #[error("cannot build a generation from an empty population")]
    EmptyPopulation,
    /// Reading or writing a parameter file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A parameter file could not be parsed or produced.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
