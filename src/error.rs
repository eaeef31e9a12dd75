use thiserror::Error;

/// Conversion failures between decimal odds and probabilities.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum OddsError {
    #[error("invalid decimal odds: {0} (must be greater than 1.0)")]
    InvalidOdds(f64),

    #[error("invalid probability: {0} (must lie strictly between 0 and 1)")]
    InvalidProbability(f64),
}

/// Raised when two trial populations cannot be compared index by index.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairingError {
    #[error("trial populations differ in length: first innings {first}, second innings {second}")]
    LengthMismatch { first: usize, second: usize },

    #[error("cannot compare empty trial populations")]
    Empty,
}
