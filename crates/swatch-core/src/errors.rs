//! Error types for beat-time parsing.

use thiserror::Error;

/// Errors produced when parsing a `YYYY-MM-DD@beats` string.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ParseBeatTimeError {
    /// The `@` between date and beat count is missing.
    #[error("missing '@' separator in {0:?}")]
    MissingSeparator(String),
    /// The date part is not a valid `YYYY-MM-DD` calendar date.
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    /// The beat part is not `<0-999>.<digit>`.
    #[error("invalid beat count: {0:?}")]
    InvalidBeats(String),
}
