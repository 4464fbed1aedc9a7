//! Error types for the cache and indicator engine.
//!
//! `IndicatorError` is `Clone` because a single failing computation is
//! observed by every caller that was waiting on it.

use thiserror::Error;

/// Errors surfaced by `Indicator::value` and the index cache.
///
/// Numeric "no meaningful value yet" is never an error: it flows through the
/// cache as `f64::NAN` like any other value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("index {index} is beyond the end of the series (end index: {end:?})")]
    OutOfRange { index: usize, end: Option<usize> },

    #[error("index {index} was requested again by the thread computing it")]
    Reentrant { index: usize },

    #[error("computation of index {index} was abandoned by a panicking thread")]
    Abandoned { index: usize },

    #[error("calculation failed: {0}")]
    Calculation(String),
}

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, IndicatorError>;

/// Errors from bar series mutations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeriesError {
    #[error("bar time {new} is not after the series end time {last}")]
    NonIncreasingTime {
        new: chrono::NaiveDateTime,
        last: chrono::NaiveDateTime,
    },

    #[error("maximum bar count must be strictly positive")]
    ZeroMaximumBarCount,

    #[error("cannot replace the last bar of an empty series")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_index_and_end() {
        let err = IndicatorError::OutOfRange {
            index: 12,
            end: Some(9),
        };
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("9"));
    }

    #[test]
    fn errors_are_cloneable_for_waiters() {
        let err = IndicatorError::Calculation("boom".into());
        assert_eq!(err.clone(), err);
    }
}
