//! Error taxonomy for workload construction and execution.

use thiserror::Error;

/// Errors raised while validating or driving a workload.
///
/// `InvalidMix` and `InvalidConfig` are reported before any worker thread
/// starts. `EmptyKeySpace` aborts a running workload: it means the mix asked
/// for an existing key while nothing is live between the deletion cursor and
/// the creation counter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    /// Operation percentages must add up to exactly 100.
    #[error("operation mix adds up to {got}, expected exactly 100")]
    InvalidMix { got: u32 },

    /// A configuration field holds a value the engine cannot run with.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A read, update or delete was requested but no live keys remain.
    #[error("key space is empty, no live keys to draw from")]
    EmptyKeySpace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WorkloadError::InvalidMix { got: 99 };
        assert_eq!(
            err.to_string(),
            "operation mix adds up to 99, expected exactly 100"
        );

        let err = WorkloadError::InvalidConfig("workers must be at least 1".into());
        assert!(err.to_string().contains("workers"));
    }
}
