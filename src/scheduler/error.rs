//! Error types for the path scheduler.

/// Scheduler-related errors
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Lock request rejected for routine {routine}")]
    ConflictRejected { routine: String },

    #[error("Routine {routine} does not hold '{path}'")]
    OwnershipViolation { routine: String, path: String },

    #[error("Malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("Scheduler has shut down")]
    ChannelClosed,
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership_violation_display() {
        let error = SchedulerError::OwnershipViolation {
            routine: "r-1".to_string(),
            path: "/a/b".to_string(),
        };
        assert_eq!(error.to_string(), "Routine r-1 does not hold '/a/b'");
    }

    #[test]
    fn test_malformed_path_display() {
        let error = SchedulerError::MalformedPath {
            path: "a//b".to_string(),
            reason: "empty path segment".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Malformed path 'a//b': empty path segment"
        );
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchedulerError>();
    }
}
