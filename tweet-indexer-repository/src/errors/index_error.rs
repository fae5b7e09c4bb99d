//! Index error types.
//!
//! This module defines the errors an index target can report. Each variant is
//! either transient (worth retrying the identical request) or permanent.

use thiserror::Error;

/// Errors that can occur while writing to the index.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// The cluster could not be reached.
    #[error("Index unavailable: {0}")]
    Unavailable(String),

    /// The cluster is reachable but refuses work for now (429/503).
    #[error("Index overloaded: {0}")]
    Overloaded(String),

    /// The request did not complete in time.
    #[error("Index request timed out: {0}")]
    Timeout(String),

    /// The cluster permanently rejected the batch (e.g., mapping conflict).
    #[error("Batch rejected: {0}")]
    Rejected(String),

    /// Failed to serialize documents for the cluster.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Failed to create the target collection.
    #[error("Index creation error: {0}")]
    IndexCreation(String),

    /// The target address or collection is invalid.
    #[error("Invalid index target: {0}")]
    InvalidTarget(String),
}

impl IndexError {
    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an overloaded error.
    pub fn overloaded(msg: impl Into<String>) -> Self {
        Self::Overloaded(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a rejected error.
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create an invalid target error.
    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    /// Classify an unsuccessful HTTP status returned by the cluster.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let msg = format!("status {}: {}", status, body.into());
        match status {
            429 | 503 => Self::Overloaded(msg),
            408 => Self::Timeout(msg),
            500..=599 => Self::Unavailable(msg),
            _ => Self::Rejected(msg),
        }
    }

    /// Whether retrying the identical request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            IndexError::Unavailable(_) | IndexError::Overloaded(_) | IndexError::Timeout(_) => {
                true
            }
            IndexError::Rejected(_)
            | IndexError::Serialization(_)
            | IndexError::IndexCreation(_)
            | IndexError::InvalidTarget(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(IndexError::from_status(429, ""), IndexError::Overloaded(_)));
        assert!(matches!(IndexError::from_status(503, ""), IndexError::Overloaded(_)));
        assert!(matches!(IndexError::from_status(502, ""), IndexError::Unavailable(_)));
        assert!(matches!(IndexError::from_status(408, ""), IndexError::Timeout(_)));
        assert!(matches!(IndexError::from_status(400, ""), IndexError::Rejected(_)));
        assert!(matches!(IndexError::from_status(500, ""), IndexError::Unavailable(_)));
        assert!(matches!(IndexError::from_status(404, ""), IndexError::Rejected(_)));
    }

    #[test]
    fn test_transient() {
        assert!(IndexError::unavailable("down").is_transient());
        assert!(IndexError::overloaded("busy").is_transient());
        assert!(IndexError::timeout("slow").is_transient());
        assert!(!IndexError::rejected("mapping").is_transient());
        assert!(!IndexError::Serialization("bad".into()).is_transient());
    }

    #[test]
    fn test_display_includes_status() {
        let err = IndexError::from_status(400, "mapper_parsing_exception");
        assert_eq!(
            err.to_string(),
            "Batch rejected: status 400: mapper_parsing_exception"
        );
    }
}
