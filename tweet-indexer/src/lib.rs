//! # Tweet Indexer
//!
//! Main library for the tweet stream indexer.
//!
//! This crate provides the entry point and configuration for running
//! the tweet indexer pipeline.

pub mod config;

pub use config::{Dependencies, IndexerConfig, LogFormat, SourceConfig};

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    PipelineError(#[from] tweet_indexer_pipeline::PipelineError),

    /// Index error.
    #[error("Index error: {0}")]
    IndexError(#[from] tweet_indexer_repository::IndexError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tweet_indexer_pipeline::PipelineError;
    use tweet_indexer_repository::IndexError;

    #[test]
    fn test_error_conversions() {
        let err: IndexingError = PipelineError::AlreadyStarted.into();
        assert!(matches!(
            err,
            IndexingError::PipelineError(PipelineError::AlreadyStarted)
        ));

        let err: IndexingError = IndexError::rejected("bad mapping").into();
        assert!(matches!(err, IndexingError::IndexError(_)));

        assert_eq!(
            IndexingError::config("missing INDEX_URL").to_string(),
            "Configuration error: missing INDEX_URL"
        );
    }
}
