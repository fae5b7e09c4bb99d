//! Error types for the tweet indexer pipeline.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use tweet_indexer_repository::IndexError;
use tweet_indexer_shared::Document;

/// Errors that can occur in the tweet indexer pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Error from the event source.
    #[error("Source error: {0}")]
    SourceError(String),

    /// Error from the index target.
    #[error("Index error: {0}")]
    IndexError(#[from] IndexError),

    /// A worker could not deliver a batch.
    #[error(transparent)]
    FatalWrite(#[from] FatalWriteError),

    /// Invalid configuration, detected before any event is accepted.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error parsing or decoding data.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// The pipeline was already started once.
    #[error("Pipeline has already been started")]
    AlreadyStarted,
}

impl PipelineError {
    /// Create a source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::SourceError(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }
}

#[cfg(feature = "kafka")]
impl From<rdkafka::error::KafkaError> for PipelineError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::SourceError(err.to_string())
    }
}

/// Why a batch could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    /// Every attempt failed with a transient error.
    RetriesExhausted,
    /// The flush time budget ran out while retries were still pending.
    TimedOut,
    /// The index permanently refused the batch.
    Rejected,
}

impl fmt::Display for FatalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            FatalReason::RetriesExhausted => "retry budget exhausted",
            FatalReason::TimedOut => "flush timed out",
            FatalReason::Rejected => "rejected by index",
        };
        f.write_str(reason)
    }
}

/// A batch that could not be written to the index.
///
/// Carries the full undelivered batch so an external recovery process can
/// re-drive it.
#[derive(Error, Debug, Clone)]
#[error(
    "Worker {worker} failed to deliver batch {batch_id} ({} documents) after {attempts} attempts: {reason}",
    .documents.len()
)]
pub struct FatalWriteError {
    /// Worker that owned the batch.
    pub worker: usize,
    /// Identifier of the undelivered batch.
    pub batch_id: Uuid,
    /// The undelivered documents, in receipt order.
    pub documents: Vec<Document>,
    /// Number of write attempts made.
    pub attempts: u32,
    pub reason: FatalReason,
    /// The last error the index returned, if any attempt completed.
    #[source]
    pub last_error: Option<IndexError>,
}
