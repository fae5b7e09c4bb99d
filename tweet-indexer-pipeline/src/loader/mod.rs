//! Loader module for the tweet indexer pipeline.
//!
//! Batches documents per worker and writes them to the index, retrying
//! transient failures with exponential backoff.

mod batch;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::{FatalReason, FatalWriteError, PipelineError};
use tweet_indexer_repository::{IndexError, IndexTarget};
use tweet_indexer_shared::Document;

pub use batch::Batch;

/// Configuration for the batch indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Number of documents that triggers a flush.
    pub max_batch_size: usize,
    /// Retries after the first attempt of a flush.
    pub max_retries: u32,
    /// Delay before the first retry (in milliseconds).
    pub initial_retry_delay_ms: u64,
    /// Upper bound for a single retry delay (in milliseconds).
    pub max_retry_delay_ms: u64,
    /// Time budget for one flush, retries included (in milliseconds).
    pub flush_timeout_ms: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 100,
            max_retries: 3,
            initial_retry_delay_ms: 100,
            max_retry_delay_ms: 5000,
            flush_timeout_ms: 30_000,
        }
    }
}

impl LoaderConfig {
    /// Check the configuration before any event is accepted.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.max_batch_size == 0 {
            return Err(PipelineError::config("max_batch_size must be positive"));
        }
        if self.initial_retry_delay_ms == 0 {
            return Err(PipelineError::config("initial_retry_delay_ms must be positive"));
        }
        if self.max_retry_delay_ms < self.initial_retry_delay_ms {
            return Err(PipelineError::config(format!(
                "max_retry_delay_ms ({}) is below initial_retry_delay_ms ({})",
                self.max_retry_delay_ms, self.initial_retry_delay_ms
            )));
        }
        if self.flush_timeout_ms == 0 {
            return Err(PipelineError::config("flush_timeout_ms must be positive"));
        }
        Ok(())
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    /// Delay after the given failed attempt (1-based).
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let delay = self
            .initial_retry_delay_ms
            .saturating_mul(factor)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Result of a successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub batch_id: Uuid,
    /// Number of documents written.
    pub documents: usize,
    /// Write attempts it took.
    pub attempts: u32,
}

/// Counters kept by one indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexerStats {
    pub flushes: u64,
    pub documents_indexed: u64,
    pub retries: u64,
    pub failed_flushes: u64,
}

/// Per-worker batching writer.
///
/// The indexer owns the current [`Batch`]. A flush hands the whole batch to
/// the index target and either delivers it or returns it inside a
/// [`FatalWriteError`]; a batch is never dropped silently.
pub struct BatchIndexer {
    worker: usize,
    target: Arc<dyn IndexTarget>,
    config: LoaderConfig,
    batch: Batch,
    stats: IndexerStats,
}

impl BatchIndexer {
    pub fn new(worker: usize, target: Arc<dyn IndexTarget>, config: LoaderConfig) -> Self {
        let batch = Batch::new(config.max_batch_size);
        Self {
            worker,
            target,
            config,
            batch,
            stats: IndexerStats::default(),
        }
    }

    /// Documents waiting in the current batch.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn stats(&self) -> IndexerStats {
        self.stats
    }

    /// Add a document, flushing once the batch reaches `max_batch_size`.
    pub async fn append(
        &mut self,
        document: Document,
    ) -> Result<Option<FlushOutcome>, FatalWriteError> {
        let mut outcome = None;
        let mut pending = Some(document);

        while let Some(document) = pending.take() {
            if let Err(document) = self.batch.push(document) {
                outcome = self.flush().await?;
                pending = Some(document);
            }
        }

        if self.batch.is_full() {
            return self.flush().await;
        }
        Ok(outcome)
    }

    /// Write the current batch. Flushing an empty batch is a no-op.
    #[instrument(skip(self), fields(worker = self.worker))]
    pub async fn flush(&mut self) -> Result<Option<FlushOutcome>, FatalWriteError> {
        if self.batch.is_empty() {
            return Ok(None);
        }

        let batch = std::mem::replace(&mut self.batch, Batch::new(self.config.max_batch_size));
        let batch_id = batch.id();
        let mut attempts = 0u32;
        let mut last_error = None;

        debug!(batch_id = %batch_id, count = batch.len(), "Flushing batch");

        let result = tokio::time::timeout(
            self.config.flush_timeout(),
            write_with_retry(
                self.target.as_ref(),
                &self.config,
                batch.documents(),
                &mut attempts,
                &mut last_error,
                &mut self.stats,
            ),
        )
        .await;

        let reason = match result {
            Ok(Ok(())) => {
                self.stats.flushes += 1;
                self.stats.documents_indexed += batch.len() as u64;
                info!(
                    batch_id = %batch_id,
                    count = batch.len(),
                    attempts = attempts,
                    collection = %self.target.collection(),
                    "Indexed batch"
                );
                return Ok(Some(FlushOutcome {
                    batch_id,
                    documents: batch.len(),
                    attempts,
                }));
            }
            Ok(Err(reason)) => reason,
            Err(_) => FatalReason::TimedOut,
        };

        self.stats.failed_flushes += 1;
        let err = FatalWriteError {
            worker: self.worker,
            batch_id,
            documents: batch.into_documents(),
            attempts,
            reason,
            last_error,
        };
        error!(error = %err, "Failed to deliver batch");
        Err(err)
    }
}

/// Write `documents` until success, a permanent error, or the retry budget
/// runs out. Every attempt sends the identical slice.
async fn write_with_retry(
    target: &dyn IndexTarget,
    config: &LoaderConfig,
    documents: &[Document],
    attempts: &mut u32,
    last_error: &mut Option<IndexError>,
    stats: &mut IndexerStats,
) -> Result<(), FatalReason> {
    loop {
        *attempts += 1;

        let err = match target.bulk_index(documents).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if !err.is_transient() {
            warn!(attempt = *attempts, error = %err, "Index rejected batch");
            *last_error = Some(err);
            return Err(FatalReason::Rejected);
        }

        if *attempts > config.max_retries {
            warn!(attempt = *attempts, error = %err, "Retry budget exhausted");
            *last_error = Some(err);
            return Err(FatalReason::RetriesExhausted);
        }

        let delay = config.retry_delay(*attempts);
        warn!(
            attempt = *attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Transient index error, retrying"
        );
        *last_error = Some(err);
        stats.retries += 1;
        tokio::time::sleep(delay).await;
    }
}
