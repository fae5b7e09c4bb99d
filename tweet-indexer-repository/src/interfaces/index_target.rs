//! Index target trait definition.
//!
//! This module defines the abstract interface the pipeline writes document
//! batches through, allowing for different backend implementations
//! (OpenSearch, test doubles, etc.).

use async_trait::async_trait;

use crate::errors::IndexError;
use tweet_indexer_shared::Document;

/// Abstract interface for the distributed index a pipeline writes to.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so one target can be shared by
/// every worker of a pipeline.
///
/// # Error Handling
///
/// Implementations classify failures through [`IndexError`]; callers decide
/// whether to retry with [`IndexError::is_transient`].
#[async_trait]
pub trait IndexTarget: Send + Sync {
    /// The logical collection documents are written to.
    fn collection(&self) -> &str;

    /// Write a batch of documents in a single bulk request.
    ///
    /// Documents are keyed by their identifier, so writing the same batch
    /// twice leaves the index in the same state as writing it once.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If every document was written
    /// * `Err(IndexError)` - If the request failed or any document was refused
    async fn bulk_index(&self, documents: &[Document]) -> Result<(), IndexError>;

    /// Ensure the collection exists with mappings for the dynamic field
    /// suffixes.
    ///
    /// This should be called during application startup.
    async fn ensure_index_exists(&self) -> Result<(), IndexError>;

    /// Check if the cluster is healthy and reachable.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the cluster is healthy
    /// * `Ok(false)` - If the cluster is reachable but unhealthy
    /// * `Err(IndexError)` - If the health check fails to execute
    async fn health_check(&self) -> Result<bool, IndexError>;
}
