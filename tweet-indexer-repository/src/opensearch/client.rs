//! OpenSearch client implementation.
//!
//! This module provides the concrete implementation of `IndexTarget`
//! using the OpenSearch Rust client and its bulk API.

use async_trait::async_trait;
use opensearch::{
    cluster::ClusterHealthParts,
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    BulkParts, OpenSearch,
};
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::config::IndexTargetConfig;
use crate::errors::IndexError;
use crate::interfaces::IndexTarget;
use crate::opensearch::index_config::get_index_settings;
use tweet_indexer_shared::Document;

/// OpenSearch index target.
///
/// # Example
///
/// ```ignore
/// use tweet_indexer_repository::{IndexTarget, IndexTargetConfig, OpenSearchTarget};
///
/// let config = IndexTargetConfig::new("http://localhost:9200", "tweets");
/// let target = OpenSearchTarget::new(config)?;
/// target.ensure_index_exists().await?;
/// target.bulk_index(&documents).await?;
/// ```
pub struct OpenSearchTarget {
    client: OpenSearch,
    config: IndexTargetConfig,
}

impl OpenSearchTarget {
    /// Create a new target connected to the configured cluster.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchTarget)` - A new target instance
    /// * `Err(IndexError::InvalidTarget)` - If the address is invalid or the
    ///   transport cannot be built
    pub fn new(config: IndexTargetConfig) -> Result<Self, IndexError> {
        let parsed_url = config.parsed_url()?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| IndexError::invalid_target(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %config.url,
            collection = %config.collection,
            "Created OpenSearch target"
        );

        Ok(Self { client, config })
    }

    /// Build the NDJSON bulk body: one action line plus one source line per
    /// document, in batch order.
    fn bulk_body(documents: &[Document]) -> Result<Vec<JsonBody<Value>>, IndexError> {
        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);

        for doc in documents {
            body.push(json!({ "index": { "_id": doc.id() } }).into());
            let source = serde_json::to_value(doc)
                .map_err(|e| IndexError::Serialization(format!("{}: {}", doc.id(), e)))?;
            body.push(source.into());
        }

        Ok(body)
    }

    /// Inspect a bulk response body for per-item failures.
    ///
    /// A response where every failed item was throttled (429) is transient;
    /// any other item failure rejects the batch.
    fn check_bulk_response(response: &Value) -> Result<(), IndexError> {
        if !response
            .get("errors")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            return Ok(());
        }

        let empty = Vec::new();
        let items = response
            .get("items")
            .and_then(Value::as_array)
            .unwrap_or(&empty);

        let failures: Vec<(u64, String)> = items
            .iter()
            .filter_map(|item| {
                let result = item.get("index")?;
                let error = result.get("error")?;
                let status = result.get("status").and_then(Value::as_u64).unwrap_or(0);
                let reason = error
                    .get("reason")
                    .and_then(Value::as_str)
                    .or_else(|| error.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                Some((status, reason))
            })
            .collect();

        let Some((_, first_reason)) = failures.first() else {
            warn!("Bulk response flagged errors without failed items");
            return Ok(());
        };

        let msg = format!(
            "{} of {} documents failed, first: {}",
            failures.len(),
            items.len(),
            first_reason
        );

        if failures.iter().all(|(status, _)| *status == 429) {
            Err(IndexError::overloaded(msg))
        } else {
            Err(IndexError::rejected(msg))
        }
    }

    fn transport_error(e: opensearch::Error) -> IndexError {
        let msg = e.to_string();
        if msg.to_lowercase().contains("timed out") {
            IndexError::timeout(msg)
        } else {
            IndexError::unavailable(msg)
        }
    }
}

#[async_trait]
impl IndexTarget for OpenSearchTarget {
    fn collection(&self) -> &str {
        &self.config.collection
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn bulk_index(&self, documents: &[Document]) -> Result<(), IndexError> {
        if documents.is_empty() {
            return Ok(());
        }

        let body = Self::bulk_body(documents)?;

        let response = self
            .client
            .bulk(BulkParts::Index(&self.config.collection))
            .body(body)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Bulk request failed");
            return Err(IndexError::from_status(status.as_u16(), error_body));
        }

        let response_body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::unavailable(format!("Unreadable bulk response: {}", e)))?;

        Self::check_bulk_response(&response_body)?;

        debug!(count = documents.len(), "Bulk request succeeded");
        Ok(())
    }

    async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        let collection = self.config.collection.as_str();

        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[collection]))
            .send()
            .await
            .map_err(Self::transport_error)?;

        if exists.status_code().is_success() {
            debug!(collection = %collection, "Collection already exists");
            return Ok(());
        }

        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(collection))
            .body(get_index_settings())
            .send()
            .await
            .map_err(Self::transport_error)?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            // Another worker or process may have created it first.
            if error_body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(IndexError::IndexCreation(format!(
                "status {}: {}",
                status, error_body
            )));
        }

        info!(collection = %collection, "Created collection");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(Self::transport_error)?;

        if !response.status_code().is_success() {
            return Ok(false);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| IndexError::unavailable(e.to_string()))?;

        let status = body.get("status").and_then(Value::as_str).unwrap_or("red");
        debug!(status = %status, "Cluster health");
        Ok(status != "red")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, text: &str) -> Document {
        let mut doc = Document::new(id);
        doc.insert("text_s", text).unwrap();
        doc
    }

    #[test]
    fn test_bulk_body_pairs_action_and_source() {
        let docs = vec![doc("tweet-1", "a"), doc("tweet-2", "b")];

        let body = OpenSearchTarget::bulk_body(&docs).unwrap();

        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_bulk_response_without_errors() {
        let response = json!({ "took": 3, "errors": false, "items": [] });
        assert!(OpenSearchTarget::check_bulk_response(&response).is_ok());
    }

    #[test]
    fn test_bulk_response_throttled_items_are_transient() {
        let response = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "tweet-1", "status": 201 } },
                { "index": { "_id": "tweet-2", "status": 429,
                    "error": { "type": "es_rejected_execution_exception", "reason": "queue full" } } }
            ]
        });

        let err = OpenSearchTarget::check_bulk_response(&response).unwrap_err();

        assert!(matches!(err, IndexError::Overloaded(_)));
        assert!(err.is_transient());
        assert!(err.to_string().contains("1 of 2 documents failed"));
    }

    #[test]
    fn test_bulk_response_mapping_error_is_permanent() {
        let response = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "tweet-1", "status": 429,
                    "error": { "reason": "queue full" } } },
                { "index": { "_id": "tweet-2", "status": 400,
                    "error": { "type": "mapper_parsing_exception", "reason": "failed to parse field [retweet_count_i]" } } }
            ]
        });

        let err = OpenSearchTarget::check_bulk_response(&response).unwrap_err();

        assert!(matches!(err, IndexError::Rejected(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_new_rejects_invalid_address() {
        let config = IndexTargetConfig::new("localhost", "tweets");
        assert!(matches!(
            OpenSearchTarget::new(config),
            Err(IndexError::InvalidTarget(_))
        ));
    }
}
