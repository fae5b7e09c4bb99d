//! Index target double shared by the pipeline tests.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tweet_indexer_repository::{IndexError, IndexTarget};
use tweet_indexer_shared::Document;

/// Records every bulk write attempt and replays scripted failures.
#[derive(Default)]
pub struct RecordingTarget {
    attempts: Mutex<Vec<Vec<String>>>,
    delivered: Mutex<Vec<Vec<String>>>,
    failures: Mutex<VecDeque<IndexError>>,
    rejected_ids: HashSet<String>,
    delay: Option<Duration>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next attempts with these errors, in order.
    pub fn with_failures(self, failures: impl IntoIterator<Item = IndexError>) -> Self {
        self.failures.lock().unwrap().extend(failures);
        self
    }

    /// Permanently reject any batch containing one of these documents.
    pub fn rejecting(mut self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.rejected_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Sleep this long inside every attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Document ids of every attempt, successful or not.
    pub fn attempts(&self) -> Vec<Vec<String>> {
        self.attempts.lock().unwrap().clone()
    }

    /// Document ids of every successful write.
    pub fn delivered(&self) -> Vec<Vec<String>> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered().into_iter().flatten().collect()
    }
}

#[async_trait]
impl IndexTarget for RecordingTarget {
    fn collection(&self) -> &str {
        "test"
    }

    async fn bulk_index(&self, documents: &[Document]) -> Result<(), IndexError> {
        let ids: Vec<String> = documents.iter().map(|d| d.id().to_string()).collect();
        self.attempts.lock().unwrap().push(ids.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(id) = ids.iter().find(|id| self.rejected_ids.contains(*id)) {
            return Err(IndexError::rejected(format!("document {} refused", id)));
        }
        if let Some(failure) = self.failures.lock().unwrap().pop_front() {
            return Err(failure);
        }

        self.delivered.lock().unwrap().push(ids);
        Ok(())
    }

    async fn ensure_index_exists(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, IndexError> {
        Ok(true)
    }
}

/// A document with only an id and a text field.
pub fn document(id: i64) -> Document {
    let mut document = Document::new(tweet_indexer_shared::document_id(id));
    document.insert("text_s", format!("tweet {}", id)).unwrap();
    document
}
