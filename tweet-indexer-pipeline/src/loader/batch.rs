//! Bounded, ordered batch of documents awaiting delivery.

use uuid::Uuid;

use tweet_indexer_shared::Document;

/// Documents collected for one bulk write.
#[derive(Debug, Clone)]
pub struct Batch {
    id: Uuid,
    capacity: usize,
    documents: Vec<Document>,
}

impl Batch {
    /// Create an empty batch. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id: Uuid::new_v4(),
            capacity,
            documents: Vec::with_capacity(capacity),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a document, handing it back when the batch is already full.
    pub fn push(&mut self, document: Document) -> Result<(), Document> {
        if self.is_full() {
            return Err(document);
        }
        self.documents.push(document);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.documents.len() >= self.capacity
    }

    /// Documents in receipt order.
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut batch = Batch::new(2);

        assert!(batch.push(Document::new("tweet-1")).is_ok());
        assert!(!batch.is_full());
        assert!(batch.push(Document::new("tweet-2")).is_ok());
        assert!(batch.is_full());

        let rejected = batch.push(Document::new("tweet-3")).unwrap_err();
        assert_eq!(rejected.id(), "tweet-3");

        let ids: Vec<&str> = batch.documents().iter().map(Document::id).collect();
        assert_eq!(ids, vec!["tweet-1", "tweet-2"]);
    }

    #[test]
    fn test_batches_get_distinct_ids() {
        assert_ne!(Batch::new(1).id(), Batch::new(1).id());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        assert_eq!(Batch::new(0).capacity(), 1);
    }
}
