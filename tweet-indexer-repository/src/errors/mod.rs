//! Error types for the tweet indexer repository.

mod index_error;

pub use index_error::IndexError;
