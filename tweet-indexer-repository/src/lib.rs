//! # Tweet Indexer Repository
//!
//! This crate provides the index target abstraction the pipeline writes
//! batches to, the error taxonomy that separates transient from permanent
//! write failures, and a concrete implementation for OpenSearch.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;

pub use config::IndexTargetConfig;
pub use errors::IndexError;
pub use interfaces::IndexTarget;
pub use opensearch::OpenSearchTarget;
