//! # Tweet Indexer Pipeline
//!
//! This crate provides the pipeline components for consuming tweets from a
//! stream and indexing them as dynamically-typed documents.
//!
//! ## Architecture
//!
//! The pipeline follows the Consumer-Processor-Loader pattern:
//!
//! 1. **Consumer**: Receives events from a source (channel, JSON lines, Kafka)
//! 2. **Processor**: Transforms events into documents and derives features
//! 3. **Loader**: Batches documents and writes them with retry and backoff
//! 4. **Orchestrator**: Partitions events across workers and manages the
//!    pipeline lifecycle

pub mod consumer;
pub mod errors;
pub mod loader;
pub mod orchestrator;
pub mod processor;

#[cfg(test)]
mod test_support;

pub use errors::{FatalReason, FatalWriteError, PipelineError};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, PipelineReport, PipelineState, ShutdownHandle, WorkerReport,
};
