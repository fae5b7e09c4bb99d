//! Message types for the consumer.
//!
//! Defines what flows from a source to the orchestrator, and the flow-control
//! signal that flows back.

use tweet_indexer_shared::SourceEvent;

/// Messages sent by a source.
#[derive(Debug)]
pub enum StreamMessage {
    /// Events in receipt order.
    Events(Vec<SourceEvent>),
    /// The source has no more events.
    End,
    /// The source hit a recoverable error.
    Error(String),
}

/// Flow-control signal from the orchestrator to a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
    /// Deliver events.
    Flowing,
    /// Intake is saturated; hold delivery until flowing again.
    Paused,
}
