//! Consumer module for the tweet indexer pipeline.
//!
//! Provides the source adapter contract and the sources events can be read
//! from.

mod json_lines;
#[cfg(feature = "kafka")]
mod kafka_consumer;
mod messages;
mod source;

pub use json_lines::JsonLinesSource;
#[cfg(feature = "kafka")]
pub use kafka_consumer::KafkaConsumer;
pub use messages::{FlowControl, StreamMessage};
pub use source::{wait_until_flowing, ChannelSource, EventSource, KeywordFilter, StreamSource};
