//! Dependency initialization and wiring for the tweet indexer.

use std::sync::Arc;

use tokio::io::BufReader;
use tracing::info;

use crate::config::{IndexerConfig, SourceConfig};
use crate::IndexingError;
use mock_tweets::MockTweetStream;
use tweet_indexer_pipeline::consumer::{EventSource, JsonLinesSource, StreamSource};
use tweet_indexer_pipeline::orchestrator::Orchestrator;
use tweet_indexer_pipeline::processor::TweetToIndexProcessor;
use tweet_indexer_repository::{IndexTarget, OpenSearchTarget};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Initialize all dependencies from a loaded configuration.
    ///
    /// Verifies the index cluster is reachable and healthy before building
    /// the pipeline.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails
    pub async fn new(config: IndexerConfig) -> Result<Self, IndexingError> {
        info!(
            index_url = %config.index.url,
            collection = %config.index.collection,
            source = ?config.source,
            "Initializing dependencies"
        );

        let target = OpenSearchTarget::new(config.index.clone())?;

        let healthy = target.health_check().await?;
        if !healthy {
            return Err(IndexingError::config("Index cluster is unhealthy"));
        }

        info!("Index cluster connection verified");

        let source = build_source(&config.source)?;

        let orchestrator = Orchestrator::new(
            source,
            Arc::new(TweetToIndexProcessor::default()),
            Arc::new(target),
        )
        .with_options(config.options)
        .with_config(config.orchestrator)
        .with_loader_config(config.loader);

        Ok(Self { orchestrator })
    }
}

fn build_source(source: &SourceConfig) -> Result<Box<dyn EventSource>, IndexingError> {
    match source {
        SourceConfig::Stdin => {
            info!("Reading tweets from standard input");
            Ok(Box::new(JsonLinesSource::new(BufReader::new(tokio::io::stdin()))))
        }
        SourceConfig::Mock { count } => {
            info!(count = count, "Generating mock tweets");
            let events = MockTweetStream::deterministic().take(*count).collect();
            Ok(Box::new(StreamSource::from_events(events)))
        }
        SourceConfig::Kafka {
            broker,
            group_id,
            topic,
        } => kafka_source(broker, group_id, topic),
    }
}

#[cfg(feature = "kafka")]
fn kafka_source(
    broker: &str,
    group_id: &str,
    topic: &str,
) -> Result<Box<dyn EventSource>, IndexingError> {
    let consumer = tweet_indexer_pipeline::consumer::KafkaConsumer::new(broker, group_id, topic)?;
    info!("Kafka consumer created");
    Ok(Box::new(consumer))
}

#[cfg(not(feature = "kafka"))]
fn kafka_source(
    _broker: &str,
    _group_id: &str,
    _topic: &str,
) -> Result<Box<dyn EventSource>, IndexingError> {
    Err(IndexingError::config(
        "TWEET_SOURCE=kafka requires building with the `kafka` feature",
    ))
}
