//! Kafka consumer implementation for the tweet indexer.
//!
//! Consumes JSON-encoded tweets from a Kafka topic and forwards them to the
//! pipeline. Offsets are committed once a message has been handed to the
//! pipeline.

use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::{BorrowedMessage, Message as KafkaMessage},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::messages::{FlowControl, StreamMessage};
use crate::consumer::source::{wait_until_flowing, EventSource, KeywordFilter};
use crate::errors::PipelineError;
use tweet_indexer_shared::SourceEvent;

/// Kafka consumer for tweet events.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
    filter: KeywordFilter,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer.
    ///
    /// # Arguments
    ///
    /// * `brokers` - Kafka broker addresses (comma-separated)
    /// * `group_id` - Consumer group ID
    /// * `topic` - Topic carrying JSON-encoded tweets
    ///
    /// # Returns
    ///
    /// * `Ok(KafkaConsumer)` - A new consumer instance
    /// * `Err(PipelineError)` - If consumer creation fails
    pub fn new(brokers: &str, group_id: &str, topic: &str) -> Result<Self, PipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;

        info!(brokers = %brokers, group_id = %group_id, "Created Kafka consumer");

        Ok(Self {
            consumer,
            topics: vec![topic.to_string()],
            filter: KeywordFilter::unfiltered(),
        })
    }

    /// Decode a message payload and commit its offset.
    async fn process_message(
        &self,
        msg: &BorrowedMessage<'_>,
        sender: &mpsc::Sender<StreamMessage>,
    ) -> Result<(), PipelineError> {
        let Some(payload) = msg.payload() else {
            debug!("Received message with empty payload");
            return Ok(());
        };

        debug!(
            topic = %msg.topic(),
            partition = msg.partition(),
            offset = msg.offset(),
            "Processing message"
        );

        match serde_json::from_slice::<SourceEvent>(payload) {
            Ok(event) if self.filter.matches(&event) => {
                sender
                    .send(StreamMessage::Events(vec![event]))
                    .await
                    .map_err(|e| PipelineError::ChannelError(e.to_string()))?;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(offset = msg.offset(), error = %e, "Skipping undecodable tweet");
            }
        }

        self.consumer.commit_message(msg, CommitMode::Async)?;
        Ok(())
    }
}

#[async_trait]
impl EventSource for KafkaConsumer {
    fn name(&self) -> &str {
        "kafka"
    }

    fn subscribe(&mut self, filter: KeywordFilter) -> Result<(), PipelineError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;
        self.filter = filter;

        info!(topics = ?self.topics, keywords = ?self.filter.keywords(), "Subscribed to Kafka topics");
        Ok(())
    }

    #[instrument(skip(self, sender, flow, shutdown))]
    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        mut flow: watch::Receiver<FlowControl>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    break;
                }
                _ = wait_until_flowing(&mut flow) => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    break;
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            if let Err(e) = self.process_message(&msg, &sender).await {
                                error!(error = %e, "Failed to process message");
                                if matches!(e, PipelineError::ChannelError(_)) {
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
