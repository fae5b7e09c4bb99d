//! Source adapter contract and stream-backed sources.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::consumer::messages::{FlowControl, StreamMessage};
use crate::errors::PipelineError;
use crate::processor::tokenize;
use tweet_indexer_shared::SourceEvent;

/// A supplier of raw events.
///
/// The orchestrator calls [`subscribe`](EventSource::subscribe) once with the
/// keyword filter, then drives [`run`](EventSource::run) on its own task.
#[async_trait]
pub trait EventSource: Send {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Restrict delivery to events matching `filter`.
    ///
    /// An unfiltered filter delivers everything.
    fn subscribe(&mut self, filter: KeywordFilter) -> Result<(), PipelineError>;

    /// Deliver events until the source is exhausted or shutdown is signaled.
    ///
    /// # Arguments
    ///
    /// * `sender` - Channel to send messages to
    /// * `flow` - Flow-control signal; no events may be sent while paused
    /// * `shutdown` - Shutdown signal receiver
    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        flow: watch::Receiver<FlowControl>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError>;
}

/// Wait until the flow-control signal allows delivery.
///
/// Returns immediately when the signal is already flowing or its sender is
/// gone.
pub async fn wait_until_flowing(flow: &mut watch::Receiver<FlowControl>) {
    loop {
        if *flow.borrow_and_update() == FlowControl::Flowing {
            return;
        }
        if flow.changed().await.is_err() {
            return;
        }
    }
}

/// A set of keywords events must mention.
///
/// Keywords are matched case-insensitively against whole words of the event
/// text and against its hashtags. An empty set matches every event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    keywords: Vec<String>,
}

impl KeywordFilter {
    /// A filter that matches every event.
    pub fn unfiltered() -> Self {
        Self::default()
    }

    /// Build a filter from individual keywords.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<String> = Vec::new();
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !parsed.contains(&keyword) {
                parsed.push(keyword);
            }
        }
        Self { keywords: parsed }
    }

    /// Parse a comma-separated keyword list.
    ///
    /// A blank list yields an unfiltered filter. An empty entry between
    /// commas is a configuration error.
    pub fn parse(raw: &str) -> Result<Self, PipelineError> {
        if raw.trim().is_empty() {
            return Ok(Self::unfiltered());
        }

        let entries: Vec<&str> = raw.split(',').map(str::trim).collect();
        if let Some(position) = entries.iter().position(|entry| entry.is_empty()) {
            return Err(PipelineError::config(format!(
                "empty keyword at position {} in filter list '{}'",
                position + 1,
                raw
            )));
        }

        Ok(Self::new(entries))
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_unfiltered(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Whether `event` passes the filter.
    pub fn matches(&self, event: &SourceEvent) -> bool {
        if self.is_unfiltered() {
            return true;
        }

        let words = tokenize(&event.text);
        let hashtags: Vec<String> = event
            .entities
            .iter()
            .flat_map(|entities| entities.hashtags.iter())
            .map(|tag| tag.text.to_lowercase())
            .collect();

        self.keywords.iter().any(|keyword| {
            contains_phrase(&words, &tokenize(keyword))
                || hashtags
                    .iter()
                    .any(|tag| tag == keyword.trim_start_matches('#'))
        })
    }
}

/// Whether `phrase` occurs as consecutive whole words in `words`.
fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && words.windows(phrase.len()).any(|window| window == phrase)
}

/// A source backed by any stream of events.
pub struct StreamSource<S> {
    name: String,
    stream: S,
    filter: KeywordFilter,
    filtered: u64,
}

impl<S> StreamSource<S>
where
    S: Stream<Item = SourceEvent> + Unpin + Send,
{
    /// Wrap a stream of events.
    pub fn new(name: impl Into<String>, stream: S) -> Self {
        Self {
            name: name.into(),
            stream,
            filter: KeywordFilter::unfiltered(),
            filtered: 0,
        }
    }

    /// Number of events dropped by the keyword filter so far.
    pub fn filtered_count(&self) -> u64 {
        self.filtered
    }
}

impl StreamSource<futures::stream::Iter<std::vec::IntoIter<SourceEvent>>> {
    /// A source that replays a fixed list of events, then ends.
    pub fn from_events(events: Vec<SourceEvent>) -> Self {
        Self::new("memory", futures::stream::iter(events))
    }
}

/// A source fed through an in-process channel.
pub type ChannelSource = StreamSource<ReceiverStream<SourceEvent>>;

impl ChannelSource {
    /// Create a channel-backed source and the sender that feeds it.
    ///
    /// The source ends once every sender is dropped.
    pub fn channel(capacity: usize) -> (mpsc::Sender<SourceEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new("channel", ReceiverStream::new(rx)))
    }
}

#[async_trait]
impl<S> EventSource for StreamSource<S>
where
    S: Stream<Item = SourceEvent> + Unpin + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn subscribe(&mut self, filter: KeywordFilter) -> Result<(), PipelineError> {
        info!(source = %self.name, keywords = ?filter.keywords(), "Subscribed to source");
        self.filter = filter;
        Ok(())
    }

    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        mut flow: watch::Receiver<FlowControl>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(source = %self.name, "Source received shutdown signal");
                    break;
                }
                _ = wait_until_flowing(&mut flow) => {}
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(source = %self.name, "Source received shutdown signal");
                    break;
                }
                next = self.stream.next() => {
                    match next {
                        Some(event) => {
                            if !self.filter.matches(&event) {
                                self.filtered += 1;
                                continue;
                            }
                            if sender.send(StreamMessage::Events(vec![event])).await.is_err() {
                                debug!(source = %self.name, "Receiver closed");
                                break;
                            }
                        }
                        None => {
                            info!(source = %self.name, filtered = self.filtered, "Source exhausted");
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
