//! Newline-delimited JSON source.
//!
//! Reads one tweet object per line from any async reader (stdin, a file, a
//! socket). Lines that do not parse are reported and skipped.

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::consumer::messages::{FlowControl, StreamMessage};
use crate::consumer::source::{wait_until_flowing, EventSource, KeywordFilter};
use crate::errors::PipelineError;
use tweet_indexer_shared::SourceEvent;

/// Source reading tweets as JSON lines.
pub struct JsonLinesSource<R> {
    reader: R,
    filter: KeywordFilter,
    line_number: u64,
    malformed: u64,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            filter: KeywordFilter::unfiltered(),
            line_number: 0,
            malformed: 0,
        }
    }

    /// Number of lines skipped because they were not valid tweets.
    pub fn malformed_count(&self) -> u64 {
        self.malformed
    }

    fn parse_line(&mut self, line: &str) -> Result<Option<SourceEvent>, PipelineError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line).map(Some).map_err(|e| {
            self.malformed += 1;
            PipelineError::parse(format!("line {}: {}", self.line_number, e))
        })
    }
}

#[async_trait]
impl<R> EventSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn name(&self) -> &str {
        "json-lines"
    }

    fn subscribe(&mut self, filter: KeywordFilter) -> Result<(), PipelineError> {
        info!(keywords = ?filter.keywords(), "Subscribed to JSON lines source");
        self.filter = filter;
        Ok(())
    }

    async fn run(
        &mut self,
        sender: mpsc::Sender<StreamMessage>,
        mut flow: watch::Receiver<FlowControl>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), PipelineError> {
        let mut line = String::new();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("JSON lines source received shutdown signal");
                    return Ok(());
                }
                _ = wait_until_flowing(&mut flow) => {}
            }

            line.clear();
            let read = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("JSON lines source received shutdown signal");
                    return Ok(());
                }
                read = self.reader.read_line(&mut line) => {
                    read.map_err(|e| PipelineError::source(e.to_string()))?
                }
            };

            if read == 0 {
                info!(
                    lines = self.line_number,
                    malformed = self.malformed,
                    "JSON lines source exhausted"
                );
                let _ = sender.send(StreamMessage::End).await;
                return Ok(());
            }
            self.line_number += 1;

            let message = match self.parse_line(&line) {
                Ok(Some(event)) if self.filter.matches(&event) => {
                    StreamMessage::Events(vec![event])
                }
                Ok(_) => continue,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed line");
                    StreamMessage::Error(e.to_string())
                }
            };

            if sender.send(message).await.is_err() {
                debug!("Receiver closed");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(input: &'static str, filter: KeywordFilter) -> (Vec<i64>, usize, u64) {
        let mut source = JsonLinesSource::new(input.as_bytes());
        source.subscribe(filter).unwrap();

        let (tx, mut rx) = mpsc::channel(16);
        let (_flow_tx, flow_rx) = watch::channel(FlowControl::Flowing);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        source.run(tx, flow_rx, shutdown_rx).await.unwrap();

        let mut ids = Vec::new();
        let mut errors = 0;
        while let Some(msg) = rx.recv().await {
            match msg {
                StreamMessage::Events(events) => ids.extend(events.iter().map(|e| e.id)),
                StreamMessage::Error(_) => errors += 1,
                StreamMessage::End => break,
            }
        }
        (ids, errors, source.malformed_count())
    }

    #[tokio::test]
    async fn test_reads_lines_in_order() {
        let input = "{\"id\": 1, \"text\": \"a\"}\n\n{\"id\": 2, \"text\": \"b\"}\n";

        let (ids, errors, malformed) = collect(input, KeywordFilter::unfiltered()).await;

        assert_eq!(ids, vec![1, 2]);
        assert_eq!(errors, 0);
        assert_eq!(malformed, 0);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_reported_and_skipped() {
        let input = "{\"id\": 1, \"text\": \"a\"}\nnot json\n{\"id\": 3, \"text\": \"c\"}";

        let (ids, errors, malformed) = collect(input, KeywordFilter::unfiltered()).await;

        assert_eq!(ids, vec![1, 3]);
        assert_eq!(errors, 1);
        assert_eq!(malformed, 1);
    }

    #[tokio::test]
    async fn test_filter_applies() {
        let input = "{\"id\": 1, \"text\": \"rust\"}\n{\"id\": 2, \"text\": \"go\"}\n";

        let (ids, _, _) = collect(input, KeywordFilter::new(["rust"])).await;

        assert_eq!(ids, vec![1]);
    }
}
