//! Orchestrator module for the tweet indexer pipeline.
//!
//! Coordinates the source, the workers and their batch indexers.

mod worker;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::consumer::{EventSource, FlowControl, StreamMessage};
use crate::errors::{FatalWriteError, PipelineError};
use crate::loader::{BatchIndexer, LoaderConfig};
use crate::processor::{ProcessorOptions, StreamProcessor};
use tweet_indexer_repository::IndexTarget;
use tweet_indexer_shared::SourceEvent;

use worker::Worker;

/// Configuration for the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Number of workers events are partitioned across.
    pub worker_count: usize,
    /// Capacity of each worker's intake queue.
    pub intake_queue_size: usize,
    /// Size of the source message channel buffer.
    pub channel_buffer_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            intake_queue_size: 1000,
            channel_buffer_size: 1000,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.worker_count == 0 {
            return Err(PipelineError::config("worker_count must be positive"));
        }
        if self.intake_queue_size == 0 {
            return Err(PipelineError::config("intake_queue_size must be positive"));
        }
        if self.channel_buffer_size == 0 {
            return Err(PipelineError::config("channel_buffer_size must be positive"));
        }
        Ok(())
    }
}

/// Lifecycle of the pipeline and of each worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Init,
    Running,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            PipelineState::Init => "init",
            PipelineState::Running => "running",
            PipelineState::Stopping => "stopping",
            PipelineState::Stopped => "stopped",
            PipelineState::Failed => "failed",
        };
        f.write_str(state)
    }
}

/// What one worker did.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub worker: usize,
    pub state: PipelineState,
    /// Events taken from the intake queue.
    pub processed: u64,
    pub documents_indexed: u64,
    pub flushes: u64,
    pub retries: u64,
    /// Events routed to the worker but dropped after it failed.
    pub discarded: u64,
    /// The undelivered batch, if the worker failed.
    pub failure: Option<FatalWriteError>,
}

/// Summary returned by [`Orchestrator::run`].
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub workers: Vec<WorkerReport>,
    /// Times intake was paused because a worker queue was full.
    pub pauses: u64,
}

impl PipelineReport {
    pub fn documents_indexed(&self) -> u64 {
        self.workers.iter().map(|w| w.documents_indexed).sum()
    }

    pub fn discarded(&self) -> u64 {
        self.workers.iter().map(|w| w.discarded).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FatalWriteError> {
        self.workers.iter().filter_map(|w| w.failure.as_ref())
    }

    pub fn is_failed(&self) -> bool {
        self.state == PipelineState::Failed
    }
}

/// Requests a graceful stop of a running pipeline.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: broadcast::Sender<()>,
    requested: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Stop intake, flush every worker's pending batch and return from
    /// [`Orchestrator::run`].
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::SeqCst);
        let _ = self.sender.send(());
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

enum Dispatch {
    Continue,
    Shutdown,
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Resolves the processor plan and subscribes the source
/// - Partitions events across workers by event id
/// - Pauses the source while a worker queue is full
/// - Reports worker failures on the supervisor channel
pub struct Orchestrator {
    source: Option<Box<dyn EventSource>>,
    processor: Arc<dyn StreamProcessor>,
    options: ProcessorOptions,
    target: Arc<dyn IndexTarget>,
    config: OrchestratorConfig,
    loader_config: LoaderConfig,
    shutdown: ShutdownHandle,
    state_tx: watch::Sender<PipelineState>,
    failures_tx: mpsc::UnboundedSender<FatalWriteError>,
    failures_rx: Option<mpsc::UnboundedReceiver<FatalWriteError>>,
}

impl Orchestrator {
    /// Create a new orchestrator with default configuration.
    pub fn new(
        source: Box<dyn EventSource>,
        processor: Arc<dyn StreamProcessor>,
        target: Arc<dyn IndexTarget>,
    ) -> Self {
        let (sender, _) = broadcast::channel(4);
        let (state_tx, _) = watch::channel(PipelineState::Init);
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();

        Self {
            source: Some(source),
            processor,
            options: ProcessorOptions::default(),
            target,
            config: OrchestratorConfig::default(),
            loader_config: LoaderConfig::default(),
            shutdown: ShutdownHandle {
                sender,
                requested: Arc::new(AtomicBool::new(false)),
            },
            state_tx,
            failures_tx,
            failures_rx: Some(failures_rx),
        }
    }

    pub fn with_options(mut self, options: ProcessorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_loader_config(mut self, loader_config: LoaderConfig) -> Self {
        self.loader_config = loader_config;
        self
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Watch the pipeline state.
    pub fn state(&self) -> watch::Receiver<PipelineState> {
        self.state_tx.subscribe()
    }

    /// Take the supervisor channel on which worker failures are reported.
    ///
    /// Returns `None` after the first call.
    pub fn take_failures(&mut self) -> Option<mpsc::UnboundedReceiver<FatalWriteError>> {
        self.failures_rx.take()
    }

    fn set_state(&self, state: PipelineState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "Pipeline state changed");
        }
    }

    /// Run the pipeline.
    ///
    /// Returns once the source is exhausted or shutdown was requested, and
    /// every worker has flushed or failed. Configuration problems are
    /// reported before any event is accepted.
    #[instrument(skip(self))]
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let mut source = self.source.take().ok_or(PipelineError::AlreadyStarted)?;

        self.config.validate()?;
        self.loader_config.validate()?;
        let plan = self.processor.plan(&self.options)?;

        info!(
            processor = self.processor.name(),
            source = source.name(),
            workers = self.config.worker_count,
            collection = %self.target.collection(),
            "Starting tweet indexer pipeline"
        );

        self.target.ensure_index_exists().await?;
        source.subscribe(plan.filter.clone())?;

        let (events_tx, mut events_rx) = mpsc::channel(self.config.channel_buffer_size);
        let (flow_tx, flow_rx) = watch::channel(FlowControl::Flowing);
        let mut shutdown_rx = self.shutdown.sender.subscribe();

        let source_shutdown = self.shutdown.sender.subscribe();
        let source_handle: JoinHandle<Result<(), PipelineError>> =
            tokio::spawn(async move { source.run(events_tx, flow_rx, source_shutdown).await });

        let mut senders = Vec::with_capacity(self.config.worker_count);
        let mut worker_handles = Vec::with_capacity(self.config.worker_count);
        for index in 0..self.config.worker_count {
            let (intake_tx, intake_rx) = mpsc::channel(self.config.intake_queue_size);
            let worker = Worker::new(
                index,
                plan.transformer.clone(),
                plan.enrichment_for(index),
                BatchIndexer::new(index, self.target.clone(), self.loader_config.clone()),
                self.failures_tx.clone(),
            );
            let worker_shutdown = self.shutdown.sender.subscribe();
            worker_handles.push(tokio::spawn(worker.run(intake_rx, worker_shutdown)));
            senders.push(Some(intake_tx));
        }

        self.set_state(PipelineState::Running);
        if self.shutdown.is_requested() {
            let _ = self.shutdown.sender.send(());
        }

        let mut discarded = vec![0u64; self.config.worker_count];
        let mut pauses = 0u64;

        'intake: loop {
            let message = tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break 'intake;
                }
                message = events_rx.recv() => message,
            };

            match message {
                Some(StreamMessage::Events(events)) => {
                    for event in events {
                        let outcome = dispatch(
                            event,
                            &mut senders,
                            &mut discarded,
                            &mut pauses,
                            &flow_tx,
                            &mut shutdown_rx,
                        )
                        .await;
                        if let Dispatch::Shutdown = outcome {
                            info!("Received shutdown signal");
                            break 'intake;
                        }
                    }
                }
                Some(StreamMessage::Error(e)) => {
                    warn!(error = %e, "Received error from source");
                }
                Some(StreamMessage::End) | None => {
                    info!("Source stream ended");
                    break 'intake;
                }
            }
        }

        self.set_state(PipelineState::Stopping);

        // Closing the intake queues lets workers drain and flush.
        drop(senders);
        drop(events_rx);

        let mut workers = Vec::with_capacity(worker_handles.len());
        for (index, handle) in worker_handles.into_iter().enumerate() {
            let mut report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!(worker = index, error = %e, "Worker task panicked");
                    WorkerReport {
                        worker: index,
                        state: PipelineState::Failed,
                        processed: 0,
                        documents_indexed: 0,
                        flushes: 0,
                        retries: 0,
                        discarded: 0,
                        failure: None,
                    }
                }
            };
            report.discarded += discarded[index];
            workers.push(report);
        }

        match source_handle.await {
            Ok(Ok(())) => debug!("Source finished"),
            Ok(Err(e)) => warn!(error = %e, "Source finished with error"),
            Err(e) => error!(error = %e, "Source task panicked"),
        }

        let state = if workers.iter().any(|w| w.state == PipelineState::Failed) {
            PipelineState::Failed
        } else {
            PipelineState::Stopped
        };
        self.set_state(state);

        let report = PipelineReport {
            state,
            workers,
            pauses,
        };
        info!(
            state = %report.state,
            indexed = report.documents_indexed(),
            discarded = report.discarded(),
            pauses = report.pauses,
            "Pipeline shutdown complete"
        );
        Ok(report)
    }
}

/// Worker an event is routed to.
pub fn partition(event_id: i64, workers: usize) -> usize {
    event_id.rem_euclid(workers as i64) as usize
}

/// Route one event to its worker, pausing the source while the worker's
/// queue is full.
async fn dispatch(
    event: SourceEvent,
    senders: &mut [Option<mpsc::Sender<SourceEvent>>],
    discarded: &mut [u64],
    pauses: &mut u64,
    flow: &watch::Sender<FlowControl>,
    shutdown: &mut broadcast::Receiver<()>,
) -> Dispatch {
    let index = partition(event.id, senders.len());
    let Some(sender) = senders[index].as_ref() else {
        discarded[index] += 1;
        return Dispatch::Continue;
    };

    let event = match sender.try_send(event) {
        Ok(()) => return Dispatch::Continue,
        Err(TrySendError::Closed(_)) => {
            warn!(worker = index, "Worker stopped, discarding its events");
            senders[index] = None;
            discarded[index] += 1;
            return Dispatch::Continue;
        }
        Err(TrySendError::Full(event)) => event,
    };

    *pauses += 1;
    flow.send_replace(FlowControl::Paused);
    debug!(worker = index, "Worker queue full, pausing intake");

    let sent = tokio::select! {
        biased;
        _ = shutdown.recv() => None,
        sent = sender.send(event) => Some(sent.is_ok()),
    };

    flow.send_replace(FlowControl::Flowing);
    debug!(worker = index, "Resuming intake");

    match sent {
        None => Dispatch::Shutdown,
        Some(true) => Dispatch::Continue,
        Some(false) => {
            warn!(worker = index, "Worker stopped, discarding its events");
            senders[index] = None;
            discarded[index] += 1;
            Dispatch::Continue
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use crate::consumer::{ChannelSource, StreamSource};
    use crate::processor::{TweetToIndexProcessor, TWEET_FILTERS_OPTION};
    use crate::test_support::RecordingTarget;
    use mock_tweets::{MockConfig, MockTweetStream};

    fn events(ids: std::ops::RangeInclusive<i64>) -> Vec<SourceEvent> {
        ids.map(|id| SourceEvent::new(id, format!("tweet number {}", id), "author"))
            .collect()
    }

    fn orchestrator(
        source: Box<dyn EventSource>,
        target: Arc<RecordingTarget>,
        workers: usize,
        batch: usize,
    ) -> Orchestrator {
        Orchestrator::new(source, Arc::new(TweetToIndexProcessor::default()), target)
            .with_config(OrchestratorConfig {
                worker_count: workers,
                ..Default::default()
            })
            .with_loader_config(LoaderConfig {
                max_batch_size: batch,
                ..Default::default()
            })
    }

    #[test]
    fn test_partition_is_stable_and_in_range() {
        assert_eq!(partition(10, 4), 2);
        assert_eq!(partition(10, 4), partition(10, 4));
        assert_eq!(partition(-3, 4), 1);
        assert_eq!(partition(7, 1), 0);
    }

    #[test]
    fn test_config_validation() {
        assert!(OrchestratorConfig::default().validate().is_ok());
        assert!(OrchestratorConfig {
            worker_count: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[tokio::test]
    async fn test_end_of_stream_flushes_remainder() {
        let stream: Vec<SourceEvent> = MockTweetStream::new(MockConfig::default())
            .take(250)
            .collect();
        let target = Arc::new(RecordingTarget::new());
        let mut pipeline = orchestrator(
            Box::new(StreamSource::from_events(stream)),
            target.clone(),
            1,
            100,
        );
        let state = pipeline.state();

        let report = pipeline.run().await.unwrap();

        let sizes: Vec<usize> = target.delivered().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(report.state, PipelineState::Stopped);
        assert_eq!(*state.borrow(), PipelineState::Stopped);
        assert_eq!(report.documents_indexed(), 250);
        assert_eq!(report.workers[0].flushes, 3);

        let unique: HashSet<String> = target.delivered_ids().into_iter().collect();
        assert_eq!(unique.len(), 250);
    }

    #[tokio::test]
    async fn test_workers_partition_without_duplicates() {
        let target = Arc::new(RecordingTarget::new());
        let mut pipeline = orchestrator(
            Box::new(StreamSource::from_events(events(1..=1000))),
            target.clone(),
            4,
            32,
        );

        let report = pipeline.run().await.unwrap();

        let delivered = target.delivered_ids();
        let unique: HashSet<&String> = delivered.iter().collect();
        assert_eq!(delivered.len(), 1000);
        assert_eq!(unique.len(), 1000);
        assert!(target.delivered().iter().all(|batch| batch.len() <= 32));
        assert_eq!(report.workers.len(), 4);
        for worker in &report.workers {
            assert_eq!(worker.documents_indexed, 250);
            assert_eq!(worker.state, PipelineState::Stopped);
        }
    }

    #[tokio::test]
    async fn test_filter_option_applies() {
        let mut source_events = events(1..=4);
        source_events[1].text = "learning rust".to_string();
        let target = Arc::new(RecordingTarget::new());
        let mut pipeline = orchestrator(
            Box::new(StreamSource::from_events(source_events)),
            target.clone(),
            1,
            10,
        )
        .with_options(ProcessorOptions::new().with(TWEET_FILTERS_OPTION, "rust"));

        pipeline.run().await.unwrap();

        assert_eq!(target.delivered_ids(), vec!["tweet-2".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_pauses_intake() {
        let target = Arc::new(RecordingTarget::new().with_delay(Duration::from_millis(50)));
        let mut pipeline = Orchestrator::new(
            Box::new(StreamSource::from_events(events(1..=20))),
            Arc::new(TweetToIndexProcessor::default()),
            target.clone(),
        )
        .with_config(OrchestratorConfig {
            worker_count: 1,
            intake_queue_size: 1,
            channel_buffer_size: 1,
        })
        .with_loader_config(LoaderConfig {
            max_batch_size: 1,
            ..Default::default()
        });

        let report = pipeline.run().await.unwrap();

        assert!(report.pauses > 0);
        assert_eq!(report.documents_indexed(), 20);
        assert_eq!(report.state, PipelineState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_intake_and_flushes() {
        let (feed, source) = ChannelSource::channel(16);
        let target = Arc::new(RecordingTarget::new());
        let mut pipeline = orchestrator(Box::new(source), target.clone(), 1, 100);
        let shutdown = pipeline.shutdown_handle();

        let running = tokio::spawn(async move { pipeline.run().await });

        for event in events(1..=5) {
            feed.send(event).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.shutdown();

        let report = running.await.unwrap().unwrap();
        for event in events(6..=8) {
            let _ = feed.send(event).await;
        }

        assert_eq!(report.state, PipelineState::Stopped);
        assert_eq!(target.delivered().len(), 1);
        assert_eq!(target.delivered_ids().len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_flush_skips_queued_events() {
        let (feed, source) = ChannelSource::channel(16);
        let target = Arc::new(RecordingTarget::new().with_delay(Duration::from_millis(100)));
        let mut pipeline = orchestrator(Box::new(source), target.clone(), 1, 2);
        let shutdown = pipeline.shutdown_handle();

        let running = tokio::spawn(async move { pipeline.run().await });

        for event in events(1..=6) {
            feed.send(event).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(target.attempts().len(), 1);
        assert!(target.delivered().is_empty());
        shutdown.shutdown();

        let report = running.await.unwrap().unwrap();

        assert_eq!(report.state, PipelineState::Stopped);
        assert_eq!(
            target.delivered(),
            vec![vec!["tweet-1".to_string(), "tweet-2".to_string()]]
        );
        assert_eq!(target.attempts().len(), 1);
        assert_eq!(report.workers[0].processed, 2);
        assert_eq!(report.documents_indexed(), 2);
    }

    #[tokio::test]
    async fn test_failed_worker_does_not_stop_others() {
        let target = Arc::new(RecordingTarget::new().rejecting(["tweet-3"]));
        let mut pipeline = orchestrator(
            Box::new(StreamSource::from_events(events(1..=10))),
            target.clone(),
            2,
            1,
        );
        let mut failures = pipeline.take_failures().unwrap();
        assert!(pipeline.take_failures().is_none());

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.state, PipelineState::Failed);
        assert!(report.is_failed());

        let healthy = &report.workers[0];
        assert_eq!(healthy.state, PipelineState::Stopped);
        assert_eq!(healthy.documents_indexed, 5);

        let failed = &report.workers[1];
        assert_eq!(failed.state, PipelineState::Failed);
        assert_eq!(failed.documents_indexed, 1);
        assert_eq!(failed.discarded, 3);

        let failure = failures.try_recv().unwrap();
        let ids: Vec<&str> = failure.documents.iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec!["tweet-3"]);
        assert_eq!(failure.worker, 1);
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_run_twice_is_rejected() {
        let target = Arc::new(RecordingTarget::new());
        let mut pipeline = orchestrator(
            Box::new(StreamSource::from_events(events(1..=2))),
            target,
            1,
            10,
        );

        pipeline.run().await.unwrap();

        assert!(matches!(
            pipeline.run().await,
            Err(PipelineError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_invalid_configuration_fails_before_start() {
        let target = Arc::new(RecordingTarget::new());
        let mut pipeline = orchestrator(
            Box::new(StreamSource::from_events(events(1..=2))),
            target.clone(),
            0,
            10,
        );
        let state = pipeline.state();

        assert!(matches!(
            pipeline.run().await,
            Err(PipelineError::ConfigError(_))
        ));
        assert_eq!(*state.borrow(), PipelineState::Init);
        assert!(target.attempts().is_empty());
    }
}
