//! Pipeline worker: transform, enrich, batch, flush.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument};

use crate::errors::FatalWriteError;
use crate::loader::BatchIndexer;
use crate::orchestrator::{PipelineState, WorkerReport};
use crate::processor::{DocumentTransformer, Enrichment};
use tweet_indexer_shared::SourceEvent;

/// One partition of the pipeline.
///
/// A worker owns its [`BatchIndexer`], so flushes run inline and no event is
/// appended while a flush is in progress.
pub(crate) struct Worker {
    index: usize,
    transformer: Arc<DocumentTransformer>,
    enrichment: Option<Box<dyn Enrichment>>,
    indexer: BatchIndexer,
    failures: mpsc::UnboundedSender<FatalWriteError>,
    state: PipelineState,
    processed: u64,
    discarded: u64,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        transformer: Arc<DocumentTransformer>,
        enrichment: Option<Box<dyn Enrichment>>,
        indexer: BatchIndexer,
        failures: mpsc::UnboundedSender<FatalWriteError>,
    ) -> Self {
        Self {
            index,
            transformer,
            enrichment,
            indexer,
            failures,
            state: PipelineState::Running,
            processed: 0,
            discarded: 0,
        }
    }

    /// Process events until the intake closes or shutdown is signaled, then
    /// flush what is left.
    #[instrument(skip_all, fields(worker = self.index))]
    pub(crate) async fn run(
        mut self,
        mut intake: mpsc::Receiver<SourceEvent>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> WorkerReport {
        info!("Worker started");

        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Worker received shutdown signal");
                    break;
                }
                event = intake.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("Intake closed");
                        break;
                    }
                },
            };

            if let Err(err) = self.process(event).await {
                return self.fail(err, intake);
            }
        }

        self.state = PipelineState::Stopping;
        if let Err(err) = self.indexer.flush().await {
            return self.fail(err, intake);
        }

        self.state = PipelineState::Stopped;
        info!(
            processed = self.processed,
            indexed = self.indexer.stats().documents_indexed,
            "Worker stopped"
        );
        self.report(None)
    }

    async fn process(&mut self, event: SourceEvent) -> Result<(), FatalWriteError> {
        self.processed += 1;

        let mut document = self.transformer.transform(&event);
        if let Some(enrichment) = self.enrichment.as_mut() {
            enrichment.enrich(&event, &mut document);
        }

        self.indexer.append(document).await?;
        Ok(())
    }

    /// Stop after a fatal write. Events already queued are discarded and
    /// counted; the dispatcher counts the ones routed here afterwards.
    fn fail(mut self, err: FatalWriteError, mut intake: mpsc::Receiver<SourceEvent>) -> WorkerReport {
        self.state = PipelineState::Failed;

        intake.close();
        while intake.try_recv().is_ok() {
            self.discarded += 1;
        }

        error!(
            error = %err,
            discarded = self.discarded,
            "Worker failed"
        );
        if self.failures.send(err.clone()).is_err() {
            debug!("Supervisor channel closed");
        }
        self.report(Some(err))
    }

    fn report(&self, failure: Option<FatalWriteError>) -> WorkerReport {
        let stats = self.indexer.stats();
        WorkerReport {
            worker: self.index,
            state: self.state,
            processed: self.processed,
            documents_indexed: stats.documents_indexed,
            flushes: stats.flushes,
            retries: stats.retries,
            discarded: self.discarded,
            failure,
        }
    }
}
