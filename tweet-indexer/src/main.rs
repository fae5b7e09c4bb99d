use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tweet_indexer::{Dependencies, IndexerConfig, IndexingError, LogFormat};
use tweet_indexer_pipeline::PipelineError;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    dotenv::dotenv().ok();
    init_tracing(LogFormat::from_env());

    let config = IndexerConfig::from_env()?;
    let Dependencies { mut orchestrator } = Dependencies::new(config).await?;

    let shutdown = orchestrator.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                shutdown.shutdown();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    if let Some(mut failures) = orchestrator.take_failures() {
        tokio::spawn(async move {
            while let Some(failure) = failures.recv().await {
                error!(
                    worker = failure.worker,
                    batch_id = %failure.batch_id,
                    documents = failure.documents.len(),
                    reason = %failure.reason,
                    "Undelivered batch"
                );
            }
        });
    }

    let report = orchestrator.run().await?;

    if let Some(failure) = report.failures().next() {
        return Err(PipelineError::from(failure.clone()).into());
    }

    info!(
        indexed = report.documents_indexed(),
        "Tweet indexer finished"
    );
    Ok(())
}
