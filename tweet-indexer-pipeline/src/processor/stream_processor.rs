//! Stream processor capability contract.
//!
//! A [`StreamProcessor`] describes a processing stage: which options it
//! accepts and, given values for them, how events are filtered, transformed
//! and enriched. The orchestrator only depends on this trait.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::consumer::KeywordFilter;
use crate::errors::PipelineError;
use crate::processor::enrichment::{Enrichment, SyntheticEnrichment};
use crate::processor::features::FeatureExtractor;
use crate::processor::transformer::DocumentTransformer;

/// Comma-separated keywords events must mention.
pub const TWEET_FILTERS_OPTION: &str = "tweetFilters";
/// Seed enabling synthetic enrichment.
pub const SYNTHETIC_SEED_OPTION: &str = "syntheticSeed";

/// An option a processor accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOption {
    pub name: &'static str,
    pub description: &'static str,
    pub required: bool,
}

/// Option values supplied to [`StreamProcessor::plan`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorOptions {
    values: HashMap<String, String>,
}

impl ProcessorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Builds the enrichment for a worker, given the worker's index.
pub type EnrichmentFactory = Arc<dyn Fn(usize) -> Box<dyn Enrichment> + Send + Sync>;

/// What a processor resolved its options into.
#[derive(Clone)]
pub struct ProcessingPlan {
    /// Filter the source is subscribed with.
    pub filter: KeywordFilter,
    /// Shared by every worker.
    pub transformer: Arc<DocumentTransformer>,
    /// Per-worker enrichment, when configured.
    pub enrichment: Option<EnrichmentFactory>,
}

impl ProcessingPlan {
    /// Instantiate the enrichment for worker `worker`, if any.
    pub fn enrichment_for(&self, worker: usize) -> Option<Box<dyn Enrichment>> {
        self.enrichment.as_ref().map(|factory| factory(worker))
    }
}

/// A processing stage the pipeline can run.
pub trait StreamProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Options this processor understands.
    fn options(&self) -> Vec<ProcessorOption>;

    /// Resolve option values into a plan.
    ///
    /// Invalid or unknown options are a configuration error.
    fn plan(&self, options: &ProcessorOptions) -> Result<ProcessingPlan, PipelineError>;
}

/// Filters tweets by keyword and maps them to index documents.
#[derive(Debug, Clone, Default)]
pub struct TweetToIndexProcessor {
    features: FeatureExtractor,
}

impl TweetToIndexProcessor {
    pub fn new(features: FeatureExtractor) -> Self {
        Self { features }
    }
}

impl StreamProcessor for TweetToIndexProcessor {
    fn name(&self) -> &str {
        "tweet-to-index"
    }

    fn options(&self) -> Vec<ProcessorOption> {
        vec![
            ProcessorOption {
                name: TWEET_FILTERS_OPTION,
                description: "Comma-separated keywords; tweets must mention at least one",
                required: false,
            },
            ProcessorOption {
                name: SYNTHETIC_SEED_OPTION,
                description: "Seed for synthetic enrichment fields; disabled when absent",
                required: false,
            },
        ]
    }

    fn plan(&self, options: &ProcessorOptions) -> Result<ProcessingPlan, PipelineError> {
        let known = self.options();
        if let Some(unknown) = options
            .names()
            .find(|name| !known.iter().any(|option| option.name == *name))
        {
            return Err(PipelineError::config(format!(
                "unknown option '{}' for processor '{}'",
                unknown,
                self.name()
            )));
        }

        let filter = KeywordFilter::parse(options.get(TWEET_FILTERS_OPTION).unwrap_or(""))?;

        let seed = options
            .get(SYNTHETIC_SEED_OPTION)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|e| {
                    PipelineError::config(format!("invalid {} '{}': {}", SYNTHETIC_SEED_OPTION, raw, e))
                })
            })
            .transpose()?;

        let enrichment = seed.map(|seed| {
            let factory: EnrichmentFactory = Arc::new(move |worker: usize| {
                Box::new(SyntheticEnrichment::seeded(seed.wrapping_add(worker as u64)))
                    as Box<dyn Enrichment>
            });
            factory
        });

        info!(
            processor = self.name(),
            keywords = ?filter.keywords(),
            synthetic_seed = ?seed,
            "Planned stream processing"
        );

        Ok(ProcessingPlan {
            filter,
            transformer: Arc::new(DocumentTransformer::new(self.features.clone())),
            enrichment,
        })
    }
}
