//! Indexer configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded by
//! the binary first). Values are validated here so a bad setting fails at
//! startup, before any event is accepted.

mod dependencies;

pub use dependencies::Dependencies;

use std::env;
use std::str::FromStr;

use crate::IndexingError;
use tweet_indexer_pipeline::consumer::KeywordFilter;
use tweet_indexer_pipeline::loader::LoaderConfig;
use tweet_indexer_pipeline::processor::{
    ProcessorOptions, SYNTHETIC_SEED_OPTION, TWEET_FILTERS_OPTION,
};
use tweet_indexer_pipeline::OrchestratorConfig;
use tweet_indexer_repository::IndexTargetConfig;

/// Default collection name.
const DEFAULT_COLLECTION: &str = "tweets";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "tweet-indexer";

/// Default Kafka topic.
const DEFAULT_KAFKA_TOPIC: &str = "tweets";

/// Where tweets are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// JSON lines on standard input.
    Stdin,
    /// A fixed number of generated tweets.
    Mock { count: usize },
    /// A Kafka topic carrying JSON tweets.
    Kafka {
        broker: String,
        group_id: String,
        topic: String,
    },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl LogFormat {
    /// Read `LOG_FORMAT`; unknown values fall back to pretty output.
    pub fn from_env() -> Self {
        match env::var("LOG_FORMAT") {
            Ok(raw) if raw.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Complete runtime configuration of the indexer.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    pub index: IndexTargetConfig,
    pub orchestrator: OrchestratorConfig,
    pub loader: LoaderConfig,
    pub options: ProcessorOptions,
    pub source: SourceConfig,
}

impl IndexerConfig {
    /// Load the configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_URL`: index cluster URL (required)
    /// - `INDEX_COLLECTION`: collection name (default: tweets)
    /// - `TWEET_FILTERS`: comma-separated keywords (default: unfiltered)
    /// - `MAX_BATCH_SIZE`, `WORKER_COUNT`, `INTAKE_QUEUE_SIZE`: positive integers
    /// - `MAX_RETRIES`, `INITIAL_RETRY_DELAY_MS`, `MAX_RETRY_DELAY_MS`,
    ///   `FLUSH_TIMEOUT_MS`: retry policy
    /// - `SYNTHETIC_SEED`: enables synthetic enrichment
    /// - `TWEET_SOURCE`: `stdin` (default), `mock:<count>` or `kafka`
    /// - `KAFKA_BROKER`, `KAFKA_GROUP_ID`, `KAFKA_TOPIC`: Kafka source settings
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load the configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("INDEX_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| IndexingError::config("INDEX_URL is required"))?;
        let collection =
            lookup("INDEX_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.to_string());
        let index = IndexTargetConfig::new(url.trim(), collection.trim());
        index
            .parsed_url()
            .map_err(|e| IndexingError::config(e.to_string()))?;

        let orchestrator_defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            worker_count: parse_var(&lookup, "WORKER_COUNT", orchestrator_defaults.worker_count)?,
            intake_queue_size: parse_var(
                &lookup,
                "INTAKE_QUEUE_SIZE",
                orchestrator_defaults.intake_queue_size,
            )?,
            ..orchestrator_defaults
        };
        orchestrator
            .validate()
            .map_err(|e| IndexingError::config(e.to_string()))?;

        let loader_defaults = LoaderConfig::default();
        let loader = LoaderConfig {
            max_batch_size: parse_var(&lookup, "MAX_BATCH_SIZE", loader_defaults.max_batch_size)?,
            max_retries: parse_var(&lookup, "MAX_RETRIES", loader_defaults.max_retries)?,
            initial_retry_delay_ms: parse_var(
                &lookup,
                "INITIAL_RETRY_DELAY_MS",
                loader_defaults.initial_retry_delay_ms,
            )?,
            max_retry_delay_ms: parse_var(
                &lookup,
                "MAX_RETRY_DELAY_MS",
                loader_defaults.max_retry_delay_ms,
            )?,
            flush_timeout_ms: parse_var(
                &lookup,
                "FLUSH_TIMEOUT_MS",
                loader_defaults.flush_timeout_ms,
            )?,
        };
        loader
            .validate()
            .map_err(|e| IndexingError::config(e.to_string()))?;

        let mut options = ProcessorOptions::new();
        if let Some(filters) = lookup("TWEET_FILTERS") {
            KeywordFilter::parse(&filters).map_err(|e| IndexingError::config(e.to_string()))?;
            options.set(TWEET_FILTERS_OPTION, filters);
        }
        if let Some(seed) = lookup("SYNTHETIC_SEED").filter(|s| !s.trim().is_empty()) {
            seed.trim().parse::<u64>().map_err(|e| {
                IndexingError::config(format!("SYNTHETIC_SEED '{}' is invalid: {}", seed, e))
            })?;
            options.set(SYNTHETIC_SEED_OPTION, seed.trim());
        }

        let source = parse_source(&lookup)?;

        Ok(Self {
            index,
            orchestrator,
            loader,
            options,
            source,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, IndexingError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| IndexingError::config(format!("{} '{}' is invalid: {}", name, raw, e))),
        _ => Ok(default),
    }
}

fn parse_source<F>(lookup: &F) -> Result<SourceConfig, IndexingError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup("TWEET_SOURCE").unwrap_or_else(|| "stdin".to_string());
    let raw = raw.trim();

    if raw.is_empty() || raw.eq_ignore_ascii_case("stdin") {
        return Ok(SourceConfig::Stdin);
    }
    if raw.eq_ignore_ascii_case("kafka") {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        return Ok(SourceConfig::Kafka {
            broker: var("KAFKA_BROKER", DEFAULT_KAFKA_BROKER),
            group_id: var("KAFKA_GROUP_ID", DEFAULT_KAFKA_GROUP_ID),
            topic: var("KAFKA_TOPIC", DEFAULT_KAFKA_TOPIC),
        });
    }
    if let Some(count) = raw.strip_prefix("mock:") {
        let count = count.trim().parse::<usize>().map_err(|e| {
            IndexingError::config(format!("TWEET_SOURCE '{}' has an invalid count: {}", raw, e))
        })?;
        return Ok(SourceConfig::Mock { count });
    }

    Err(IndexingError::config(format!(
        "TWEET_SOURCE '{}' is not one of stdin, mock:<count>, kafka",
        raw
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<IndexerConfig, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        IndexerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("INDEX_URL", "http://localhost:9200")]).unwrap();

        assert_eq!(config.index.collection, "tweets");
        assert_eq!(config.loader, LoaderConfig::default());
        assert_eq!(config.orchestrator, OrchestratorConfig::default());
        assert_eq!(config.source, SourceConfig::Stdin);
        assert_eq!(config.options.get(TWEET_FILTERS_OPTION), None);
        assert_eq!(config.options.get(SYNTHETIC_SEED_OPTION), None);
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("INDEX_URL", "https://search.internal:9200"),
            ("INDEX_COLLECTION", "tweets-v2"),
            ("MAX_BATCH_SIZE", "250"),
            ("WORKER_COUNT", "4"),
            ("MAX_RETRIES", "5"),
            ("TWEET_FILTERS", "rust,tokio"),
            ("SYNTHETIC_SEED", "42"),
            ("TWEET_SOURCE", "mock:500"),
        ])
        .unwrap();

        assert_eq!(config.index.collection, "tweets-v2");
        assert_eq!(config.loader.max_batch_size, 250);
        assert_eq!(config.loader.max_retries, 5);
        assert_eq!(config.orchestrator.worker_count, 4);
        assert_eq!(config.options.get(TWEET_FILTERS_OPTION), Some("rust,tokio"));
        assert_eq!(config.options.get(SYNTHETIC_SEED_OPTION), Some("42"));
        assert_eq!(config.source, SourceConfig::Mock { count: 500 });
    }

    #[test]
    fn test_missing_or_invalid_url() {
        assert!(matches!(load(&[]), Err(IndexingError::ConfigError(_))));
        assert!(matches!(
            load(&[("INDEX_URL", "not a url")]),
            Err(IndexingError::ConfigError(_))
        ));
        assert!(matches!(
            load(&[("INDEX_URL", "http://localhost:9200"), ("INDEX_COLLECTION", "")]),
            Err(IndexingError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_non_positive_sizes() {
        for name in ["MAX_BATCH_SIZE", "WORKER_COUNT", "INTAKE_QUEUE_SIZE"] {
            let result = load(&[("INDEX_URL", "http://localhost:9200"), (name, "0")]);
            assert!(
                matches!(result, Err(IndexingError::ConfigError(_))),
                "{} = 0 should be rejected",
                name
            );
        }
        assert!(load(&[("INDEX_URL", "http://localhost:9200"), ("MAX_BATCH_SIZE", "-1")]).is_err());
    }

    #[test]
    fn test_rejects_bad_filters_and_seed() {
        assert!(load(&[
            ("INDEX_URL", "http://localhost:9200"),
            ("TWEET_FILTERS", "rust,,go")
        ])
        .is_err());
        assert!(load(&[
            ("INDEX_URL", "http://localhost:9200"),
            ("SYNTHETIC_SEED", "seed")
        ])
        .is_err());
    }

    #[test]
    fn test_kafka_source() {
        let config = load(&[
            ("INDEX_URL", "http://localhost:9200"),
            ("TWEET_SOURCE", "kafka"),
            ("KAFKA_TOPIC", "raw-tweets"),
        ])
        .unwrap();

        assert_eq!(
            config.source,
            SourceConfig::Kafka {
                broker: "localhost:9092".to_string(),
                group_id: "tweet-indexer".to_string(),
                topic: "raw-tweets".to_string(),
            }
        );
        assert!(load(&[("INDEX_URL", "http://localhost:9200"), ("TWEET_SOURCE", "ftp")]).is_err());
    }
}
