//! Processor module for the tweet indexer pipeline.
//!
//! Transforms source events into index documents.

mod enrichment;
mod features;
mod stream_processor;
mod transformer;

pub use enrichment::{
    Enrichment, SyntheticEnrichment, SYNTHETIC_BUCKET_FIELD, SYNTHETIC_SCORE_FIELD,
};
pub use features::{tokenize, FeatureExtractor, Lexicon, BYTES_FIELD, SENTIMENT_FIELD};
pub use stream_processor::{
    EnrichmentFactory, ProcessingPlan, ProcessorOption, ProcessorOptions, StreamProcessor,
    TweetToIndexProcessor, SYNTHETIC_SEED_OPTION, TWEET_FILTERS_OPTION,
};
pub use transformer::{
    DocumentTransformer, FieldMapping, GEO_LOCATION_FIELDS, PLACE_FIELDS, PROVIDER, TWEET_FIELDS,
};
