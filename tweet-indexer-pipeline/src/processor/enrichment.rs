//! Optional post-transform enrichment.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use tweet_indexer_shared::{Document, SourceEvent};

/// Illustrative score in `[0, 1)`.
pub const SYNTHETIC_SCORE_FIELD: &str = "synthetic_score_f";
/// Illustrative bucket in `0..10`.
pub const SYNTHETIC_BUCKET_FIELD: &str = "synthetic_bucket_i";

const BUCKETS: i64 = 10;

/// A step adding fields to an already transformed document.
///
/// Each worker owns its own instance, so implementations may keep mutable
/// state without synchronisation.
pub trait Enrichment: Send {
    fn name(&self) -> &str;

    fn enrich(&mut self, event: &SourceEvent, document: &mut Document);
}

/// Adds demonstration fields drawn from an injected random source.
///
/// Not derived from the event; useful for exercising dashboards and
/// aggregations against realistic-looking numeric fields.
pub struct SyntheticEnrichment<R> {
    rng: R,
}

impl<R: Rng + Send> SyntheticEnrichment<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl SyntheticEnrichment<StdRng> {
    /// Reproducible enrichment: the same seed yields the same sequence.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> Enrichment for SyntheticEnrichment<R> {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn enrich(&mut self, event: &SourceEvent, document: &mut Document) {
        let score: f64 = self.rng.gen();
        let bucket = self.rng.gen_range(0..BUCKETS);

        if let Err(e) = document.insert(SYNTHETIC_SCORE_FIELD, score) {
            debug!(event_id = event.id, error = %e, "Skipping synthetic score");
        }
        if let Err(e) = document.insert(SYNTHETIC_BUCKET_FIELD, bucket) {
            debug!(event_id = event.id, error = %e, "Skipping synthetic bucket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrich_many(enrichment: &mut dyn Enrichment, count: i64) -> Vec<(f64, i64)> {
        (0..count)
            .map(|id| {
                let event = SourceEvent::new(id, "text", "author");
                let mut doc = Document::new(format!("tweet-{}", id));
                enrichment.enrich(&event, &mut doc);
                (
                    doc.get_float(SYNTHETIC_SCORE_FIELD).unwrap(),
                    doc.get_int(SYNTHETIC_BUCKET_FIELD).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_values_in_range() {
        let mut enrichment = SyntheticEnrichment::seeded(7);

        for (score, bucket) in enrich_many(&mut enrichment, 200) {
            assert!((0.0..1.0).contains(&score));
            assert!((0..BUCKETS).contains(&bucket));
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let first = enrich_many(&mut SyntheticEnrichment::seeded(11), 20);
        let second = enrich_many(&mut SyntheticEnrichment::seeded(11), 20);
        let other = enrich_many(&mut SyntheticEnrichment::seeded(12), 20);

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_name() {
        assert_eq!(SyntheticEnrichment::seeded(0).name(), "synthetic");
    }
}
