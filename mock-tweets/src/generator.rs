//! Mock tweet generator for producing test events.
//!
//! Supports both deterministic mode (for reproducible tests) and random mode
//! (for load testing).

use chrono::{DateTime, Duration, TimeZone, Utc};

use tweet_indexer_shared::{
    Entities, GeoLocation, Hashtag, Place, PlaceAttributes, SourceEvent, User, UserMention,
};

const PHRASES: &[&str] = &[
    "Loving the new release, great work everyone",
    "This build is broken again, terrible day",
    "Reading about async Rust and tokio",
    "Coffee first, then code",
    "What a wonderful sunset over the bay",
    "Traffic is awful this morning",
    "Shipping a small fix before lunch",
];

const AUTHORS: &[&str] = &["alice", "bob", "carol", "dave", "erin"];

const HASHTAGS: &[&str] = &["rust", "tokio", "search", "opensearch"];

const PLACES: &[(&str, &str, &str)] = &[
    ("Germany", "DE", "Berlin"),
    ("France", "FR", "Paris"),
    ("Japan", "JP", "Tokyo"),
];

/// Configuration for the mock tweet generator.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Id of the first generated tweet.
    pub start_id: i64,
    /// Creation time of the first generated tweet.
    pub start_time: DateTime<Utc>,
    /// Seconds between consecutive tweets.
    pub interval_secs: i64,
    /// Every n-th tweet carries coordinates (0 disables).
    pub geo_every: u64,
    /// Every n-th tweet carries a place (0 disables).
    pub place_every: u64,
    /// Every n-th tweet is a reply (0 disables).
    pub reply_every: u64,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            start_id: 1,
            start_time: Utc
                .timestamp_opt(1_700_000_000, 0)
                .single()
                .unwrap_or_default(),
            interval_secs: 1,
            geo_every: 3,
            place_every: 5,
            reply_every: 4,
        }
    }
}

impl MockConfig {
    /// Set the id of the first tweet.
    pub fn with_start_id(mut self, start_id: i64) -> Self {
        self.start_id = start_id;
        self
    }

    /// Generate only flat tweets, without coordinates, places or replies.
    pub fn plain(mut self) -> Self {
        self.geo_every = 0;
        self.place_every = 0;
        self.reply_every = 0;
        self
    }
}

/// An endless, reproducible stream of tweets.
///
/// The same configuration always yields the same sequence.
#[derive(Debug)]
pub struct MockTweetStream {
    config: MockConfig,
    counter: u64,
}

impl MockTweetStream {
    /// Create a new mock stream with the given configuration.
    pub fn new(config: MockConfig) -> Self {
        Self { config, counter: 0 }
    }

    /// Create a mock stream with default configuration.
    pub fn deterministic() -> Self {
        Self::new(MockConfig::default())
    }

    /// Number of tweets generated so far.
    pub fn generated(&self) -> u64 {
        self.counter
    }

    /// Generate the next tweet.
    pub fn next_tweet(&mut self) -> SourceEvent {
        let n = self.counter;
        self.counter += 1;
        tweet(&self.config, n)
    }
}

impl Iterator for MockTweetStream {
    type Item = SourceEvent;

    fn next(&mut self) -> Option<SourceEvent> {
        Some(self.next_tweet())
    }
}

fn every(n: u64, period: u64) -> bool {
    period != 0 && (n + 1) % period == 0
}

fn pick<T: Copy>(items: &[T], n: u64) -> T {
    items[(n % items.len() as u64) as usize]
}

/// Build the `n`-th tweet (0-based) of a stream.
fn tweet(config: &MockConfig, n: u64) -> SourceEvent {
    let id = config.start_id + n as i64;
    let author = pick(AUTHORS, n);
    let hashtag = pick(HASHTAGS, n);

    let mut event = SourceEvent::new(id, format!("{} #{}", pick(PHRASES, n), hashtag), author);
    event.created_at = config.start_time + Duration::seconds(config.interval_secs * n as i64);
    event.user = User {
        id: 1000 + (n % AUTHORS.len() as u64) as i64,
        screen_name: author.to_string(),
        name: Some(format!("{} (mock)", author)),
        followers_count: Some((n * 7 % 500) as i64),
    };
    event.source = "mock-tweets".to_string();
    event.lang = Some("en".to_string());
    event.retweet_count = (n % 11) as i64;
    event.favorite_count = (n % 13) as i64;
    event.entities = Some(Entities {
        hashtags: vec![Hashtag {
            text: hashtag.to_string(),
        }],
        user_mentions: Vec::new(),
    });

    if every(n, config.geo_every) {
        event.geo_location = Some(GeoLocation {
            latitude: -45.0 + (n % 90) as f64,
            longitude: -90.0 + (n % 180) as f64,
        });
    }

    if every(n, config.place_every) {
        let (country, country_code, name) = pick(PLACES, n);
        event.place = Some(Place {
            country: Some(country.to_string()),
            country_code: Some(country_code.to_string()),
            full_name: Some(format!("{}, {}", name, country)),
            name: Some(name.to_string()),
            place_type: Some("city".to_string()),
            attributes: PlaceAttributes::default(),
        });
    }

    if every(n, config.reply_every) && id > config.start_id {
        let replied_to = pick(AUTHORS, n + 1);
        event.in_reply_to_status_id = Some(id - 1);
        event.in_reply_to_screen_name = Some(replied_to.to_string());
        if let Some(entities) = event.entities.as_mut() {
            entities.user_mentions.push(UserMention {
                screen_name: replied_to.to_string(),
            });
        }
    }

    event
}

#[cfg(feature = "random")]
mod random_impl {
    use super::*;
    use rand::Rng;

    impl MockTweetStream {
        /// Generate a tweet with random content and flags.
        pub fn random_tweet<R: Rng>(rng: &mut R) -> SourceEvent {
            let n = rng.gen::<u32>() as u64;
            let config = MockConfig {
                start_id: rng.gen_range(1..i64::MAX / 2),
                geo_every: rng.gen_range(0..4),
                place_every: rng.gen_range(0..4),
                reply_every: 0,
                ..Default::default()
            };

            let mut event = tweet(&config, n);
            event.favorited = rng.gen_bool(0.1);
            event.possibly_sensitive = rng.gen_bool(0.05);
            event.truncated = rng.gen_bool(0.2);
            event
        }

        /// Generate `count` random tweets.
        pub fn random_batch<R: Rng>(rng: &mut R, count: usize) -> Vec<SourceEvent> {
            (0..count).map(|_| Self::random_tweet(rng)).collect()
        }
    }
}
