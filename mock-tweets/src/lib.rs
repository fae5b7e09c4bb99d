//! Mock tweet stream generation for testing.
//!
//! This crate provides a single source of reproducible tweets, so the
//! pipeline tests and local runs of the indexer consume the same data.
//!
//! # Usage
//!
//! ## Deterministic Testing
//!
//! ```rust
//! use mock_tweets::{MockConfig, MockTweetStream};
//!
//! let tweets: Vec<_> = MockTweetStream::new(MockConfig::default())
//!     .take(10)
//!     .collect();
//! assert_eq!(tweets[0].id, 1);
//! ```
//!
//! ## Random Generation (requires `random` feature)
//!
//! ```rust,ignore
//! use mock_tweets::MockTweetStream;
//! use rand::thread_rng;
//!
//! let tweets = MockTweetStream::random_batch(&mut thread_rng(), 100);
//! ```
//!
//! # Features
//!
//! - `random`: Enables random tweet generation using the `rand` crate.

pub mod generator;

pub use generator::{MockConfig, MockTweetStream};
