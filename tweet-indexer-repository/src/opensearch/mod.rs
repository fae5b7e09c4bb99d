//! OpenSearch implementation of the index target.
//!
//! This module provides a concrete implementation of `IndexTarget`
//! using OpenSearch as the backend.

mod client;
mod index_config;

pub use client::OpenSearchTarget;
pub use index_config::get_index_settings;
