//! Interface definitions for the index target.
//!
//! This module defines the abstract `IndexTarget` trait that allows for
//! dependency injection and swappable index backend implementations.

mod index_target;

pub use index_target::IndexTarget;
