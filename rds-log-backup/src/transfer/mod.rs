//! Transfer accounting and human-readable formatting.

pub mod progress;
