//! Site-specific content extraction for the research agent.
//!
//! Demonstrates the "hard parts" a generic extractor can't: pagination,
//! nested comment-tree recursion, and rate-limit-aware retry, against a
//! Reddit-shaped listing API.
pub mod reddit;
