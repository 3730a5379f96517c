//! Common types and utilities shared across the research-agent crates.
//!
//! This crate defines the top-level error type and observability helpers
//! used throughout the workspace. It is intentionally lightweight and
//! dependency-minimal so that all crates can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`ResearchError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use nowhere_common::ResearchError;
//!
//! let err = ResearchError::InvalidQuery;
//! assert_eq!(err.to_string(), "invalid query: must not be empty");
//! ```
pub mod observability;

/// Error types surfaced by the research agent and the components it drives.
///
/// Per-component errors (search, extraction, LLM) are their own small
/// `thiserror` enums; this is the top-level type returned from
/// `getResponse`/`get_response`, matching the fatal/input error kinds named
/// in the external-interface and error-handling sections of the spec.
#[derive(thiserror::Error, Debug)]
pub enum ResearchError {
    /// The question/query string was empty.
    #[error("invalid query: must not be empty")]
    InvalidQuery,

    /// A URL could not be parsed or was otherwise unusable.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Every configured search provider failed and nothing was visited.
    #[error("no search results: {0}")]
    NoSearchResults(String),

    /// Cumulative token usage exceeded the configured budget.
    #[error("token budget exceeded: used {used}, budget {budget}")]
    TokenBudgetExceeded { used: u64, budget: u64 },

    /// The LLM's reply could not be decoded by the strict parser.
    #[error("invalid LLM response: {0}")]
    InvalidLlmResponse(String),

    /// The run was cancelled before it produced a result.
    #[error("cancelled")]
    Cancelled,

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation exceeded the configured timeout.
    #[error("timeout occurred")]
    Timeout,

    /// Catch-all for errors bubbling up from HTTP/IO/JSON layers that the
    /// caller does not itself classify.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenient alias for results that use [`ResearchError`].
pub type Result<T> = std::result::Result<T, ResearchError>;
