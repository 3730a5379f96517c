pub mod client;
pub mod extract;
pub mod types;

pub use client::{normalize_url, RedditApi, RedditError};
pub use extract::RedditExtractor;
