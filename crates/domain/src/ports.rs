//! Port definitions (traits) for external dependencies
//!
//! These traits define the boundaries between the domain and external systems.
//! Adapters implement these traits to connect to real infrastructure.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::model::{BlobRef, CandidateItem, ComposedPost, PostedRecord, PreviewCard, Tag};

/// Error type for fetcher operations
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Authentication failed: {0}")]
    Auth(String),
}

/// Port for pulling candidate items (RSS feed, news search)
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the current batch of candidate items
    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError>;
}

/// Error type for LLM enrichment operations
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("LLM API error: {0}")]
    Api(String),
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Timeout")]
    Timeout,
}

impl EnrichError {
    /// Rate limits and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Timeout)
    }
}

/// Port for suggesting hashtags
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Suggest up to five hashtags for an item
    async fn suggest_tags(&self, title: &str, description: &str) -> Result<Vec<Tag>, EnrichError>;
}

/// Port for judging whether an item is on-topic
#[async_trait]
pub trait TopicValidator: Send + Sync {
    /// Returns true when the item fits the bot's topic
    async fn is_on_topic(&self, item: &CandidateItem) -> Result<bool, EnrichError>;
}

/// Port for checking that a link resolves
#[async_trait]
pub trait LinkChecker: Send + Sync {
    /// Returns true when the URL answers with a 2xx/3xx status within the timeout
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Error type for link preview operations
#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("Page returned status {0}")]
    Status(u16),
    #[error("Page parse failed: {0}")]
    Parse(String),
}

/// Port for building link preview cards
#[async_trait]
pub trait LinkPreviewer: Send + Sync {
    /// Build a card from the page's Open Graph metadata
    async fn preview(&self, url: &str) -> Result<PreviewCard, PreviewError>;
}

/// Error type for publisher operations
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limited")]
    RateLimited,
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("Content too long: {len} > {max}")]
    ContentTooLong { len: usize, max: usize },
}

/// Result of a successful publish operation
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// Platform record URI
    pub uri: String,
    /// Content hash of the record, if the platform returns one
    pub cid: Option<String>,
}

/// Port for publishing composed posts
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a composed post
    async fn publish(&self, post: &ComposedPost) -> Result<PublishResult, PublishError>;

    /// Get the platform name (e.g., "bluesky")
    fn platform(&self) -> &'static str;
}

/// Port for uploading binary media (link card thumbnails)
#[async_trait]
pub trait BlobUploader: Send + Sync {
    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef, PublishError>;
}

/// Error type for dedup store operations
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Outcome of appending a key to the dedup store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Key was new and is now durably stored
    Appended,
    /// Key was already present; nothing changed
    AlreadyExists,
}

/// Port for the append-only set of already-posted keys
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Check whether a key has been posted before
    async fn contains(&self, key: &str) -> Result<bool, DedupError>;

    /// Record a posted item and persist the whole set before returning
    async fn append(&self, record: PostedRecord) -> Result<AppendOutcome, DedupError>;

    /// Number of stored keys
    async fn len(&self) -> Result<usize, DedupError>;
}

/// Port for time/clock operations (enables deterministic testing)
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> OffsetDateTime;
}

/// Real clock implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
