//! Bluesky adapters

mod client;
mod richtext;

pub use client::BlueskyClient;

use async_trait::async_trait;
use skypost_domain::{ComposedPost, PublishError, PublishResult, Publisher};

/// Publisher that posts nothing and hands back a placeholder URI.
///
/// Wired in for dry runs so no Bluesky credentials are needed.
#[derive(Debug, Default)]
pub struct StubPublisher;

impl StubPublisher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Publisher for StubPublisher {
    async fn publish(&self, post: &ComposedPost) -> Result<PublishResult, PublishError> {
        tracing::debug!(bytes = post.text.len(), "Stub publish");
        Ok(PublishResult {
            uri: format!("at://did:stub/app.bsky.feed.post/{}", uuid::Uuid::new_v4()),
            cid: None,
        })
    }

    fn platform(&self) -> &'static str {
        "bluesky-stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stub_returns_distinct_placeholder_uris() {
        let stub = StubPublisher::new();
        let post = ComposedPost {
            text: "hello".to_string(),
            spans: vec![],
            preview: None,
        };

        let first = stub.publish(&post).await.unwrap();
        let second = stub.publish(&post).await.unwrap();

        assert_ne!(first.uri, second.uri);
        assert!(first.uri.starts_with("at://did:stub/"));
        assert_eq!(stub.platform(), "bluesky-stub");
    }
}
