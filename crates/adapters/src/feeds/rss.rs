//! RSS/Atom feed fetcher

use async_trait::async_trait;
use feed_rs::model::Entry;
use reqwest::Client;
use skypost_domain::{CandidateItem, FetchError, Fetcher, link_hash};
use std::path::PathBuf;
use std::time::Duration;
use time::OffsetDateTime;
use url::Url;

use super::html_to_text;
use crate::USER_AGENT;

/// Fetches a feed over HTTP, or from disk for `file://` URLs and plain paths
pub struct RssFetcher {
    client: Client,
    location: String,
}

impl RssFetcher {
    pub fn new(location: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            location: location.into(),
        }
    }

    async fn read_bytes(&self) -> Result<Vec<u8>, FetchError> {
        if self.location.starts_with("http://") || self.location.starts_with("https://") {
            return self.download().await;
        }

        let path = if self.location.starts_with("file://") {
            Url::parse(&self.location)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .ok_or_else(|| FetchError::Parse(format!("Bad file URL: {}", self.location)))?
        } else {
            PathBuf::from(&self.location)
        };

        tokio::fs::read(&path)
            .await
            .map_err(|e| FetchError::Network(format!("{}: {}", path.display(), e)))
    }

    async fn download(&self) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(&self.location)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Api(format!(
                "Feed returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl Fetcher for RssFetcher {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError> {
        let bytes = self.read_bytes().await?;
        let feed =
            feed_rs::parser::parse(&bytes[..]).map_err(|e| FetchError::Parse(e.to_string()))?;

        let source_name = feed.title.map(|t| t.content);
        let total = feed.entries.len();
        let items: Vec<CandidateItem> = feed
            .entries
            .into_iter()
            .filter_map(|entry| to_candidate(entry, source_name.as_deref()))
            .collect();

        tracing::info!(
            feed = %self.location,
            entries = total,
            items = items.len(),
            "Fetched feed"
        );

        Ok(items)
    }
}

fn to_candidate(entry: Entry, source_name: Option<&str>) -> Option<CandidateItem> {
    let link = entry
        .links
        .first()
        .map(|l| l.href.trim().to_string())
        .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

    let title = entry
        .title
        .map(|t| html_to_text(&t.content))
        .unwrap_or_default();

    let description = entry
        .summary
        .map(|s| s.content)
        .or_else(|| entry.content.and_then(|c| c.body))
        .map(|raw| html_to_text(&raw))
        .unwrap_or_default();

    let published_at = entry
        .published
        .or(entry.updated)
        .and_then(|dt| OffsetDateTime::from_unix_timestamp(dt.timestamp()).ok());

    Some(CandidateItem {
        key: link_hash(&link),
        title,
        description,
        link,
        published_at,
        source_name: source_name.map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use skypost_domain::DedupStore;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Health Daily</title>
    <link>https://health.example</link>
    <description>News</description>
    <item>
      <title>Walking after meals lowers blood sugar</title>
      <link>https://health.example/walking</link>
      <description>&lt;p&gt;A short &lt;b&gt;walk&lt;/b&gt; helps.&lt;/p&gt;</description>
      <pubDate>Wed, 01 May 2024 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No date here</title>
      <link>https://health.example/undated</link>
    </item>
  </channel>
</rss>"#;

    #[tokio::test]
    async fn test_fetch_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE_RSS))
            .mount(&server)
            .await;

        let fetcher = RssFetcher::new(format!("{}/feed.xml", server.uri()));
        let items = fetcher.fetch().await.unwrap();

        assert_eq!(items.len(), 2);
        let first = &items[0];
        assert_eq!(first.title, "Walking after meals lowers blood sugar");
        assert_eq!(first.link, "https://health.example/walking");
        assert_eq!(first.description, "A short walk helps.");
        assert_eq!(first.key, link_hash("https://health.example/walking"));
        assert_eq!(first.source_name.as_deref(), Some("Health Daily"));
        assert_eq!(
            first.published_at.map(|t| t.unix_timestamp()),
            Some(1_714_557_600)
        );
        assert!(items[1].published_at.is_none());
    }

    #[tokio::test]
    async fn test_fetch_from_local_path_and_file_url() {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE_RSS.as_bytes()).expect("write feed");

        let by_path = RssFetcher::new(file.path().display().to_string());
        assert_eq!(by_path.fetch().await.unwrap().len(), 2);

        let file_url = Url::from_file_path(file.path()).expect("file url");
        let by_url = RssFetcher::new(file_url.to_string());
        assert_eq!(by_url.fetch().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = RssFetcher::new(server.uri());
        assert!(matches!(fetcher.fetch().await, Err(FetchError::Api(_))));
    }

    #[tokio::test]
    async fn test_unparseable_feed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not a feed"))
            .mount(&server)
            .await;

        let fetcher = RssFetcher::new(server.uri());
        assert!(matches!(fetcher.fetch().await, Err(FetchError::Parse(_))));
    }

    #[tokio::test]
    async fn test_keys_match_existing_posted_entries_file() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let dedup_path = dir.path().join("posted_entries.json");
        std::fs::write(
            &dedup_path,
            r##"{"2ce284828d887e8e25aff7910d981881": {"title": "Walking after meals lowers blood sugar", "date_posted": "2024-05-01T11:00:00.000000", "hashtags": ["#health"]}}"##,
        )
        .expect("write dedup file");
        let store = crate::dedup::JsonFileDedupStore::load(&dedup_path).await;

        let feed_path = dir.path().join("feed.xml");
        std::fs::write(&feed_path, SAMPLE_RSS).expect("write feed");
        let items = RssFetcher::new(feed_path.display().to_string())
            .fetch()
            .await
            .unwrap();

        assert_eq!(items[0].key, "2ce284828d887e8e25aff7910d981881");
        assert!(store.contains(&items[0].key).await.unwrap());
        assert!(!store.contains(&items[1].key).await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let fetcher = RssFetcher::new("/definitely/not/here.xml");
        assert!(matches!(fetcher.fetch().await, Err(FetchError::Network(_))));
    }
}
