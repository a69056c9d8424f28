//! NewsAPI `everything` search fetcher

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use skypost_domain::{CandidateItem, Clock, FetchError, Fetcher, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

/// Search parameters for the NewsAPI fetcher
#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    /// Free-text query (`q`)
    pub query: String,
    /// Restrict results to these domains; empty means no restriction
    pub domains: Vec<String>,
    /// How many days back to search
    pub window_days: u32,
    pub language: String,
    pub page_size: u32,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            query: "health OR medicine OR wellness OR nutrition".to_string(),
            domains: vec![
                "medicalnewstoday.com".to_string(),
                "healthline.com".to_string(),
                "webmd.com".to_string(),
                "health.com".to_string(),
                "everydayhealth.com".to_string(),
            ],
            window_days: 30,
            language: "en".to_string(),
            page_size: 100,
        }
    }
}

/// Fetches recent articles from NewsAPI, keeping only the current UTC month
pub struct NewsApiFetcher {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: NewsApiConfig,
    clock: Arc<dyn Clock>,
}

impl NewsApiFetcher {
    pub fn new(api_key: SecretString, config: NewsApiConfig) -> Self {
        Self::with_base_url(api_key, "https://newsapi.org".to_string(), config)
    }

    pub fn with_base_url(api_key: SecretString, base_url: String, config: NewsApiConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used for the search window and month filter
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn query_params(&self, now: OffsetDateTime) -> Vec<(&'static str, String)> {
        let day = format_description!("[year]-[month]-[day]");
        let to = now.date();
        let from = to - time::Duration::days(i64::from(self.config.window_days));

        let mut params = vec![
            ("q", self.config.query.clone()),
            ("language", self.config.language.clone()),
            ("from", from.format(&day).unwrap_or_default()),
            ("to", to.format(&day).unwrap_or_default()),
            ("sortBy", "popularity".to_string()),
            ("pageSize", self.config.page_size.to_string()),
        ];
        if !self.config.domains.is_empty() {
            params.push(("domains", self.config.domains.join(",")));
        }
        params
    }
}

#[derive(Deserialize)]
struct EverythingResponse {
    status: String,
    #[serde(default, rename = "totalResults")]
    total_results: u64,
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct Article {
    #[serde(default)]
    source: Option<ArticleSource>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct ArticleSource {
    #[serde(default)]
    name: Option<String>,
}

#[async_trait]
impl Fetcher for NewsApiFetcher {
    async fn fetch(&self) -> Result<Vec<CandidateItem>, FetchError> {
        let now = self.clock.now();
        let params = self.query_params(now);
        tracing::info!(
            query = %self.config.query,
            window_days = self.config.window_days,
            "Searching NewsAPI"
        );

        let response = self
            .client
            .get(format!("{}/v2/everything", self.base_url))
            .header("X-Api-Key", self.api_key.expose_secret())
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status == 401 {
            return Err(FetchError::Auth("NewsAPI rejected the API key".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Api(format!("NewsAPI returned {}: {}", status, body)));
        }

        let body: EverythingResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        if body.status != "ok" {
            return Err(FetchError::Api(
                body.message
                    .unwrap_or_else(|| format!("NewsAPI status '{}'", body.status)),
            ));
        }

        let retrieved = body.articles.len();
        let mut items: Vec<CandidateItem> = body
            .articles
            .into_iter()
            .filter_map(to_candidate)
            .filter(|item| {
                let in_month = item
                    .published_at
                    .is_some_and(|t| same_month(t, now));
                if !in_month {
                    tracing::debug!(title = %item.title, "Skipping article outside the current month");
                }
                in_month
            })
            .collect();

        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

        tracing::info!(
            total_results = body.total_results,
            retrieved,
            current_month = items.len(),
            "Fetched NewsAPI articles"
        );

        Ok(items)
    }
}

fn same_month(a: OffsetDateTime, b: OffsetDateTime) -> bool {
    let a = a.to_offset(time::UtcOffset::UTC);
    let b = b.to_offset(time::UtcOffset::UTC);
    a.year() == b.year() && a.month() == b.month()
}

fn to_candidate(article: Article) -> Option<CandidateItem> {
    let link = article.url.filter(|u| !u.trim().is_empty())?;
    let published_at = article
        .published_at
        .as_deref()
        .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok());

    Some(CandidateItem {
        key: link.clone(),
        title: article.title.unwrap_or_default(),
        description: article.description.unwrap_or_default(),
        link,
        published_at,
        source_name: article.source.and_then(|s| s.name),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedClock(OffsetDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            self.0
        }
    }

    fn fetcher(server: &MockServer) -> NewsApiFetcher {
        NewsApiFetcher::with_base_url(
            SecretString::new("news-key".into()),
            server.uri(),
            NewsApiConfig::default(),
        )
        .with_clock(Arc::new(FixedClock(datetime!(2024-05-20 12:00 UTC))))
    }

    fn articles() -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {
                    "source": {"id": null, "name": "Healthline"},
                    "title": "Older May article",
                    "description": "Early in the month",
                    "url": "https://healthline.com/a",
                    "publishedAt": "2024-05-02T08:00:00Z"
                },
                {
                    "source": {"id": null, "name": "WebMD"},
                    "title": "April article",
                    "description": "Last month",
                    "url": "https://webmd.com/b",
                    "publishedAt": "2024-04-28T08:00:00Z"
                },
                {
                    "source": {"id": null, "name": "Health"},
                    "title": "Newest May article",
                    "description": "Yesterday",
                    "url": "https://health.com/c",
                    "publishedAt": "2024-05-19T08:00:00Z"
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_fetch_filters_current_month_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/everything"))
            .and(header("X-Api-Key", "news-key"))
            .and(query_param("from", "2024-04-20"))
            .and(query_param("to", "2024-05-20"))
            .and(query_param("sortBy", "popularity"))
            .and(query_param("language", "en"))
            .respond_with(ResponseTemplate::new(200).set_body_json(articles()))
            .mount(&server)
            .await;

        let items = fetcher(&server).fetch().await.unwrap();

        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Newest May article", "Older May article"]);
        assert_eq!(items[0].key, "https://health.com/c");
        assert_eq!(items[0].source_name.as_deref(), Some("Health"));
    }

    #[tokio::test]
    async fn test_fetch_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = fetcher(&server).fetch().await;
        assert!(matches!(result, Err(FetchError::Auth(_))));
    }

    #[tokio::test]
    async fn test_fetch_error_status_in_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "code": "parameterInvalid",
                "message": "Bad query"
            })))
            .mount(&server)
            .await;

        match fetcher(&server).fetch().await {
            Err(FetchError::Api(message)) => assert_eq!(message, "Bad query"),
            other => panic!("unexpected result: {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_articles_without_url_are_dropped() {
        let article = Article {
            source: None,
            title: Some("t".to_string()),
            description: None,
            url: None,
            published_at: None,
        };
        assert!(to_candidate(article).is_none());
    }
}
