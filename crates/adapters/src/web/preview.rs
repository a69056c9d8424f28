//! Open Graph link-card previewer

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use skypost_domain::{BlobRef, BlobUploader, LinkPreviewer, PreviewCard, PreviewError};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::{USER_AGENT, with_scheme};

/// Thumbnails above this size are not uploaded
pub const MAX_THUMB_BYTES: usize = 1_000_000;

/// Builds link cards from a page's `og:` meta tags
pub struct OpenGraphPreviewer {
    client: Client,
    uploader: Option<Arc<dyn BlobUploader>>,
}

#[derive(Debug, Default, PartialEq)]
struct OgMeta {
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
}

impl OpenGraphPreviewer {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            uploader: None,
        }
    }

    /// Upload `og:image` thumbnails through this uploader
    pub fn with_uploader(mut self, uploader: Arc<dyn BlobUploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    async fn thumbnail(&self, image_url: &str) -> Option<BlobRef> {
        let uploader = self.uploader.as_ref()?;

        let response = match self.client.get(image_url).send().await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!(url = %image_url, status = %r.status(), "Thumbnail fetch returned error status");
                return None;
            }
            Err(e) => {
                tracing::warn!(url = %image_url, error = %e, "Thumbnail fetch failed");
                return None;
            }
        };

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        if let Some(size) = response.content_length() {
            if size > MAX_THUMB_BYTES as u64 {
                tracing::warn!(url = %image_url, size, "Thumbnail too large, skipping");
                return None;
            }
        }

        let bytes = match read_capped(response, MAX_THUMB_BYTES).await {
            Ok(Some(b)) => b,
            Ok(None) => {
                tracing::warn!(url = %image_url, limit = MAX_THUMB_BYTES, "Thumbnail too large, skipping");
                return None;
            }
            Err(e) => {
                tracing::warn!(url = %image_url, error = %e, "Thumbnail download failed");
                return None;
            }
        };

        match uploader.upload_blob(bytes, &mime).await {
            Ok(blob) => Some(blob),
            Err(e) => {
                tracing::warn!(url = %image_url, error = %e, "Thumbnail upload failed");
                None
            }
        }
    }
}

/// Read a body chunk by chunk, giving up once it grows past `limit` bytes
async fn read_capped(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Option<Vec<u8>>, reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Ok(None);
        }
        body.extend_from_slice(&chunk);
    }
    Ok(Some(body))
}

#[async_trait]
impl LinkPreviewer for OpenGraphPreviewer {
    async fn preview(&self, url: &str) -> Result<PreviewCard, PreviewError> {
        let url = with_scheme(url);
        let page_url = Url::parse(&url).map_err(|e| PreviewError::Parse(e.to_string()))?;

        let response = self
            .client
            .get(page_url.clone())
            .send()
            .await
            .map_err(|e| PreviewError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PreviewError::Status(response.status().as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PreviewError::Fetch(e.to_string()))?;
        let meta = extract_og(&html);

        let thumb = match meta.image.as_deref() {
            Some(image) => match page_url.join(image) {
                Ok(image_url) => self.thumbnail(image_url.as_str()).await,
                Err(e) => {
                    tracing::warn!(image = %image, error = %e, "Unusable og:image URL");
                    None
                }
            },
            None => None,
        };

        tracing::debug!(url = %url, has_thumb = thumb.is_some(), "Built link card");

        Ok(PreviewCard {
            uri: url,
            title: meta.title.unwrap_or_default(),
            description: meta.description.unwrap_or_default(),
            thumb,
        })
    }
}

fn extract_og(html: &str) -> OgMeta {
    let document = Html::parse_document(html);
    let content_of = |property: &str| -> Option<String> {
        let selector = Selector::parse(&format!(r#"meta[property="{}"]"#, property)).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(str::trim)
            .find(|c| !c.is_empty())
            .map(str::to_string)
    };

    OgMeta {
        title: content_of("og:title"),
        description: content_of("og:description"),
        image: content_of("og:image"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skypost_domain::PublishError;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct RecordingUploader {
        uploads: Mutex<Vec<(usize, String)>>,
        fail: bool,
    }

    impl RecordingUploader {
        fn new(fail: bool) -> Self {
            Self {
                uploads: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl BlobUploader for RecordingUploader {
        async fn upload_blob(
            &self,
            bytes: Vec<u8>,
            mime_type: &str,
        ) -> Result<BlobRef, PublishError> {
            self.uploads
                .lock()
                .unwrap()
                .push((bytes.len(), mime_type.to_string()));
            if self.fail {
                return Err(PublishError::Api("upload refused".to_string()));
            }
            Ok(BlobRef(serde_json::json!({"$type": "blob", "size": bytes.len()})))
        }
    }

    const PAGE: &str = r#"<html><head>
        <title>Fallback</title>
        <meta property="og:title" content="Walking helps" />
        <meta property="og:description" content="A short walk after meals." />
        <meta property="og:image" content="/img/walk.png" />
    </head><body></body></html>"#;

    #[test]
    fn test_extract_og() {
        let meta = extract_og(PAGE);
        assert_eq!(meta.title.as_deref(), Some("Walking helps"));
        assert_eq!(meta.description.as_deref(), Some("A short walk after meals."));
        assert_eq!(meta.image.as_deref(), Some("/img/walk.png"));

        assert_eq!(extract_og("<html></html>"), OgMeta::default());
    }

    #[tokio::test]
    async fn test_preview_uploads_resolved_thumbnail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/walk.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "image/png")
                    .set_body_bytes(vec![1u8; 64]),
            )
            .mount(&server)
            .await;

        let uploader = Arc::new(RecordingUploader::new(false));
        let previewer =
            OpenGraphPreviewer::new(Duration::from_secs(5)).with_uploader(uploader.clone());

        let url = format!("{}/article", server.uri());
        let card = previewer.preview(&url).await.unwrap();

        assert_eq!(card.uri, url);
        assert_eq!(card.title, "Walking helps");
        assert_eq!(card.description, "A short walk after meals.");
        assert!(card.thumb.is_some());
        assert_eq!(
            uploader.uploads.lock().unwrap().as_slice(),
            &[(64, "image/png".to_string())]
        );
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_card() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/walk.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 8]))
            .mount(&server)
            .await;

        let previewer = OpenGraphPreviewer::new(Duration::from_secs(5))
            .with_uploader(Arc::new(RecordingUploader::new(true)));

        let card = previewer
            .preview(&format!("{}/article", server.uri()))
            .await
            .unwrap();
        assert_eq!(card.title, "Walking helps");
        assert!(card.thumb.is_none());
    }

    #[tokio::test]
    async fn test_oversized_thumbnail_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(PAGE))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/img/walk.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; MAX_THUMB_BYTES + 1]))
            .mount(&server)
            .await;

        let uploader = Arc::new(RecordingUploader::new(false));
        let previewer =
            OpenGraphPreviewer::new(Duration::from_secs(5)).with_uploader(uploader.clone());

        let card = previewer
            .preview(&format!("{}/article", server.uri()))
            .await
            .unwrap();
        assert!(card.thumb.is_none());
        assert!(uploader.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_capped_stops_past_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64]))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let over = client.get(server.uri()).send().await.unwrap();
        assert!(read_capped(over, 63).await.unwrap().is_none());

        let exact = client.get(server.uri()).send().await.unwrap();
        assert_eq!(read_capped(exact, 64).await.unwrap(), Some(vec![7u8; 64]));
    }

    #[tokio::test]
    async fn test_page_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let previewer = OpenGraphPreviewer::new(Duration::from_secs(5));
        let result = previewer.preview(&format!("{}/missing", server.uri())).await;
        assert!(matches!(result, Err(PreviewError::Status(404))));
    }
}
