//! Bluesky XRPC client: session, blob upload and post creation

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use skypost_domain::usecases::compose::grapheme_len;
use skypost_domain::{BlobRef, BlobUploader, ComposedPost, PublishError, PublishResult, Publisher};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;

use super::richtext::{ExternalEmbed, Facet, external_embed, facets};

/// Bluesky publisher and blob uploader
pub struct BlueskyClient {
    client: Client,
    base_url: String,
    handle: String,
    password: SecretString,
    max_graphemes: usize,
    session: Mutex<Option<Arc<Session>>>,
}

struct Session {
    access_jwt: SecretString,
    did: String,
}

impl BlueskyClient {
    pub fn new(handle: String, password: SecretString) -> Self {
        Self::with_base_url(handle, password, "https://bsky.social".to_string())
    }

    pub fn with_base_url(handle: String, password: SecretString, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            handle,
            password,
            max_graphemes: 300,
            session: Mutex::new(None),
        }
    }

    /// Override the post length limit, in grapheme clusters
    pub fn with_max_graphemes(mut self, max_graphemes: usize) -> Self {
        self.max_graphemes = max_graphemes;
        self
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.base_url, method)
    }

    /// Return the cached session, creating one on first use
    async fn session(&self) -> Result<Arc<Session>, PublishError> {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.as_ref() {
            return Ok(Arc::clone(session));
        }

        let response = self
            .client
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&CreateSessionRequest {
                identifier: &self.handle,
                password: self.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        if response.status() == 401 {
            return Err(PublishError::Auth(format!(
                "Bluesky rejected credentials for {}",
                self.handle
            )));
        }
        let response = check_status(response, "createSession").await?;

        let created: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        tracing::info!(handle = %self.handle, did = %created.did, "Created Bluesky session");

        let session = Arc::new(Session {
            access_jwt: SecretString::new(created.access_jwt.into()),
            did: created.did,
        });
        *guard = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Drop the cached session so the next call authenticates again
    async fn invalidate_session(&self) {
        self.session.lock().await.take();
    }
}

async fn check_status(response: Response, operation: &str) -> Result<Response, PublishError> {
    let status = response.status();
    if status == 429 {
        return Err(PublishError::RateLimited);
    }
    if status == 401 {
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::Auth(format!("{} unauthorized: {}", operation, body)));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(PublishError::Api(format!(
            "{} returned {}: {}",
            operation, status, body
        )));
    }
    Ok(response)
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    #[serde(rename = "accessJwt")]
    access_jwt: String,
    did: String,
}

#[derive(Deserialize)]
struct UploadBlobResponse {
    blob: serde_json::Value,
}

#[derive(Serialize)]
struct CreateRecordRequest<'a> {
    repo: &'a str,
    collection: &'static str,
    record: PostRecord<'a>,
}

#[derive(Serialize)]
struct PostRecord<'a> {
    #[serde(rename = "$type")]
    kind: &'static str,
    text: &'a str,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    facets: Vec<Facet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embed: Option<ExternalEmbed>,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
    #[serde(default)]
    cid: Option<String>,
}

#[async_trait]
impl BlobUploader for BlueskyClient {
    async fn upload_blob(&self, bytes: Vec<u8>, mime_type: &str) -> Result<BlobRef, PublishError> {
        let session = self.session().await?;
        let size = bytes.len();

        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.uploadBlob"))
            .bearer_auth(session.access_jwt.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let response = match check_status(response, "uploadBlob").await {
            Err(e @ PublishError::Auth(_)) => {
                self.invalidate_session().await;
                return Err(e);
            }
            other => other?,
        };

        let uploaded: UploadBlobResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        tracing::debug!(size, mime = %mime_type, "Uploaded blob");
        Ok(BlobRef(uploaded.blob))
    }
}

#[async_trait]
impl Publisher for BlueskyClient {
    async fn publish(&self, post: &ComposedPost) -> Result<PublishResult, PublishError> {
        let len = grapheme_len(&post.text);
        if len > self.max_graphemes {
            return Err(PublishError::ContentTooLong {
                len,
                max: self.max_graphemes,
            });
        }

        let session = self.session().await?;
        let created_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let request = CreateRecordRequest {
            repo: &session.did,
            collection: "app.bsky.feed.post",
            record: PostRecord {
                kind: "app.bsky.feed.post",
                text: &post.text,
                created_at,
                facets: facets(&post.spans),
                embed: post.preview.as_ref().map(external_embed),
            },
        };

        let response = self
            .client
            .post(self.xrpc("com.atproto.repo.createRecord"))
            .bearer_auth(session.access_jwt.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        let response = match check_status(response, "createRecord").await {
            Err(e @ PublishError::Auth(_)) => {
                self.invalidate_session().await;
                return Err(e);
            }
            other => other?,
        };

        let created: CreateRecordResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Api(e.to_string()))?;

        Ok(PublishResult {
            uri: created.uri,
            cid: created.cid,
        })
    }

    fn platform(&self) -> &'static str {
        "bluesky"
    }
}
