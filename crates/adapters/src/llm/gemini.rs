//! Google Gemini API adapter

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use skypost_domain::{CandidateItem, EnrichError, Enricher, Tag, TopicValidator};
use std::time::Duration;

use super::{LlmConfig, build_hashtag_prompt, build_topic_prompt, parse_hashtag_lines, parse_yes_no};

/// Gemini client; suggests hashtags and screens articles by topic
pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    config: LlmConfig,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, config: LlmConfig) -> Self {
        Self::with_base_url(
            api_key,
            "https://generativelanguage.googleapis.com".to_string(),
            config,
        )
    }

    pub fn with_base_url(api_key: SecretString, base_url: String, config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    /// Single generateContent call; retries are the caller's concern
    async fn generate(&self, prompt: &str) -> Result<String, EnrichError> {
        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(self.config.temperature),
                max_output_tokens: Some(self.config.max_output_tokens),
            }),
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichError::Timeout
                } else {
                    EnrichError::Api(e.to_string())
                }
            })?;

        if response.status() == 429 {
            return Err(EnrichError::RateLimited);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichError::Api(format!(
                "API returned {}: {}",
                status, body
            )));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| EnrichError::InvalidFormat(e.to_string()))?;

        let text = api_response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(EnrichError::InvalidFormat("Empty response".to_string()));
        }

        Ok(text)
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "generationConfig")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxOutputTokens")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[async_trait]
impl Enricher for GeminiClient {
    async fn suggest_tags(&self, title: &str, description: &str) -> Result<Vec<Tag>, EnrichError> {
        let prompt = build_hashtag_prompt(title, description);
        let response = self.generate(&prompt).await?;
        let tags = parse_hashtag_lines(&response);
        tracing::debug!(count = tags.len(), model = %self.config.model, "Gemini suggested hashtags");
        Ok(tags)
    }
}

#[async_trait]
impl TopicValidator for GeminiClient {
    async fn is_on_topic(&self, item: &CandidateItem) -> Result<bool, EnrichError> {
        let prompt = build_topic_prompt(&self.config.topic, &item.title, &item.description);
        let response = self.generate(&prompt).await?;
        let verdict = parse_yes_no(&response).map_err(EnrichError::InvalidFormat)?;
        tracing::info!(title = %item.title, on_topic = verdict, "Gemini topic check");
        Ok(verdict)
    }
}
