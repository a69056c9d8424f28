//! Configuration loading and management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub bluesky: BlueskyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_dedup_path")]
    pub dedup_path: PathBuf,

    #[serde(default)]
    pub dry_run: bool,

    #[serde(default = "default_post_delay")]
    pub post_delay_secs: u64,

    #[serde(default)]
    pub max_posts_per_run: Option<usize>,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Rss,
    NewsApi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Feed URL, `file://` URL or local path
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    #[serde(default = "default_news_api_key_env")]
    pub news_api_key_env: String,

    #[serde(default = "default_query")]
    pub query: String,

    #[serde(default = "default_domains")]
    pub domains: Vec<String>,

    #[serde(default = "default_blocked_domains")]
    pub blocked_domains: Vec<String>,

    #[serde(default = "default_window_days")]
    pub window_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[default]
    Gemini,
    Stub,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenFailure {
    Accept,
    #[default]
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProvider,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts after the first one
    #[serde(default = "default_llm_retries")]
    pub retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,

    /// Ask the LLM whether each item is on-topic before posting
    #[serde(default)]
    pub screen: bool,

    #[serde(default)]
    pub on_screen_failure: ScreenFailure,

    #[serde(default)]
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyField {
    #[default]
    Title,
    Description,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerEntry {
    pub keyword: String,
    pub marker: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    #[serde(default = "default_max_graphemes")]
    pub max_graphemes: usize,

    #[serde(default = "default_max_tags")]
    pub max_tags: usize,

    #[serde(default)]
    pub body: BodyField,

    #[serde(default = "default_true")]
    pub markers_enabled: bool,

    #[serde(default = "default_marker")]
    pub default_marker: Option<String>,

    /// Ordered keyword rules; empty means the built-in list
    #[serde(default)]
    pub markers: Vec<MarkerEntry>,

    #[serde(default = "default_true")]
    pub check_links: bool,

    #[serde(default = "default_link_timeout")]
    pub link_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub previews: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_bluesky_service")]
    pub service: String,

    #[serde(default = "default_bluesky_handle_env")]
    pub handle_env: String,

    #[serde(default = "default_bluesky_password_env")]
    pub password_env: String,
}

// Default value functions
fn default_dedup_path() -> PathBuf {
    PathBuf::from("./posted_entries.json")
}

fn default_post_delay() -> u64 {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_feed_url() -> String {
    "https://www.theguardian.com/uk/culture/rss".to_string()
}

fn default_news_api_key_env() -> String {
    "NEWS_API_KEY".to_string()
}

fn default_query() -> String {
    skypost_adapters::feeds::NewsApiConfig::default().query
}

fn default_domains() -> Vec<String> {
    skypost_adapters::feeds::NewsApiConfig::default().domains
}

fn default_blocked_domains() -> Vec<String> {
    skypost_domain::policy::default_blocked_domains()
}

fn default_window_days() -> u32 {
    30
}

fn default_model() -> String {
    skypost_adapters::llm::LlmConfig::default().model
}

fn default_timeout() -> u64 {
    30
}

fn default_llm_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_max_graphemes() -> usize {
    300
}

fn default_max_tags() -> usize {
    3
}

fn default_marker() -> Option<String> {
    Some("📰".to_string())
}

fn default_link_timeout() -> u64 {
    10
}

fn default_bluesky_service() -> String {
    "https://bsky.social".to_string()
}

fn default_bluesky_handle_env() -> String {
    "BLUESKY_HANDLE".to_string()
}

fn default_bluesky_password_env() -> String {
    "BLUESKY_PASSWORD".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            dedup_path: default_dedup_path(),
            dry_run: false,
            post_delay_secs: default_post_delay(),
            max_posts_per_run: None,
            log_level: default_log_level(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            feed_url: default_feed_url(),
            news_api_key_env: default_news_api_key_env(),
            query: default_query(),
            domains: default_domains(),
            blocked_domains: default_blocked_domains(),
            window_days: default_window_days(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            timeout_secs: default_timeout(),
            retries: default_llm_retries(),
            base_delay_ms: default_base_delay_ms(),
            api_key_env: default_gemini_api_key_env(),
            screen: false,
            on_screen_failure: ScreenFailure::default(),
            topic: None,
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_graphemes: default_max_graphemes(),
            max_tags: default_max_tags(),
            body: BodyField::default(),
            markers_enabled: true,
            default_marker: default_marker(),
            markers: vec![],
            check_links: true,
            link_timeout_secs: default_link_timeout(),
            previews: true,
        }
    }
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            service: default_bluesky_service(),
            handle_env: default_bluesky_handle_env(),
            password_env: default_bluesky_password_env(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Try default config path if none specified
        let default_path = PathBuf::from("./skypost.toml");
        let path = config_path.unwrap_or(&default_path);

        if path.exists() {
            builder = builder.add_source(config::File::from(path));
        } else if config_path.is_some() {
            // User specified a path that doesn't exist
            anyhow::bail!("Config file not found: {}", path.display());
        }

        // Add environment variable overrides
        builder = builder.add_source(
            config::Environment::with_prefix("SKYPOST")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
