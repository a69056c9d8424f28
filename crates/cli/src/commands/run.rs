//! Run command - fetch, compose, publish and record one batch

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use skypost_adapters::{
    bluesky::{BlueskyClient, StubPublisher},
    dedup::JsonFileDedupStore,
    feeds::{NewsApiConfig, NewsApiFetcher, RssFetcher},
    llm::{self, GeminiClient, StubEnricher, StubValidator},
    web::{HttpLinkChecker, OpenGraphPreviewer},
};
use skypost_domain::{
    Enricher, Fetcher, ProcessResult, Publisher, SystemClock, TopicValidator,
    policy::{ItemFilter, TagPolicyConfig},
    usecases::{
        BodySource, ComposeConfig, MarkerRule, OnFailure, RetryPolicy, RunLoop, RunLoopConfig,
        ScreenConfig, compose::default_marker_rules,
    },
};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, BodyField, LlmProvider, ScreenFailure, SourceKind};

pub async fn execute(config: AppConfig, dry_run_flag: bool) -> Result<()> {
    let dry_run = dry_run_flag || config.general.dry_run;

    tracing::info!(
        dry_run = dry_run,
        source = ?config.source.kind,
        llm = ?config.llm.provider,
        dedup_path = %config.general.dedup_path.display(),
        "Starting skypost run"
    );

    let dedup_store = Arc::new(JsonFileDedupStore::load(&config.general.dedup_path).await);
    let fetcher = build_fetcher(&config)?;

    // Publishing needs credentials only when it will actually happen
    let bluesky = if dry_run {
        None
    } else {
        Some(Arc::new(build_bluesky_client(&config)?))
    };
    let publisher: Arc<dyn Publisher> = match &bluesky {
        Some(client) => client.clone(),
        None => Arc::new(StubPublisher::new()),
    };

    let (enricher, validator) = build_llm(&config)?;

    let mut run_loop = RunLoop::new(
        fetcher,
        publisher,
        dedup_store.clone(),
        Arc::new(SystemClock),
        run_loop_config(&config, dry_run),
    );

    if let Some(enricher) = enricher {
        run_loop = run_loop.with_enricher(enricher);
    }
    if config.llm.screen {
        match validator {
            Some(validator) => run_loop = run_loop.with_validator(validator),
            None => tracing::warn!("Topic screening requested but no LLM provider is configured"),
        }
    }

    let timeout = Duration::from_secs(config.compose.link_timeout_secs);
    if config.compose.check_links {
        run_loop = run_loop.with_link_checker(Arc::new(HttpLinkChecker::new(timeout)));
    }
    if config.compose.previews {
        let mut previewer = OpenGraphPreviewer::new(timeout);
        if let Some(client) = &bluesky {
            previewer = previewer.with_uploader(client.clone());
        }
        run_loop = run_loop.with_previewer(Arc::new(previewer));
    }

    let results = match run_loop.run_once().await {
        Ok(results) => results,
        Err(e) => {
            // Nothing was posted; the next scheduled run retries
            tracing::error!(error = %e, "Run aborted");
            return Ok(());
        }
    };

    let mut published = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for (key, result) in results {
        match result {
            ProcessResult::Published { post_uri, tags } => {
                published += 1;
                tracing::info!(
                    key = %key,
                    post_uri = ?post_uri,
                    tags = ?tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
                    "Published"
                );
            }
            ProcessResult::Skipped { reason } => {
                skipped += 1;
                tracing::info!(key = %key, reason = %reason, "Skipped");
            }
            ProcessResult::Failed { error } => {
                failed += 1;
                tracing::error!(key = %key, error = %error, "Failed");
            }
        }
    }

    tracing::info!(
        published,
        skipped,
        failed,
        dedup_keys = dedup_store.keys().await.len(),
        "skypost run completed"
    );
    Ok(())
}

fn build_fetcher(config: &AppConfig) -> Result<Arc<dyn Fetcher>> {
    let fetcher: Arc<dyn Fetcher> = match config.source.kind {
        SourceKind::Rss => {
            if config.source.feed_url.trim().is_empty() {
                bail!("source.feed_url is empty");
            }
            Arc::new(RssFetcher::new(config.source.feed_url.clone()))
        }
        SourceKind::NewsApi => {
            let api_key = load_api_key(&config.source.news_api_key_env, "news_api")?;
            let news_config = NewsApiConfig {
                query: config.source.query.clone(),
                domains: config.source.domains.clone(),
                window_days: config.source.window_days,
                ..Default::default()
            };
            Arc::new(NewsApiFetcher::new(api_key, news_config))
        }
    };
    Ok(fetcher)
}

fn build_bluesky_client(config: &AppConfig) -> Result<BlueskyClient> {
    let handle = std::env::var(&config.bluesky.handle_env)
        .ok()
        .filter(|h| !h.trim().is_empty())
        .with_context(|| format!("Missing Bluesky handle env var {}", config.bluesky.handle_env))?;
    let password = load_api_key(&config.bluesky.password_env, "bluesky")?;

    Ok(
        BlueskyClient::with_base_url(handle, password, config.bluesky.service.clone())
            .with_max_graphemes(config.compose.max_graphemes),
    )
}

type LlmPorts = (Option<Arc<dyn Enricher>>, Option<Arc<dyn TopicValidator>>);

fn build_llm(config: &AppConfig) -> Result<LlmPorts> {
    match config.llm.provider {
        LlmProvider::Gemini => {
            let api_key = load_api_key(&config.llm.api_key_env, "gemini")?;
            let mut llm_config = llm::LlmConfig {
                model: config.llm.model.clone(),
                timeout_secs: config.llm.timeout_secs,
                ..Default::default()
            };
            if let Some(topic) = &config.llm.topic {
                llm_config.topic = topic.clone();
            }
            let client = Arc::new(GeminiClient::new(api_key, llm_config));
            let enricher: Arc<dyn Enricher> = client.clone();
            let validator: Arc<dyn TopicValidator> = client;
            Ok((Some(enricher), Some(validator)))
        }
        LlmProvider::Stub => {
            let enricher: Arc<dyn Enricher> = Arc::new(StubEnricher::echo());
            let validator: Arc<dyn TopicValidator> = Arc::new(StubValidator::accept_all());
            Ok((Some(enricher), Some(validator)))
        }
        LlmProvider::None => Ok((None, None)),
    }
}

fn run_loop_config(config: &AppConfig, dry_run: bool) -> RunLoopConfig {
    let retry = RetryPolicy {
        max_attempts: config.llm.retries.saturating_add(1),
        base_delay: Duration::from_millis(config.llm.base_delay_ms),
        ..Default::default()
    };

    let markers = if config.compose.markers.is_empty() {
        default_marker_rules()
    } else {
        config
            .compose
            .markers
            .iter()
            .map(|m| MarkerRule::new(&m.keyword, &m.marker))
            .collect()
    };

    RunLoopConfig {
        dry_run,
        post_delay: Duration::from_secs(config.general.post_delay_secs),
        max_posts_per_run: config.general.max_posts_per_run,
        item_filter: ItemFilter {
            blocked_domains: config.source.blocked_domains.clone(),
        },
        tag_policy: TagPolicyConfig::default(),
        enrich_retry: retry.clone(),
        screen: ScreenConfig {
            on_failure: match config.llm.on_screen_failure {
                ScreenFailure::Accept => OnFailure::Accept,
                ScreenFailure::Reject => OnFailure::Reject,
            },
            retry,
        },
        compose: ComposeConfig {
            max_graphemes: config.compose.max_graphemes,
            max_tags: config.compose.max_tags,
            body_source: match config.compose.body {
                BodyField::Title => BodySource::Title,
                BodyField::Description => BodySource::Description,
            },
            markers_enabled: config.compose.markers_enabled,
            default_marker: config
                .compose
                .default_marker
                .clone()
                .filter(|m| !m.trim().is_empty()),
            markers,
        },
    }
}

pub(crate) fn load_api_key(env_var: &str, provider: &str) -> Result<SecretString> {
    if env_var.trim().is_empty() {
        bail!("No API key env var configured for provider {}", provider);
    }

    let key = std::env::var(env_var).with_context(|| {
        format!(
            "Missing API key env var {} for provider {}",
            env_var, provider
        )
    })?;

    if key.trim().is_empty() {
        bail!(
            "API key env var {} is empty for provider {}",
            env_var,
            provider
        );
    }

    Ok(SecretString::new(key.into()))
}
