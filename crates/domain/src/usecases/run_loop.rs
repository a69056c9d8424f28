//! Run loop use case - orchestrates fetching, screening, composing, publishing and recording

use std::sync::Arc;
use std::time::Duration;

use crate::{
    model::{CandidateItem, ComposeOutcome, PostedRecord, ProcessResult},
    policy::{ItemFilter, TagPolicy, TagPolicyConfig},
    ports::{AppendOutcome, Clock, DedupStore, Enricher, Fetcher, LinkChecker, LinkPreviewer, Publisher, TopicValidator},
    usecases::{
        compose::{ComposeConfig, Composer},
        enrich::EnrichUseCase,
        retry::RetryPolicy,
        screen::{ScreenConfig, ScreenUseCase, Screening},
    },
};

/// Configuration for the run loop
#[derive(Debug, Clone)]
pub struct RunLoopConfig {
    /// Dry run mode (compose and log, don't publish or record)
    pub dry_run: bool,
    /// Pause between consecutive publishes
    pub post_delay: Duration,
    /// Stop after this many publishes (None = unlimited)
    pub max_posts_per_run: Option<usize>,
    /// Item-level skip rules
    pub item_filter: ItemFilter,
    /// Hashtag normalization
    pub tag_policy: TagPolicyConfig,
    /// Retry policy for tag suggestions
    pub enrich_retry: RetryPolicy,
    /// Screening settings, used when a validator is attached
    pub screen: ScreenConfig,
    /// Compose config
    pub compose: ComposeConfig,
}

impl Default for RunLoopConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            post_delay: Duration::from_secs(2),
            max_posts_per_run: None,
            item_filter: ItemFilter::default(),
            tag_policy: TagPolicyConfig::default(),
            enrich_retry: RetryPolicy::default(),
            screen: ScreenConfig::default(),
            compose: ComposeConfig::default(),
        }
    }
}

/// Run loop orchestrator
pub struct RunLoop<F, P, D, Cl>
where
    F: Fetcher + ?Sized,
    P: Publisher + ?Sized,
    D: DedupStore + ?Sized,
    Cl: Clock + ?Sized,
{
    fetcher: Arc<F>,
    publisher: Arc<P>,
    dedup_store: Arc<D>,
    clock: Arc<Cl>,
    enrich: EnrichUseCase,
    screen: Option<ScreenUseCase>,
    composer: Composer,
    config: RunLoopConfig,
}

impl<F, P, D, Cl> RunLoop<F, P, D, Cl>
where
    F: Fetcher + ?Sized,
    P: Publisher + ?Sized,
    D: DedupStore + ?Sized,
    Cl: Clock + ?Sized,
{
    pub fn new(
        fetcher: Arc<F>,
        publisher: Arc<P>,
        dedup_store: Arc<D>,
        clock: Arc<Cl>,
        config: RunLoopConfig,
    ) -> Self {
        let enrich = EnrichUseCase::new(
            None,
            TagPolicy::new(config.tag_policy.clone()),
            config.enrich_retry.clone(),
        );
        let composer = Composer::new(config.compose.clone());

        Self {
            fetcher,
            publisher,
            dedup_store,
            clock,
            enrich,
            screen: None,
            composer,
            config,
        }
    }

    /// Ask an LLM for hashtags instead of deriving them from the title
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enrich = EnrichUseCase::new(
            Some(enricher),
            TagPolicy::new(self.config.tag_policy.clone()),
            self.config.enrich_retry.clone(),
        );
        self
    }

    /// Screen every item for topic fit before composing
    pub fn with_validator(mut self, validator: Arc<dyn TopicValidator>) -> Self {
        self.screen = Some(ScreenUseCase::new(validator, self.config.screen.clone()));
        self
    }

    pub fn with_link_checker(mut self, checker: Arc<dyn LinkChecker>) -> Self {
        self.composer = self.composer.with_link_checker(checker);
        self
    }

    pub fn with_previewer(mut self, previewer: Arc<dyn LinkPreviewer>) -> Self {
        self.composer = self.composer.with_previewer(previewer);
        self
    }

    /// Process every fetched item once, in order
    pub async fn run_once(&self) -> Result<Vec<(String, ProcessResult)>, RunLoopError> {
        let items = self
            .fetcher
            .fetch()
            .await
            .map_err(|e| RunLoopError::Fetch(e.to_string()))?;

        tracing::info!(count = items.len(), "Fetched candidate items");

        let mut results = Vec::with_capacity(items.len());
        let mut published = 0usize;

        for item in items {
            if let Some(max) = self.config.max_posts_per_run {
                if published >= max {
                    tracing::info!(max_posts = max, "Reached post limit for this run");
                    break;
                }
            }

            let result = self.process_item(&item, published > 0).await;
            if matches!(result, ProcessResult::Published { .. }) {
                published += 1;
            }
            results.push((item.key, result));
        }

        Ok(results)
    }

    /// Process a single item; every failure stays inside the item
    async fn process_item(&self, item: &CandidateItem, pace: bool) -> ProcessResult {
        if let Some(reason) = self.config.item_filter.rejection(item) {
            return ProcessResult::Skipped { reason };
        }

        // Check dedup state
        match self.dedup_store.contains(&item.key).await {
            Ok(true) => {
                return ProcessResult::Skipped {
                    reason: "Already posted".to_string(),
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to check dedup state, continuing");
            }
            Ok(false) => {}
        }

        if let Some(screen) = &self.screen {
            if let Screening::Rejected { reason } = screen.screen(item).await {
                return ProcessResult::Skipped { reason };
            }
        }

        let tags = self.enrich.tags_for(item).await;

        tracing::info!(
            key = %item.key,
            title = %item.title,
            tags = ?tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            "Selected hashtags"
        );

        let post = match self.composer.compose(item, &tags).await {
            ComposeOutcome::Ready(post) => post,
            ComposeOutcome::Skip { reason } => return ProcessResult::Skipped { reason },
        };

        if self.config.dry_run {
            tracing::info!(
                key = %item.key,
                text = %post.text,
                spans = post.spans.len(),
                has_preview = post.preview.is_some(),
                "[DRY RUN] Would publish"
            );
            return ProcessResult::Published {
                post_uri: None,
                tags,
            };
        }

        if pace && !self.config.post_delay.is_zero() {
            tokio::time::sleep(self.config.post_delay).await;
        }

        let published = match self.publisher.publish(&post).await {
            Ok(result) => result,
            Err(e) => {
                return ProcessResult::Failed {
                    error: format!("Publishing to {} failed: {}", self.publisher.platform(), e),
                };
            }
        };

        // Record published state
        let record = PostedRecord {
            key: item.key.clone(),
            posted_at: self.clock.now(),
            tags: tags.clone(),
            title: item.title.clone(),
        };

        match self.dedup_store.append(record).await {
            Ok(AppendOutcome::Appended) => {}
            Ok(AppendOutcome::AlreadyExists) => {
                tracing::debug!(key = %item.key, "Dedup key already exists");
            }
            Err(e) => {
                tracing::error!(key = %item.key, error = %e, "Failed to record posted item");
            }
        }

        ProcessResult::Published {
            post_uri: Some(published.uri),
            tags,
        }
    }
}

/// Errors from the run loop
#[derive(Debug, thiserror::Error)]
pub enum RunLoopError {
    #[error("Fetch error: {0}")]
    Fetch(String),
}
