//! Enrichment use case - hashtags from the LLM with a local fallback

use std::sync::Arc;

use crate::{
    model::{CandidateItem, Tag},
    policy::TagPolicy,
    ports::{EnrichError, Enricher},
    usecases::retry::RetryPolicy,
};

/// Use case for picking hashtags for an item
pub struct EnrichUseCase {
    enricher: Option<Arc<dyn Enricher>>,
    policy: TagPolicy,
    retry: RetryPolicy,
}

impl EnrichUseCase {
    pub fn new(enricher: Option<Arc<dyn Enricher>>, policy: TagPolicy, retry: RetryPolicy) -> Self {
        Self {
            enricher,
            policy,
            retry,
        }
    }

    /// Suggested tags, or tags derived from the title when the enricher fails
    /// or returns nothing usable. Never fails.
    pub async fn tags_for(&self, item: &CandidateItem) -> Vec<Tag> {
        let Some(enricher) = &self.enricher else {
            return self.policy.fallback_from_title(&item.title);
        };

        let suggested = self
            .retry
            .run("suggest_tags", EnrichError::is_retryable, || {
                enricher.suggest_tags(&item.title, &item.description)
            })
            .await;

        match suggested {
            Ok(tags) => {
                let tags = self.policy.normalize(tags);
                if tags.is_empty() {
                    tracing::debug!(key = %item.key, "Enricher returned no usable tags, using title");
                    self.policy.fallback_from_title(&item.title)
                } else {
                    tags
                }
            }
            Err(error) => {
                tracing::warn!(key = %item.key, error = %error, "Tag suggestion failed, using title");
                self.policy.fallback_from_title(&item.title)
            }
        }
    }
}
