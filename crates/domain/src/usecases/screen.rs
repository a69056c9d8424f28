//! Screening use case - asks the topic validator whether an item belongs

use std::sync::Arc;

use crate::{
    model::CandidateItem,
    ports::{EnrichError, TopicValidator},
    usecases::retry::RetryPolicy,
};

/// What to do when the validator cannot give an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnFailure {
    /// Post anyway
    Accept,
    /// Skip the item
    #[default]
    Reject,
}

/// Configuration for screening
#[derive(Debug, Clone, Default)]
pub struct ScreenConfig {
    pub on_failure: OnFailure,
    pub retry: RetryPolicy,
}

/// Screening verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screening {
    Accepted,
    Rejected { reason: String },
}

/// Use case for on-topic screening
pub struct ScreenUseCase {
    validator: Arc<dyn TopicValidator>,
    config: ScreenConfig,
}

impl ScreenUseCase {
    pub fn new(validator: Arc<dyn TopicValidator>, config: ScreenConfig) -> Self {
        Self { validator, config }
    }

    pub async fn screen(&self, item: &CandidateItem) -> Screening {
        let verdict = self
            .config
            .retry
            .run("is_on_topic", EnrichError::is_retryable, || {
                self.validator.is_on_topic(item)
            })
            .await;

        match verdict {
            Ok(true) => Screening::Accepted,
            Ok(false) => Screening::Rejected {
                reason: "Off-topic according to validator".to_string(),
            },
            Err(error) => {
                tracing::warn!(
                    key = %item.key,
                    error = %error,
                    on_failure = ?self.config.on_failure,
                    "Topic validation failed"
                );
                match self.config.on_failure {
                    OnFailure::Accept => Screening::Accepted,
                    OnFailure::Reject => Screening::Rejected {
                        reason: format!("Topic validation failed: {}", error),
                    },
                }
            }
        }
    }
}
