//! Stub providers for testing and offline mode

use async_trait::async_trait;
use skypost_domain::{CandidateItem, EnrichError, Enricher, Tag, TopicValidator};

fn clone_error(error: &EnrichError) -> EnrichError {
    match error {
        EnrichError::Api(msg) => EnrichError::Api(msg.clone()),
        EnrichError::InvalidFormat(msg) => EnrichError::InvalidFormat(msg.clone()),
        EnrichError::RateLimited => EnrichError::RateLimited,
        EnrichError::Timeout => EnrichError::Timeout,
    }
}

/// Stub enricher returning fixed tags, or echoing title keywords
pub struct StubEnricher {
    tags: Option<Vec<Tag>>,
    error: Option<EnrichError>,
}

impl StubEnricher {
    /// Derive tags from capitalized title words
    pub fn echo() -> Self {
        Self {
            tags: None,
            error: None,
        }
    }

    /// Always return these tags
    pub fn with_tags(tags: Vec<Tag>) -> Self {
        Self {
            tags: Some(tags),
            error: None,
        }
    }

    /// Always fail with this error
    pub fn with_error(error: EnrichError) -> Self {
        Self {
            tags: None,
            error: Some(error),
        }
    }
}

impl Default for StubEnricher {
    fn default() -> Self {
        Self::echo()
    }
}

#[async_trait]
impl Enricher for StubEnricher {
    async fn suggest_tags(&self, title: &str, _description: &str) -> Result<Vec<Tag>, EnrichError> {
        if let Some(ref error) = self.error {
            return Err(clone_error(error));
        }

        if let Some(ref tags) = self.tags {
            return Ok(tags.clone());
        }

        // Echo mode: capitalized alphanumeric words of the title
        Ok(title
            .split_whitespace()
            .filter(|w| w.chars().next().is_some_and(char::is_uppercase))
            .filter_map(|w| Tag::parse(w).ok())
            .take(5)
            .collect())
    }
}

/// Stub validator with a fixed verdict
pub struct StubValidator {
    verdict: Result<bool, EnrichError>,
}

impl StubValidator {
    pub fn accept_all() -> Self {
        Self { verdict: Ok(true) }
    }

    pub fn reject_all() -> Self {
        Self { verdict: Ok(false) }
    }

    pub fn with_error(error: EnrichError) -> Self {
        Self {
            verdict: Err(error),
        }
    }
}

impl Default for StubValidator {
    fn default() -> Self {
        Self::accept_all()
    }
}

#[async_trait]
impl TopicValidator for StubValidator {
    async fn is_on_topic(&self, _item: &CandidateItem) -> Result<bool, EnrichError> {
        match &self.verdict {
            Ok(verdict) => Ok(*verdict),
            Err(error) => Err(clone_error(error)),
        }
    }
}
