//! Policy constraints for hashtags and candidate items

use std::collections::HashSet;

use crate::model::{CandidateItem, Tag};

/// Hashtag policy configuration
#[derive(Debug, Clone)]
pub struct TagPolicyConfig {
    /// Maximum tags kept from enrichment
    pub max_tags: usize,
    /// Number of title words considered for fallback tags
    pub fallback_words: usize,
}

impl Default for TagPolicyConfig {
    fn default() -> Self {
        Self {
            max_tags: 5,
            fallback_words: 3,
        }
    }
}

/// Normalizes suggested hashtags and derives fallback ones
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    config: TagPolicyConfig,
}

impl TagPolicy {
    pub fn new(config: TagPolicyConfig) -> Self {
        Self { config }
    }

    /// Drop duplicates (case-insensitive) and cap the list
    pub fn normalize(&self, tags: Vec<Tag>) -> Vec<Tag> {
        let mut seen = HashSet::new();
        let mut normalized: Vec<Tag> = tags
            .into_iter()
            .filter(|tag| seen.insert(tag.as_str().to_lowercase()))
            .collect();
        normalized.truncate(self.config.max_tags);
        normalized
    }

    /// Tags from the first few purely alphanumeric title words, lower-cased
    pub fn fallback_from_title(&self, title: &str) -> Vec<Tag> {
        let tags = title
            .split_whitespace()
            .take(self.config.fallback_words)
            .filter(|word| word.chars().all(char::is_alphanumeric))
            .filter_map(|word| Tag::parse(&word.to_lowercase()).ok())
            .collect();
        self.normalize(tags)
    }
}

/// Rules deciding whether a candidate item is worth processing at all
#[derive(Debug, Clone)]
pub struct ItemFilter {
    /// Domains never posted (matched as substrings of the lower-cased link)
    pub blocked_domains: Vec<String>,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            blocked_domains: default_blocked_domains(),
        }
    }
}

/// Social platforms whose links make poor article posts
pub fn default_blocked_domains() -> Vec<String> {
    ["facebook.com", "twitter.com", "instagram.com", "youtube.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl ItemFilter {
    /// Returns the reason an item should be skipped, if any
    pub fn rejection(&self, item: &CandidateItem) -> Option<String> {
        if item.link.trim().is_empty() {
            return Some("Missing link".to_string());
        }
        if item.title.trim().is_empty() {
            return Some("Missing title".to_string());
        }

        let link = item.link.to_lowercase();
        self.blocked_domains
            .iter()
            .find(|domain| link.contains(domain.to_lowercase().as_str()))
            .map(|domain| format!("Blocked domain: {}", domain))
    }
}
