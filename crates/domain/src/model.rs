//! Domain models and value objects

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[A-Za-z0-9]+$").expect("valid tag regex"));

/// A candidate item pulled from a feed or news search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    /// Canonical dedup key (link hash for feeds, URL for news articles)
    pub key: String,
    /// Headline
    pub title: String,
    /// Summary or teaser text, may be empty
    pub description: String,
    /// Link to the full article
    pub link: String,
    /// When the item was published, if the source says
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub published_at: Option<OffsetDateTime>,
    /// Outlet name, if known
    #[serde(default)]
    pub source_name: Option<String>,
}

/// A normalized hashtag such as `#Health`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

/// Rejected hashtag input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid hashtag '{0}': must match #[A-Za-z0-9]+")]
pub struct InvalidTag(pub String);

impl Tag {
    /// Parse a raw hashtag, removing whitespace and adding the `#` prefix if missing
    pub fn parse(raw: &str) -> Result<Self, InvalidTag> {
        let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
        let candidate = if compact.starts_with('#') {
            compact
        } else {
            format!("#{}", compact)
        };

        if TAG_PATTERN.is_match(&candidate) {
            Ok(Self(candidate))
        } else {
            Err(InvalidTag(raw.to_string()))
        }
    }

    /// Full tag text including the leading `#`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag text without the leading `#`
    pub fn bare(&self) -> &str {
        &self.0[1..]
    }
}

impl TryFrom<String> for Tag {
    type Error = InvalidTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Tag::parse(&value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What an annotation span marks up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    Link,
    Hashtag,
}

/// A byte range over the UTF-8 encoding of a post's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationSpan {
    /// Inclusive start, in bytes
    pub byte_start: usize,
    /// Exclusive end, in bytes
    pub byte_end: usize,
    pub kind: SpanKind,
    /// URL for links, tag text without `#` for hashtags
    pub payload: String,
}

impl AnnotationSpan {
    /// The substring of `text` covered by this span, if the range is valid for it
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.byte_start..self.byte_end)
    }
}

/// Reference to an uploaded blob, passed back verbatim to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobRef(pub serde_json::Value);

/// Link preview card attached to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewCard {
    pub uri: String,
    pub title: String,
    pub description: String,
    pub thumb: Option<BlobRef>,
}

/// A post ready for publishing
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedPost {
    /// Display text, bounded to the platform grapheme limit
    pub text: String,
    /// Link and hashtag spans, ordered by start offset
    pub spans: Vec<AnnotationSpan>,
    /// Optional link card
    pub preview: Option<PreviewCard>,
}

/// Result of composing a post for a candidate item
#[derive(Debug, Clone, PartialEq)]
pub enum ComposeOutcome {
    /// Post is ready to publish
    Ready(ComposedPost),
    /// Item must not be published nor recorded
    Skip { reason: String },
}

impl ComposeOutcome {
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip {
            reason: reason.into(),
        }
    }
}

/// Record of a published item (for dedup)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedRecord {
    /// Canonical dedup key
    pub key: String,
    /// When the item was published to the platform
    #[serde(with = "time::serde::rfc3339")]
    pub posted_at: OffsetDateTime,
    /// Hashtags used in the post
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Item headline at posting time
    #[serde(default)]
    pub title: String,
}

/// Processing result for a single candidate item
#[derive(Debug)]
pub enum ProcessResult {
    /// Item was composed and published (or would have been, in dry-run mode)
    Published {
        post_uri: Option<String>,
        tags: Vec<Tag>,
    },
    /// Item was skipped (already posted, off-topic, unreachable link, etc.)
    Skipped { reason: String },
    /// Publishing or recording failed
    Failed { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_parse_adds_prefix_and_strips_spaces() {
        let tag = Tag::parse(" Mental Health ").unwrap();
        assert_eq!(tag.as_str(), "#MentalHealth");
        assert_eq!(tag.bare(), "MentalHealth");
    }

    #[test]
    fn test_tag_parse_rejects_symbols() {
        assert!(Tag::parse("#covid-19").is_err());
        assert!(Tag::parse("#").is_err());
        assert!(Tag::parse("#café").is_err());
    }

    #[test]
    fn test_tag_deserialize_validates() {
        let ok: Result<Tag, _> = serde_json::from_str("\"#News\"");
        assert!(ok.is_ok());
        let bad: Result<Tag, _> = serde_json::from_str("\"#bad tag!\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_span_slice() {
        let span = AnnotationSpan {
            byte_start: 5,
            byte_end: 10,
            kind: SpanKind::Hashtag,
            payload: "News".to_string(),
        };
        assert_eq!(span.slice("🌤 #News"), Some("#News"));
        assert_eq!(span.slice("abc"), None);
    }
}
