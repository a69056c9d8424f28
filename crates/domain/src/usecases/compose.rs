//! Compose use case - turns a candidate item and hashtags into rich-text post content

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::model::{AnnotationSpan, CandidateItem, ComposeOutcome, ComposedPost, SpanKind, Tag};
use crate::ports::{LinkChecker, LinkPreviewer};

const SECTION_SEPARATOR: &str = "\n\n";
const ELLIPSIS: &str = "…";

/// Which item field becomes the post body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodySource {
    #[default]
    Title,
    /// Falls back to the title when the description is empty
    Description,
}

/// Leading marker chosen when the title contains a keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerRule {
    pub keyword: String,
    pub marker: String,
}

impl MarkerRule {
    pub fn new(keyword: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            marker: marker.into(),
        }
    }
}

/// Configuration for the composer
#[derive(Debug, Clone)]
pub struct ComposeConfig {
    /// Platform limit in grapheme clusters
    pub max_graphemes: usize,
    /// Maximum hashtags placed in the text
    pub max_tags: usize,
    /// Field used for the body
    pub body_source: BodySource,
    /// Whether to prepend a marker at all
    pub markers_enabled: bool,
    /// Marker used when no rule matches
    pub default_marker: Option<String>,
    /// Ordered rules; the first keyword found in the title wins
    pub markers: Vec<MarkerRule>,
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            max_graphemes: 300,
            max_tags: 3,
            body_source: BodySource::Title,
            markers_enabled: true,
            default_marker: Some("📰".to_string()),
            markers: default_marker_rules(),
        }
    }
}

pub fn default_marker_rules() -> Vec<MarkerRule> {
    vec![
        MarkerRule::new("breaking", "🚨"),
        MarkerRule::new("climate", "🌍"),
        MarkerRule::new("sleep", "😴"),
        MarkerRule::new("nutrition", "🥗"),
        MarkerRule::new("diet", "🥗"),
        MarkerRule::new("exercise", "🏃"),
        MarkerRule::new("fitness", "🏃"),
        MarkerRule::new("mental", "🧠"),
        MarkerRule::new("heart", "❤️"),
        MarkerRule::new("study", "🔬"),
        MarkerRule::new("research", "🔬"),
        MarkerRule::new("health", "🩺"),
    ]
}

/// Builds post text, annotation spans and the optional preview card
pub struct Composer {
    config: ComposeConfig,
    link_checker: Option<Arc<dyn LinkChecker>>,
    previewer: Option<Arc<dyn LinkPreviewer>>,
}

impl Composer {
    pub fn new(config: ComposeConfig) -> Self {
        Self {
            config,
            link_checker: None,
            previewer: None,
        }
    }

    /// Check every link before composing; unreachable links skip the item
    pub fn with_link_checker(mut self, checker: Arc<dyn LinkChecker>) -> Self {
        self.link_checker = Some(checker);
        self
    }

    /// Attach link cards; failures only drop the card
    pub fn with_previewer(mut self, previewer: Arc<dyn LinkPreviewer>) -> Self {
        self.previewer = Some(previewer);
        self
    }

    /// Compose a post, or tell the caller to skip the item
    pub async fn compose(&self, item: &CandidateItem, tags: &[Tag]) -> ComposeOutcome {
        let link = item.link.trim();
        if link.is_empty() {
            return ComposeOutcome::skip("Empty link");
        }

        if let Some(checker) = &self.link_checker {
            if !checker.is_reachable(link).await {
                return ComposeOutcome::skip(format!("Link is not reachable: {}", link));
            }
        }

        let mut post = match self.render(item, tags) {
            Ok(post) => post,
            Err(reason) => return ComposeOutcome::skip(reason),
        };

        if let Some(previewer) = &self.previewer {
            match previewer.preview(link).await {
                Ok(card) => post.preview = Some(card),
                Err(error) => {
                    tracing::warn!(link = %link, error = %error, "Link preview unavailable, posting without card");
                }
            }
        }

        tracing::debug!(
            key = %item.key,
            spans = post.spans.len(),
            has_preview = post.preview.is_some(),
            "Composed post"
        );

        ComposeOutcome::Ready(post)
    }

    /// Build the text and spans without touching the network
    pub fn render(&self, item: &CandidateItem, tags: &[Tag]) -> Result<ComposedPost, String> {
        let link = item.link.trim();
        let marker = self.select_marker(&item.title);
        let body = self.body_text(item);
        let tags: Vec<&Tag> = tags.iter().take(self.config.max_tags).collect();

        // Tags give way before the link does
        for tag_count in (0..=tags.len()).rev() {
            let kept = &tags[..tag_count];
            let tag_line = kept
                .iter()
                .map(|tag| tag.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            if let Some(text) = self.fit(marker, &body, link, &tag_line) {
                if tag_count < tags.len() {
                    tracing::debug!(
                        dropped = tags.len() - tag_count,
                        "Dropped hashtags to fit post limit"
                    );
                }
                let spans = compute_spans(&text, link, &tag_line, kept);
                return Ok(ComposedPost {
                    text,
                    spans,
                    preview: None,
                });
            }
        }

        Err(format!(
            "Link does not fit the {}-grapheme limit",
            self.config.max_graphemes
        ))
    }

    /// First matching marker rule, else the default marker
    pub fn select_marker(&self, title: &str) -> Option<&str> {
        if !self.config.markers_enabled {
            return None;
        }

        let title = title.to_lowercase();
        self.config
            .markers
            .iter()
            .find(|rule| title.contains(&rule.keyword.to_lowercase()))
            .map(|rule| rule.marker.as_str())
            .or(self.config.default_marker.as_deref())
            .filter(|marker| !marker.is_empty())
    }

    fn body_text(&self, item: &CandidateItem) -> String {
        let raw = match self.config.body_source {
            BodySource::Title => item.title.as_str(),
            BodySource::Description if item.description.trim().is_empty() => item.title.as_str(),
            BodySource::Description => item.description.as_str(),
        };
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Assemble the text, truncating only the body so the whole fits the limit
    fn fit(&self, marker: Option<&str>, body: &str, link: &str, tag_line: &str) -> Option<String> {
        let limit = self.config.max_graphemes;

        let full = assemble(&head(marker, body), link, tag_line);
        if grapheme_len(&full) <= limit {
            return Some(full);
        }

        if !body.is_empty() {
            let overhead = grapheme_len(&assemble(&head(marker, ELLIPSIS), link, tag_line));
            if overhead < limit {
                let kept = truncate_graphemes(body, limit - overhead);
                let kept = kept.trim_end();
                if !kept.is_empty() {
                    let shortened = format!("{}{}", kept, ELLIPSIS);
                    return Some(assemble(&head(marker, &shortened), link, tag_line));
                }
            }
        }

        let without_body = assemble(&head(marker, ""), link, tag_line);
        (grapheme_len(&without_body) <= limit).then_some(without_body)
    }
}

/// Number of user-perceived characters
pub fn grapheme_len(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Keep at most `max` whole grapheme clusters from the start of `text`
pub fn truncate_graphemes(text: &str, max: usize) -> &str {
    match text.grapheme_indices(true).nth(max) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

fn head(marker: Option<&str>, body: &str) -> String {
    match (marker, body.is_empty()) {
        (Some(marker), false) => format!("{} {}", marker, body),
        (Some(marker), true) => marker.to_string(),
        (None, _) => body.to_string(),
    }
}

fn assemble(head: &str, link: &str, tag_line: &str) -> String {
    [head, link, tag_line]
        .into_iter()
        .filter(|section| !section.is_empty())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR)
}

/// Spans over the final text. Offsets are byte offsets into the UTF-8 text,
/// so every multi-byte character before a span shifts it by its encoded width.
fn compute_spans(text: &str, link: &str, tag_line: &str, tags: &[&Tag]) -> Vec<AnnotationSpan> {
    let mut spans = Vec::new();

    // The tag line is always the last section, the link right before it
    let tags_start = text.len() - tag_line.len();
    if !link.is_empty() {
        if let Some(start) = text[..tags_start].rfind(link) {
            spans.push(AnnotationSpan {
                byte_start: start,
                byte_end: start + link.len(),
                kind: SpanKind::Link,
                payload: link.to_string(),
            });
        }
    }

    for tag in tags {
        if let Some(start) = find_token(text, tag.as_str(), tags_start) {
            spans.push(AnnotationSpan {
                byte_start: start,
                byte_end: start + tag.as_str().len(),
                kind: SpanKind::Hashtag,
                payload: tag.bare().to_string(),
            });
        }
    }

    spans.sort_by_key(|span| span.byte_start);
    spans
}

/// First occurrence of `needle` at or after `from` that is not a prefix of a longer word
fn find_token(text: &str, needle: &str, from: usize) -> Option<usize> {
    let haystack = text.get(from..)?;
    haystack
        .match_indices(needle)
        .map(|(offset, _)| from + offset)
        .find(|start| {
            text[start + needle.len()..]
                .chars()
                .next()
                .is_none_or(|next| !next.is_alphanumeric())
        })
}
