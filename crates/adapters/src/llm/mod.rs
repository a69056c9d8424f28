//! LLM provider adapters

pub mod gemini;
pub mod stub;

pub use gemini::GeminiClient;
pub use stub::{StubEnricher, StubValidator};

use serde::{Deserialize, Serialize};
use skypost_domain::Tag;

/// Default topic the validator screens for
pub const DEFAULT_TOPIC: &str =
    "health advice and tips rather than political commentary, drugs or medicine";

/// Common LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// Temperature (0.0-1.0)
    pub temperature: f64,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// What an on-topic article is about, used by the validator prompt
    pub topic: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.4,
            max_output_tokens: 200,
            timeout_secs: 30,
            topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

/// Build the hashtag suggestion prompt
pub fn build_hashtag_prompt(title: &str, description: &str) -> String {
    format!(
        r#"Generate 5 relevant hashtags for a social media post with the following content:
Title: {title}
Description: {description}

Rules for hashtags:
1. No spaces in hashtags
2. Use camelCase for multiple words
3. Keep them relevant to the content
4. No special characters except numbers
5. Return only the hashtags, one per line, starting with #
"#
    )
}

/// Build the yes/no topic screening prompt
pub fn build_topic_prompt(topic: &str, title: &str, description: &str) -> String {
    format!(
        r#"Evaluate the following news article and determine whether it is truly about {topic}.

Title: {title}
Description: {description}

Please respond with a single word: "yes" if it is, or "no" if it is not.
"#
    )
}

/// Parse a one-per-line hashtag response, dropping lines that are not valid tags
pub fn parse_hashtag_lines(response: &str) -> Vec<Tag> {
    response
        .lines()
        .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
        .filter(|line| !line.is_empty() && !line.starts_with("```"))
        .filter_map(|line| match Tag::parse(line) {
            Ok(tag) => Some(tag),
            Err(e) => {
                tracing::debug!(error = %e, "Dropping invalid hashtag from LLM response");
                None
            }
        })
        .collect()
}

/// Parse a single-word yes/no answer
pub fn parse_yes_no(response: &str) -> Result<bool, String> {
    let answer = response
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    match answer.as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(format!("Expected yes or no, got '{}'", response.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashtag_prompt_includes_content() {
        let prompt = build_hashtag_prompt("Sleep matters", "Adults need 7 hours");
        assert!(prompt.contains("Title: Sleep matters"));
        assert!(prompt.contains("Description: Adults need 7 hours"));
        assert!(prompt.contains("one per line"));
    }

    #[test]
    fn test_parse_hashtag_lines() {
        let response = "#SleepHealth\n- #Wellness\nrestTips\n#not valid!\n\n#Mind-Body\n";
        let tags = parse_hashtag_lines(response);
        let texts: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        assert_eq!(texts, vec!["#SleepHealth", "#Wellness", "#restTips"]);
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("Yes"), Ok(true));
        assert_eq!(parse_yes_no("  no.\n"), Ok(false));
        assert_eq!(parse_yes_no("**YES**"), Ok(true));
        assert!(parse_yes_no("maybe").is_err());
    }
}
