//! skypost adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `dedup`: JSON-file dedup store
//! - `feeds`: RSS and NewsAPI fetchers
//! - `llm`: LLM providers for hashtags and topic screening (Gemini, stub)
//! - `web`: link checking and Open Graph link cards
//! - `bluesky`: Bluesky publishing and blob uploads

mod dedup_json;

pub mod bluesky;
pub mod feeds;
pub mod llm;
pub mod web;

/// Re-exports for dedup adapters
pub mod dedup {
    pub use crate::dedup_json::JsonFileDedupStore;
}

/// Browser-like User-Agent; several news sites refuse unknown clients
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Prefix `https://` when a URL has no scheme
pub(crate) fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_scheme() {
        assert_eq!(with_scheme("example.com/a"), "https://example.com/a");
        assert_eq!(with_scheme(" http://example.com "), "http://example.com");
    }
}
