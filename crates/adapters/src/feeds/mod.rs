//! Candidate item sources

mod news_api;
mod rss;

pub use news_api::{NewsApiConfig, NewsApiFetcher};
pub use rss::RssFetcher;

use scraper::Html;

/// Collapse an HTML fragment to its visible text with single spaces
pub(crate) fn html_to_text(fragment: &str) -> String {
    let html = Html::parse_fragment(fragment);
    let text: String = html.root_element().text().collect();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_to_text_strips_markup() {
        let input = "<p>Walking <b>daily</b> helps.</p>\n<img src=\"x.png\">";
        assert_eq!(html_to_text(input), "Walking daily helps.");
    }

    #[test]
    fn test_html_to_text_keeps_words_split_by_inline_markup() {
        assert_eq!(html_to_text("multi<b>part</b> word"), "multipart word");
    }

    #[test]
    fn test_html_to_text_plain_passthrough() {
        assert_eq!(html_to_text("  plain   text "), "plain text");
    }
}
