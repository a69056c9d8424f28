//! HEAD-request link checker

use async_trait::async_trait;
use reqwest::{Client, redirect};
use skypost_domain::LinkChecker;
use std::time::Duration;

use crate::{USER_AGENT, with_scheme};

/// Treats a link as reachable when a HEAD request ends below status 400
pub struct HttpLinkChecker {
    client: Client,
}

impl HttpLinkChecker {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::limited(10))
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }
}

impl Default for HttpLinkChecker {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl LinkChecker for HttpLinkChecker {
    async fn is_reachable(&self, url: &str) -> bool {
        if url.trim().is_empty() {
            return false;
        }

        let url = with_scheme(url);
        match self.client.head(&url).send().await {
            Ok(response) if response.status().as_u16() < 400 => {
                tracing::debug!(url = %url, status = %response.status(), "Link is reachable");
                true
            }
            Ok(response) => {
                tracing::info!(url = %url, status = %response.status(), "Link returned error status");
                false
            }
            Err(e) => {
                tracing::info!(url = %url, error = %e, "Link check failed");
                false
            }
        }
    }
}
