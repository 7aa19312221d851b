//! HTTP client for the upstream JSON document.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::DemoResult;

/// Default timeout of an upstream call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches a JSON document from a fixed URL.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    url: String,
}

impl UpstreamClient {
    /// Creates a client for `url`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> DemoResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// The fetched URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetches the document and returns it pretty-printed.
    ///
    /// Fails on transport errors, non-success statuses and bodies that are
    /// not JSON.
    pub async fn fetch_pretty(&self) -> DemoResult<String> {
        let response = self.client.get(&self.url).send().await?.error_for_status()?;
        let status = response.status();
        let document: serde_json::Value = response.json().await?;
        debug!(url = %self.url, status = %status, "upstream document fetched");
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DemoError;

    #[test]
    fn test_new() {
        let client = UpstreamClient::new("http://ip-api.com/json/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url(), "http://ip-api.com/json/");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_fails() {
        let client = UpstreamClient::new("http://127.0.0.1:1/json/", Duration::from_millis(500)).unwrap();
        assert!(matches!(client.fetch_pretty().await, Err(DemoError::Upstream(_))));
    }
}
