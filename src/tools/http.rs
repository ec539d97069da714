//! Shared HTTP fetching for tools that take a URL.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::core::{FerretError, Result};

const USER_AGENT: &str = concat!("Mozilla/5.0 (compatible; ferret/", env!("CARGO_PKG_VERSION"), ")");

/// A fetched response body with its declared content type
#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// HTTP client with a bounded timeout
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout_secs`
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            timeout_secs,
        }
    }

    /// The underlying client, for requests that need query parameters
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a URL, failing on transport errors and non-success status
    pub async fn get(&self, url: &str) -> Result<Fetched> {
        debug!(url, "Fetching");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FerretError::timeout(format!("Fetching {}", url), self.timeout_secs)
            } else {
                FerretError::tool(format!("Request to {} failed: {}", url, e))
            }
        })?;

        check_status(url, &response)?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response.bytes().await?.to_vec();
        debug!(url, bytes = bytes.len(), "Fetched");

        Ok(Fetched {
            bytes,
            content_type,
        })
    }

    /// GET a URL and decode the body as UTF-8 text (lossy)
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let fetched = self.get(url).await?;
        Ok(String::from_utf8_lossy(&fetched.bytes).into_owned())
    }
}

/// Fail on a non-success HTTP status
pub(crate) fn check_status(url: &str, response: &reqwest::Response) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(FerretError::tool(format!("HTTP {} fetching {}", status, url)))
    }
}

/// Last path segment of a URL, used as a file name
pub fn file_name_from_url(url: &str, fallback: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(|s| s.to_string()))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Lowercased extension of the URL path, if any
pub fn extension_from_url(url: &str) -> Option<String> {
    let name = file_name_from_url(url, "");
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://example.com/files/task.mp3?x=1", "audio.mp3"),
            "task.mp3"
        );
        assert_eq!(
            file_name_from_url("https://example.com/", "audio.mp3"),
            "audio.mp3"
        );
        assert_eq!(file_name_from_url("not a url", "audio.mp3"), "audio.mp3");
    }

    #[test]
    fn test_extension_from_url() {
        assert_eq!(
            extension_from_url("https://x.org/a/photo.JPG").as_deref(),
            Some("jpg")
        );
        assert_eq!(extension_from_url("https://x.org/a/photo"), None);
    }

    #[tokio::test]
    async fn test_malformed_url_is_an_error() {
        let fetcher = HttpFetcher::new(1);
        let err = fetcher.get("not a url").await.unwrap_err();
        assert!(matches!(err, FerretError::ToolExecution(_)));
    }
}
