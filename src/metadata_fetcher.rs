//! Metadata fetcher for retrieving release information from the repository host

use crate::error::{MetalinkError, Result};
use crate::models::RepomdInfo;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// MetadataFetcher downloads `tetsudou.json` for a repository, which carries
/// the timestamp, size and hashes of the current `repomd.xml`
pub struct MetadataFetcher {
    client: Client,
    base_url: String,
}

impl MetadataFetcher {
    /// Create a new MetadataFetcher with the default 10 second timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(10))
    }

    /// Create a new MetadataFetcher with a custom timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tetsudou/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                MetalinkError::UpstreamFetch(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(MetadataFetcher {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// URL of the metadata document for `repo`
    pub fn metadata_url(&self, repo: &str) -> String {
        format!("{}/{}/repodata/tetsudou.json", self.base_url, repo)
    }

    /// Fetch release metadata for a repository
    ///
    /// # Returns
    /// * `Ok(RepomdInfo)` if the upstream answers 2xx with a valid document
    /// * `Err(MetalinkError::UpstreamStatus)` on a non-success status
    /// * `Err(MetalinkError::UpstreamTimeout)` if the request timed out
    /// * `Err(MetalinkError::UpstreamFetch)` on network or decoding failures
    pub async fn fetch_repomd(&self, repo: &str) -> Result<RepomdInfo> {
        let url = self.metadata_url(repo);
        debug!("Fetching metadata for repo={} url={}", repo, url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!("GET request failed for url={}: {}", url, e);
            if e.is_timeout() {
                MetalinkError::UpstreamTimeout(format!("GET {} timed out", url))
            } else {
                MetalinkError::UpstreamFetch(format!("GET request failed: {}", e))
            }
        })?;

        let status = response.status();
        debug!("Received metadata response for url={}, status={}", url, status);

        if !status.is_success() {
            warn!("Upstream returned error for url={}: status={}", url, status);
            return Err(MetalinkError::upstream_status(
                status.as_u16(),
                format!("metadata request for {} failed", repo),
            ));
        }

        let info: RepomdInfo = response.json().await.map_err(|e| {
            warn!("Invalid metadata document at url={}: {}", url, e);
            if e.is_timeout() {
                MetalinkError::UpstreamTimeout(format!("reading {} timed out", url))
            } else {
                MetalinkError::UpstreamFetch(format!("Invalid metadata document: {}", e))
            }
        })?;

        info!(
            "Fetched metadata for repo={}: size={}, timestamp={}, hashes={}",
            repo,
            info.size,
            info.timestamp,
            info.hashes.len()
        );
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_fetcher_creation() {
        let fetcher = MetadataFetcher::new("https://repos.example.org");
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_metadata_url_strips_trailing_slash() {
        let fetcher =
            MetadataFetcher::with_timeout("https://repos.example.org/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            fetcher.metadata_url("rawhide"),
            "https://repos.example.org/rawhide/repodata/tetsudou.json"
        );
    }

    #[tokio::test]
    async fn test_unreachable_upstream() {
        // Port 9 (discard) is not expected to accept HTTP connections
        let fetcher =
            MetadataFetcher::with_timeout("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = fetcher.fetch_repomd("rawhide").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
