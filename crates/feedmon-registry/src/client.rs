//! HTTP client for the reference data directory.

use crate::error::{RegistryError, RegistryResult};
use crate::rdd::parse_feeds;
use feedmon_core::FeedConfig;
use feedmon_source::{BoxFuture, Source, SourceResult};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Fetches the feed list from the directory URL.
///
/// Implements `Source`, so the manager's feed poller drives it directly.
pub struct RddClient {
    client: Client,
    url: String,
}

impl RddClient {
    /// Create a new directory client.
    ///
    /// `timeout` bounds the whole request; the poller applies its own read
    /// timeout on top.
    pub fn new(url: impl Into<String>, timeout: Duration) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the current feed snapshot.
    pub async fn fetch_feeds(&self) -> RegistryResult<Vec<FeedConfig>> {
        debug!(url = %self.url, "Fetching feeds from directory");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RegistryError::HttpClient(format!("Failed to read response: {e}")))?;

        parse_feeds(&body)
    }
}

impl Source for RddClient {
    type Output = Vec<FeedConfig>;

    fn fetch(&self) -> BoxFuture<'_, SourceResult<Vec<FeedConfig>>> {
        Box::pin(async move { Ok(self.fetch_feeds().await?) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdd::tests::entry_json;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use feedmon_source::SourceError;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/feeds")
    }

    #[tokio::test]
    async fn test_fetch_feeds() {
        let body = serde_json::json!([
            entry_json("SOL / USD", "live", 10),
            entry_json("OLD / USD", "dead", 20),
        ]);
        let handler = move || {
            let body = body.clone();
            async move { Json(body) }
        };
        let url = serve(Router::new().route("/feeds", get(handler))).await;

        let client = RddClient::new(url, Duration::from_secs(5)).unwrap();
        let feeds = client.fetch_feeds().await.unwrap();
        assert_eq!(feeds.len(), 1);
        assert_eq!(feeds[0].feed_name, "SOL / USD");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let url = serve(Router::new().route(
            "/feeds",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        ))
        .await;

        let client = RddClient::new(url, Duration::from_secs(5)).unwrap();
        let err = client.fetch_feeds().await.unwrap_err();
        assert!(matches!(err, RegistryError::HttpClient(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn test_source_maps_errors_to_read() {
        let url = serve(Router::new().route("/feeds", get(|| async { "not json" }))).await;

        let client = RddClient::new(url, Duration::from_secs(5)).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::Read(_)));
    }
}
