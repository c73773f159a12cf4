//! Shared HTTP client.
//!
//! One connection pool serves CDN probes, manifest downloads, tracker pages
//! and the Twitch GraphQL endpoint. Tracker page requests draw a fresh
//! [`BrowserProfile`](crate::fingerprint::BrowserProfile) every time.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, instrument};

use crate::fingerprint::random_profile;

/// Status and body of a fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Plain (non-rendering) page fetch.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage>;
}

/// HTTP client with connection pooling and per-request fingerprints.
#[derive(Clone)]
pub struct WebClient {
    client: Client,
    page_timeout: Duration,
}

impl WebClient {
    /// Client with a 30 s request timeout and a 10 s page timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeouts(Duration::from_secs(30), Duration::from_secs(10))
    }

    /// `request_timeout` bounds every request unless overridden per call;
    /// `page_timeout` bounds tracker page fetches.
    pub fn with_timeouts(request_timeout: Duration, page_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            // Probe batches fan out to a handful of CDN hosts
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(Duration::from_secs(10))
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            page_timeout,
        })
    }

    /// GET with a random browser profile.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<Response> {
        let profile = random_profile();
        debug!(user_agent = %profile.user_agent, "Fetching");
        let response = self
            .client
            .get(url)
            .headers(profile.to_headers())
            .timeout(self.page_timeout)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Underlying reqwest client, shared with the prober.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PageFetcher for WebClient {
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let response = self.fetch(url).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchedPage { status, body })
    }
}
