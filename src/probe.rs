//! Concurrent existence probing.
//!
//! A URL is reachable iff a GET returns a success status within the
//! per-request timeout. Transport errors and timeouts are retried with a fixed
//! backoff; a definitive non-success status is not.
//!
//! Every batch runs to completion before a verdict is reported. The
//! first-success variant returns the earliest reachable URL in input order,
//! never whichever request happened to finish first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, instrument};

/// Transient probe failures. Both are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),
}

/// One existence check against one URL.
///
/// `Ok(true)` means reachable, `Ok(false)` means the server answered with a
/// non-success status, `Err` is transient.
#[async_trait]
pub trait ExistenceCheck: Send + Sync {
    async fn check(&self, url: &str, timeout: Duration) -> Result<bool, ProbeError>;
}

/// [`ExistenceCheck`] over plain HTTP GET. The body is never read.
pub struct HttpExistenceCheck {
    client: Client,
}

impl HttpExistenceCheck {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExistenceCheck for HttpExistenceCheck {
    async fn check(&self, url: &str, timeout: Duration) -> Result<bool, ProbeError> {
        match self.client.get(url).timeout(timeout).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_timeout() => Err(ProbeError::Timeout),
            Err(e) => Err(ProbeError::Transport(e.to_string())),
        }
    }
}

/// Batch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Requests in flight per batch.
    pub concurrency: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after the first, for transient failures only.
    pub retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            concurrency: 32,
            timeout: Duration::from_secs(30),
            retries: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

/// Snapshot of batch progress, reported once per finished URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeProgress {
    pub completed: usize,
    pub reachable: usize,
    pub total: usize,
}

/// Callback invoked as each URL reaches a terminal verdict.
pub type ProgressCallback = Box<dyn Fn(ProbeProgress) + Send + Sync>;

/// Runs existence checks in bounded-concurrency batches.
#[derive(Clone)]
pub struct Prober {
    check: Arc<dyn ExistenceCheck>,
    settings: ProbeSettings,
}

impl Prober {
    pub fn new(check: Arc<dyn ExistenceCheck>, settings: ProbeSettings) -> Self {
        Self { check, settings }
    }

    /// Prober backed by [`HttpExistenceCheck`].
    pub fn http(client: Client, settings: ProbeSettings) -> Self {
        Self::new(Arc::new(HttpExistenceCheck::new(client)), settings)
    }

    pub fn settings(&self) -> ProbeSettings {
        self.settings
    }

    /// Earliest reachable URL by input order.
    #[instrument(skip_all, fields(batch = urls.len()))]
    pub async fn probe_first(&self, urls: &[String]) -> Option<String> {
        let verdicts = self.verdicts(urls, None).await;
        urls.iter()
            .zip(verdicts)
            .find_map(|(url, reachable)| reachable.then(|| url.clone()))
    }

    /// Every reachable URL, in input order.
    #[instrument(skip_all, fields(batch = urls.len()))]
    pub async fn probe_all(&self, urls: &[String]) -> Vec<String> {
        let verdicts = self.verdicts(urls, None).await;
        urls.iter()
            .zip(verdicts)
            .filter_map(|(url, reachable)| reachable.then(|| url.clone()))
            .collect()
    }

    /// Reachability of each URL, index-aligned with `urls`.
    ///
    /// Returns only after every URL has a terminal verdict.
    pub async fn verdicts(&self, urls: &[String], progress: Option<&ProgressCallback>) -> Vec<bool> {
        let total = urls.len();
        let mut verdicts = vec![false; total];
        let mut completed = 0;
        let mut reachable = 0;

        let mut results = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move { (index, self.is_reachable(url).await) })
            .buffer_unordered(self.settings.concurrency.max(1));

        while let Some((index, found)) = results.next().await {
            verdicts[index] = found;
            completed += 1;
            if found {
                reachable += 1;
            }
            if let Some(cb) = progress {
                cb(ProbeProgress {
                    completed,
                    reachable,
                    total,
                });
            }
        }

        verdicts
    }

    async fn is_reachable(&self, url: &str) -> bool {
        let attempts = self.settings.retries + 1;
        for attempt in 1..=attempts {
            match self.check.check(url, self.settings.timeout).await {
                Ok(found) => {
                    debug!(url, found, "probe verdict");
                    return found;
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "probe attempt failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.backoff).await;
                    }
                }
            }
        }
        false
    }
}
