use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::warn;

pub const DEFAULT_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKOFF_MS: u64 = 3000;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// Bounded retry with a fixed backoff delay between attempts. Every network
/// boundary goes through this instead of rolling its own loop.
#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for Retry {
    fn default() -> Self {
        Retry {
            attempts: DEFAULT_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
        }
    }
}

pub async fn with_retry<T, F, Fut>(retry: Retry, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = retry.attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt < attempts {
                    warn!(
                        "{} failed (attempt {}/{}): {}",
                        what, attempt, attempts, e
                    );
                    tokio::time::sleep(retry.backoff).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| anyhow::anyhow!("{} failed with no attempts", what))
        .context(format!("{} failed after {} attempts", what, attempts)))
}

/// Page-content capability: URL in, raw HTML out or a failure. The pipeline
/// only depends on this trait, so tests swap in canned fetchers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Plain-HTTP fetcher with a bounded page-load timeout per attempt.
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: Retry,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retry: Retry) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(HttpFetcher { client, retry })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let client = &self.client;
        with_retry(self.retry, url, || async move {
            let response = client.get(url).send().await?.error_for_status()?;
            Ok(response.text().await?)
        })
        .await
    }
}

// ── Tests ──
