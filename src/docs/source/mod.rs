
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, warn};
use ureq::Agent;

use crate::config::SourceConfig;

/// Outcome of a manifest request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestResponse {
    /// The server confirmed the cached copy (matching `etag`) is current
    NotModified,
    Fetched { body: String, etag: Option<String> },
}

/// Remote documentation source: a navigation manifest plus per-page markup
#[async_trait]
pub trait DocsSource: Send + Sync {
    /// Fetch the navigation manifest, conditionally on `etag` when given
    async fn fetch_manifest(&self, etag: Option<&str>) -> Result<ManifestResponse>;

    /// Fetch the raw markup of one page by its source-relative path
    async fn fetch_page(&self, path: &str) -> Result<String>;
}

/// HTTP-backed source with retry logic
#[derive(Debug, Clone)]
pub struct HttpDocsSource {
    agent: Agent,
    config: SourceConfig,
}

impl HttpDocsSource {
    #[inline]
    pub fn new(config: SourceConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self { agent, config }
    }

    async fn get(&self, url: String, etag: Option<String>) -> Result<ManifestResponse> {
        let agent = self.agent.clone();
        let max_retries = self.config.max_retries;
        let retry_delay = Duration::from_millis(self.config.retry_delay_ms);

        tokio::task::spawn_blocking(move || {
            get_with_retry(&agent, &url, etag.as_deref(), max_retries, retry_delay)
        })
        .await
        .context("HTTP fetch task failed")?
    }
}

#[async_trait]
impl DocsSource for HttpDocsSource {
    async fn fetch_manifest(&self, etag: Option<&str>) -> Result<ManifestResponse> {
        debug!("Fetching navigation manifest from {}", self.config.manifest_url);
        self.get(self.config.manifest_url.clone(), etag.map(str::to_string))
            .await
            .context("Failed to fetch navigation manifest")
    }

    async fn fetch_page(&self, path: &str) -> Result<String> {
        let url = self.config.content_url(path);
        match self.get(url.clone(), None).await? {
            ManifestResponse::Fetched { body, .. } => Ok(body),
            ManifestResponse::NotModified => Err(anyhow!("Unexpected 304 response for {}", url)),
        }
    }
}

fn get_with_retry(
    agent: &Agent,
    url: &str,
    etag: Option<&str>,
    max_retries: u32,
    retry_delay: Duration,
) -> Result<ManifestResponse> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = retry_delay * 2u32.saturating_pow(attempt - 1);
            debug!(
                "Retrying request to {} in {:?} (attempt {})",
                url,
                delay,
                attempt + 1
            );
            std::thread::sleep(delay);
        }

        let mut request = agent.get(url);
        if let Some(tag) = etag {
            request = request.header("If-None-Match", tag);
        }

        match request.call() {
            Ok(mut response) => {
                if response.status() == 304 {
                    debug!("{} not modified", url);
                    return Ok(ManifestResponse::NotModified);
                }

                let etag = response
                    .headers()
                    .get("etag")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let body = response
                    .body_mut()
                    .read_to_string()
                    .with_context(|| format!("Failed to read response body from {}", url))?;

                debug!("Fetched {} bytes from {}", body.len(), url);
                return Ok(ManifestResponse::Fetched { body, etag });
            }
            Err(e) if is_retryable(&e) && attempt < max_retries => {
                warn!("Retryable error for {}: {}", url, e);
                last_error = Some(e);
            }
            Err(ureq::Error::StatusCode(status)) => {
                debug!("HTTP request failed with status {}: {}", status, url);
                return Err(anyhow!("HTTP error {} for {}", status, url));
            }
            Err(e) => {
                error!("Request to {} failed: {}", url, e);
                return Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to make HTTP request to {}", url));
            }
        }
    }

    Err(last_error.map_or_else(
        || anyhow!("All retry attempts failed for {}", url),
        |e| anyhow!("Request to {} failed after retries: {}", url, e),
    ))
}

/// Transport failures, 5xx and 429 are worth retrying
fn is_retryable(error: &ureq::Error) -> bool {
    match error {
        ureq::Error::StatusCode(status) => *status >= 500 || *status == 429,
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => true,
        _ => false,
    }
}
