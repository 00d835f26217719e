//! HTTP transport.
//!
//! The engine never talks to `reqwest` directly; it goes through the
//! [`Transport`] trait so tests can substitute canned responses.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::EngineConfig;

/// Write buffer size for streamed downloads.
pub const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Progress callback: `(percent, downloaded_bytes, total_bytes)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u8, u64, u64) + Send + Sync);

#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a document (JSON or HTML) as text.
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// Progress is reported in 10% steps when the server sends a content
    /// length, and not at all otherwise. Implementations do not retry.
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64, TransportError>;
}

/// Tracks which 10% boundary was last reported.
#[derive(Debug, Clone)]
pub struct ProgressSteps {
    total: Option<u64>,
    next_step: u8,
}

impl ProgressSteps {
    pub fn new(total: Option<u64>) -> Self {
        Self {
            total: total.filter(|t| *t > 0),
            next_step: 10,
        }
    }

    /// Returns the newly reached 10% step, if any.
    pub fn advance(&mut self, downloaded: u64) -> Option<u8> {
        let total = self.total?;
        let percent = (downloaded.saturating_mul(100) / total).min(100) as u8;
        if percent < self.next_step {
            return None;
        }
        let step = percent - percent % 10;
        self.next_step = step + 10;
        Some(step)
    }
}

/// `reqwest`-backed transport with one overall request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    github_token: Option<String>,
    github_host: Option<String>,
}

impl HttpTransport {
    /// Build a client from the `[http]` section.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the TLS backend cannot be initialized.
    pub fn new(config: &EngineConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(config.http.user_agent.clone())
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .build()?;
        let github_host = reqwest::Url::parse(&config.endpoints.github_api)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        Ok(Self {
            client,
            github_token: config.http.github_token.clone(),
            github_host,
        })
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.client.get(url);
        if let Some(token) = &self.github_token {
            let host = reqwest::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string));
            if host.is_some() && host == self.github_host {
                req = req
                    .bearer_auth(token)
                    .header(reqwest::header::ACCEPT, "application/vnd.github+json");
            }
        }
        req
    }

    async fn stream_to_file(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64, TransportError> {
        let response = self.request(url).send().await?.error_for_status()?;
        let total = response.content_length();
        let mut steps = ProgressSteps::new(total);

        let file = File::create(dest).await?;
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            writer.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if let (Some(step), Some(total)) = (steps.advance(downloaded), total) {
                progress(step, downloaded, total);
            }
        }

        writer.flush().await?;
        Ok(downloaded)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        tracing::debug!("GET {url}");
        let text = self
            .request(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<u64, TransportError> {
        tracing::debug!("Downloading {url} -> {}", dest.display());
        self.stream_to_file(url, dest, progress)
            .await
            .inspect_err(|e| tracing::warn!("Download of {url} failed: {e}"))
    }
}
