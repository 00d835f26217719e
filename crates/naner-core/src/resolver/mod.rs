//! Release resolution.
//!
//! A descriptor's [`VendorSource`] selects exactly one [`Strategy`]. When the
//! strategy fails or finds nothing, the [`Resolver`] substitutes the
//! descriptor's pinned fallback so installation is never blocked on a flaky
//! upstream.

mod ecosystem;
mod github;
mod scrape;

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use naner_schema::{
    ResolvedRelease, UNKNOWN_VERSION, VendorDescriptor, VendorSource, file_name_from_url,
};
use regex::Regex;
use thiserror::Error;

pub use ecosystem::{GoStrategy, NodeStrategy};
pub use github::GitHubStrategy;
pub use scrape::ScrapeStrategy;

use crate::config::Endpoints;
use crate::io::transport::{Transport, TransportError};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Unexpected response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("No match: {0}")]
    NoMatch(String),
}

#[async_trait]
pub trait Strategy: Send + Sync {
    /// Determine the concrete download for this source right now.
    async fn resolve(&self, transport: &dyn Transport) -> Result<ResolvedRelease, ResolveError>;
}

static VERSION_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[0-9][0-9.]*").ok());

/// Version of a static download: the first run of digits and dots in the
/// file name, without trailing dots, else `"unknown"`.
///
/// `node-v20.11.1-win-x64.zip` gives `20.11.1`, `tool-1.2.3.zip` gives `1.2.3`.
pub fn version_from_file_name(file_name: &str) -> String {
    VERSION_RE
        .as_ref()
        .and_then(|re| re.find(file_name))
        .map(|m| m.as_str().trim_end_matches('.'))
        .filter(|v| !v.is_empty())
        .map_or_else(|| UNKNOWN_VERSION.to_string(), str::to_string)
}

/// A fixed URL; the answer is the descriptor itself.
pub struct StaticStrategy {
    url: String,
    file_name: Option<String>,
}

impl StaticStrategy {
    pub fn new(url: String, file_name: Option<String>) -> Self {
        Self { url, file_name }
    }
}

#[async_trait]
impl Strategy for StaticStrategy {
    async fn resolve(&self, _transport: &dyn Transport) -> Result<ResolvedRelease, ResolveError> {
        let file_name = self
            .file_name
            .clone()
            .unwrap_or_else(|| file_name_from_url(&self.url).to_string());
        if file_name.is_empty() {
            return Err(ResolveError::NoMatch(format!("no file name in {}", self.url)));
        }
        let version = version_from_file_name(&file_name);
        Ok(ResolvedRelease::resolved(&self.url, file_name, version))
    }
}

/// Picks and runs the strategy for a descriptor, with fallback.
#[derive(Clone)]
pub struct Resolver {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl Resolver {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    /// The strategy selected by a source type.
    pub fn strategy(&self, source: &VendorSource) -> Box<dyn Strategy> {
        match source {
            VendorSource::Static { url, file_name } => {
                Box::new(StaticStrategy::new(url.clone(), file_name.clone()))
            }
            VendorSource::GitHubRelease {
                repo,
                asset_prefix,
                asset_suffix,
            } => Box::new(GitHubStrategy::new(
                &self.endpoints.github_api,
                repo.clone(),
                asset_prefix.clone(),
                asset_suffix.clone(),
            )),
            VendorSource::WebScrape {
                page_url,
                pattern,
                base_url,
            } => Box::new(ScrapeStrategy::new(
                page_url.clone(),
                pattern.clone(),
                base_url.clone(),
            )),
            VendorSource::Ecosystem {
                runtime: naner_schema::Runtime::Node,
                platform,
                channel,
            } => Box::new(NodeStrategy::new(
                &self.endpoints.node_index,
                &self.endpoints.node_dist,
                platform.clone(),
                *channel,
            )),
            VendorSource::Ecosystem {
                runtime: naner_schema::Runtime::Go,
                platform,
                channel,
            } => Box::new(GoStrategy::new(
                &self.endpoints.go_index,
                &self.endpoints.go_dist,
                platform.clone(),
                *channel,
            )),
        }
    }

    /// Run the descriptor's strategy only, without fallback.
    ///
    /// # Errors
    ///
    /// Returns whatever the strategy reports.
    pub async fn resolve_source(
        &self,
        descriptor: &VendorDescriptor,
    ) -> Result<ResolvedRelease, ResolveError> {
        let strategy = self.strategy(&descriptor.source);
        let mut release = strategy.resolve(self.transport.as_ref()).await?;
        if let Some(checksum) = &descriptor.checksum {
            release.checksum = Some(checksum.clone());
        }
        Ok(release)
    }

    /// Resolve a descriptor, degrading to its fallback when the strategy fails
    /// or finds nothing.
    ///
    /// The descriptor's checksum is attached to whichever release is chosen and
    /// takes priority over a digest published by the source.
    ///
    /// # Errors
    ///
    /// Returns the strategy's error only when no fallback is configured.
    pub async fn resolve(
        &self,
        descriptor: &VendorDescriptor,
    ) -> Result<ResolvedRelease, ResolveError> {
        match self.resolve_source(descriptor).await {
            Ok(release) => {
                tracing::debug!(
                    "{} ({}) -> {} [{}]",
                    descriptor.name,
                    descriptor.source.kind(),
                    release.download_url,
                    release.version
                );
                Ok(release)
            }
            Err(e) => match &descriptor.fallback {
                Some(fallback) => {
                    tracing::warn!("{}: resolution failed ({e}), using fallback", descriptor.name);
                    let release = ResolvedRelease::from_fallback(fallback);
                    Ok(match &descriptor.checksum {
                        Some(checksum) => release.with_checksum(checksum.clone()),
                        None => release,
                    })
                }
                None => Err(e),
            },
        }
    }
}
