use async_trait::async_trait;
use naner_schema::{GitHubRepo, ResolvedRelease};
use serde::Deserialize;

use super::{ResolveError, Strategy};
use crate::io::transport::Transport;

#[derive(Debug, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

/// Latest release of a repository, filtered by asset name.
pub struct GitHubStrategy {
    api: String,
    repo: GitHubRepo,
    prefix: Option<String>,
    suffix: Option<String>,
}

impl GitHubStrategy {
    pub fn new(
        api: &str,
        repo: GitHubRepo,
        prefix: Option<String>,
        suffix: Option<String>,
    ) -> Self {
        Self {
            api: api.trim_end_matches('/').to_string(),
            repo,
            prefix: prefix.map(|p| p.to_lowercase()),
            suffix: suffix.map(|s| s.to_lowercase()),
        }
    }

    fn latest_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.api,
            self.repo.owner(),
            self.repo.name()
        )
    }

    /// First asset whose name contains both filters. No scoring.
    fn find_asset<'a>(&self, release: &'a GithubRelease) -> Option<&'a GithubAsset> {
        release.assets.iter().find(|asset| {
            let name = asset.name.to_lowercase();
            self.prefix.as_deref().is_none_or(|p| name.contains(p))
                && self.suffix.as_deref().is_none_or(|s| name.contains(s))
        })
    }
}

/// Turn a release tag into a version: `v1.2.3` -> `1.2.3`.
pub fn strip_tag_prefix(tag: &str) -> &str {
    tag.strip_prefix('v')
        .or_else(|| tag.strip_prefix('V'))
        .unwrap_or(tag)
}

#[async_trait]
impl Strategy for GitHubStrategy {
    async fn resolve(&self, transport: &dyn Transport) -> Result<ResolvedRelease, ResolveError> {
        let body = transport.get_text(&self.latest_url()).await?;
        let release: GithubRelease = serde_json::from_str(&body)?;

        let asset = self.find_asset(&release).ok_or_else(|| {
            ResolveError::NoMatch(format!(
                "no asset in {} {} matching prefix {:?} suffix {:?}",
                self.repo, release.tag_name, self.prefix, self.suffix
            ))
        })?;

        Ok(ResolvedRelease::resolved(
            &asset.browser_download_url,
            &asset.name,
            strip_tag_prefix(&release.tag_name),
        ))
    }
}
