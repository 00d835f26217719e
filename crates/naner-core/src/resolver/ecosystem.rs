//! Language runtime build indexes (Node.js, Go).

use std::collections::HashMap;

use async_trait::async_trait;
use naner_schema::{Channel, ResolvedRelease};
use serde::Deserialize;

use super::{ResolveError, Strategy};
use crate::io::transport::Transport;

/// Parse a `SHASUMS256.txt` body into file name -> digest.
fn parse_shasums(text: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 2 {
            // Filename might be "*filename" or just "filename"
            let file_name = parts[1].trim_start_matches('*').to_string();
            map.insert(file_name, parts[0].to_string());
        }
    }
    map
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Lts {
    Flag(bool),
    Codename(String),
}

#[derive(Debug, Deserialize)]
struct NodeRelease {
    version: String,
    #[serde(default)]
    files: Vec<String>,
    lts: Lts,
}

impl NodeRelease {
    fn is_lts(&self) -> bool {
        match &self.lts {
            Lts::Flag(flag) => *flag,
            Lts::Codename(name) => !name.is_empty(),
        }
    }
}

/// `nodejs.org/dist/index.json`, newest first.
pub struct NodeStrategy {
    index_url: String,
    dist_url: String,
    platform: String,
    channel: Channel,
}

impl NodeStrategy {
    pub fn new(index_url: &str, dist_url: &str, platform: String, channel: Channel) -> Self {
        Self {
            index_url: index_url.to_string(),
            dist_url: dist_url.trim_end_matches('/').to_string(),
            platform,
            channel,
        }
    }

    /// Map an index file key such as `win-x64-zip` to the published file name.
    fn file_name(version: &str, key: &str) -> String {
        if let Some(platform) = key.strip_suffix("-msi") {
            let arch = platform.strip_prefix("win-").unwrap_or(platform);
            return format!("node-{version}-{arch}.msi");
        }
        let (platform, ext) = if let Some(p) = key.strip_suffix("-zip") {
            (p, "zip")
        } else if let Some(p) = key.strip_suffix("-7z") {
            (p, "7z")
        } else if let Some(p) = key.strip_suffix("-tar") {
            (p, "tar.gz")
        } else {
            (key, "tar.xz")
        };
        let platform = platform.replace("osx", "darwin");
        format!("node-{version}-{platform}.{ext}")
    }

    /// The published digest for `file_name`, if the checksum list is reachable.
    async fn checksum_for(
        &self,
        transport: &dyn Transport,
        version: &str,
        file_name: &str,
    ) -> Option<String> {
        let url = format!("{}/{version}/SHASUMS256.txt", self.dist_url);
        match transport.get_text(&url).await {
            Ok(text) => parse_shasums(&text).remove(file_name),
            Err(e) => {
                tracing::debug!("No checksums for node {version}: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl Strategy for NodeStrategy {
    async fn resolve(&self, transport: &dyn Transport) -> Result<ResolvedRelease, ResolveError> {
        let body = transport.get_text(&self.index_url).await?;
        let releases: Vec<NodeRelease> = serde_json::from_str(&body)?;

        // Every index entry is a stable release, so only LTS narrows the choice.
        let release = releases
            .iter()
            .filter(|r| self.channel != Channel::Lts || r.is_lts())
            .find(|r| r.files.iter().any(|f| f == &self.platform))
            .ok_or_else(|| {
                ResolveError::NoMatch(format!(
                    "no {:?} node release for {}",
                    self.channel, self.platform
                ))
            })?;

        let file_name = Self::file_name(&release.version, &self.platform);
        let url = format!("{}/{}/{file_name}", self.dist_url, release.version);
        let checksum = self.checksum_for(transport, &release.version, &file_name).await;

        let resolved = ResolvedRelease::resolved(
            url,
            file_name,
            release.version.trim_start_matches('v'),
        );
        Ok(match checksum {
            Some(sha) => resolved.with_checksum(format!("sha256:{sha}")),
            None => resolved,
        })
    }
}

#[derive(Debug, Deserialize)]
struct GoRelease {
    version: String,
    #[serde(default)]
    stable: bool,
    #[serde(default)]
    files: Vec<GoFile>,
}

#[derive(Debug, Deserialize)]
struct GoFile {
    filename: String,
    os: String,
    arch: String,
    #[serde(default)]
    kind: String,
    #[serde(default)]
    sha256: String,
}

/// `go.dev/dl/?mode=json`. The platform is `<os>-<arch>`, e.g. `windows-amd64`.
pub struct GoStrategy {
    index_url: String,
    dist_url: String,
    platform: String,
    channel: Channel,
}

impl GoStrategy {
    pub fn new(index_url: &str, dist_url: &str, platform: String, channel: Channel) -> Self {
        Self {
            index_url: index_url.to_string(),
            dist_url: dist_url.trim_end_matches('/').to_string(),
            platform,
            channel,
        }
    }
}

#[async_trait]
impl Strategy for GoStrategy {
    async fn resolve(&self, transport: &dyn Transport) -> Result<ResolvedRelease, ResolveError> {
        let (os, arch) = self.platform.split_once('-').ok_or_else(|| {
            ResolveError::NoMatch(format!("platform '{}' is not <os>-<arch>", self.platform))
        })?;

        let body = transport.get_text(&self.index_url).await?;
        let releases: Vec<GoRelease> = serde_json::from_str(&body)?;

        // Go has no LTS line; it is treated like stable.
        let (release, file) = releases
            .iter()
            .filter(|r| self.channel == Channel::Current || r.stable)
            .find_map(|r| {
                r.files
                    .iter()
                    .find(|f| f.os == os && f.arch == arch && f.kind == "archive")
                    .map(|f| (r, f))
            })
            .ok_or_else(|| {
                ResolveError::NoMatch(format!("no {:?} go archive for {}", self.channel, self.platform))
            })?;

        let resolved = ResolvedRelease::resolved(
            format!("{}/{}", self.dist_url, file.filename),
            &file.filename,
            release.version.trim_start_matches("go"),
        );
        Ok(if file.sha256.is_empty() {
            resolved
        } else {
            resolved.with_checksum(format!("sha256:{}", file.sha256))
        })
    }
}
