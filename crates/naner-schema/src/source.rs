//! Release source strategies.
//!
//! [`VendorSource`] is a tagged union: the `type` field selects the strategy
//! and only that variant's parameters exist on the descriptor.

use serde::{Deserialize, Serialize};

use crate::repo::GitHubRepo;

/// Where the latest release of a vendor is discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VendorSource {
    /// A fixed download URL. The version is parsed out of the file name.
    #[serde(rename_all = "camelCase")]
    Static {
        /// Direct download URL.
        url: String,
        /// File name to store the download under. Defaults to the last URL segment.
        #[serde(default)]
        file_name: Option<String>,
    },

    /// The "latest release" endpoint of a GitHub repository.
    #[serde(rename = "github-release", rename_all = "camelCase")]
    GitHubRelease {
        /// Repository in `owner/repo` form.
        repo: GitHubRepo,
        /// Case-insensitive substring the asset name must contain.
        #[serde(default)]
        asset_prefix: Option<String>,
        /// Case-insensitive substring the asset name must contain.
        #[serde(default)]
        asset_suffix: Option<String>,
    },

    /// Apply a regular expression to a web page and join capture group 1
    /// onto a base URL.
    #[serde(rename_all = "camelCase")]
    WebScrape {
        /// Page fetched as raw HTML.
        page_url: String,
        /// Regular expression with at least one capture group.
        pattern: String,
        /// Base URL the captured relative path is joined onto.
        base_url: String,
    },

    /// A language runtime's published build index.
    #[serde(rename_all = "camelCase")]
    Ecosystem {
        /// Which runtime index to query.
        runtime: Runtime,
        /// Platform selector in the runtime's own vocabulary
        /// (e.g. `win-x64-zip` for Node.js, `windows-amd64` for Go).
        platform: String,
        /// Release channel filter.
        #[serde(default)]
        channel: Channel,
    },
}

impl VendorSource {
    /// Short strategy label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static { .. } => "static",
            Self::GitHubRelease { .. } => "github-release",
            Self::WebScrape { .. } => "web-scrape",
            Self::Ecosystem { .. } => "ecosystem",
        }
    }
}

/// Language runtimes with a supported build index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Runtime {
    /// `nodejs.org/dist/index.json`.
    Node,
    /// `go.dev/dl/?mode=json`.
    Go,
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node => write!(f, "node"),
            Self::Go => write!(f, "go"),
        }
    }
}

/// Release channel classification used by ecosystem indexes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Newest release marked stable by the index.
    #[default]
    Stable,
    /// Newest long-term-support release.
    Lts,
    /// Newest release of any kind.
    Current,
}
