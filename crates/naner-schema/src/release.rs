//! Resolution results and persisted install state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::descriptor::{Fallback, VendorName};

/// Version string used when resolution degraded to the pinned fallback.
pub const FALLBACK_VERSION: &str = "fallback";

/// Version string used when nothing version-like could be found.
pub const UNKNOWN_VERSION: &str = "unknown";

/// How a [`ResolvedRelease`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseOrigin {
    /// Produced by the descriptor's source strategy.
    Resolved,
    /// Substituted from the descriptor's pinned fallback.
    Fallback,
}

/// The concrete download chosen for a vendor "right now".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRelease {
    /// Absolute download URL.
    pub download_url: String,
    /// File name the download is stored under.
    pub file_name: String,
    /// Best-effort version; `"unknown"` and `"fallback"` are legal.
    pub version: String,
    /// Digest published alongside the release, if the source provides one.
    pub checksum: Option<String>,
    /// Whether this came from the strategy or the fallback.
    pub origin: ReleaseOrigin,
    /// The fallback's pinned version, when `origin` is `Fallback`.
    pub pinned_version: Option<String>,
}

impl ResolvedRelease {
    /// A release produced by a source strategy.
    pub fn resolved(
        download_url: impl Into<String>,
        file_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let version = version.into();
        Self {
            download_url: download_url.into(),
            file_name: file_name.into(),
            version: if version.is_empty() {
                UNKNOWN_VERSION.to_string()
            } else {
                version
            },
            checksum: None,
            origin: ReleaseOrigin::Resolved,
            pinned_version: None,
        }
    }

    /// Substitute a descriptor's fallback, tagging the version `"fallback"`.
    pub fn from_fallback(fallback: &Fallback) -> Self {
        let file_name = fallback
            .file_name
            .clone()
            .unwrap_or_else(|| file_name_from_url(&fallback.url).to_string());
        Self {
            download_url: fallback.url.clone(),
            file_name,
            version: FALLBACK_VERSION.to_string(),
            checksum: None,
            origin: ReleaseOrigin::Fallback,
            pinned_version: fallback.version.clone(),
        }
    }

    /// Attach a published digest.
    #[must_use]
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.checksum = Some(checksum.into());
        self
    }

    /// True when this release is the pinned fallback.
    pub fn is_fallback(&self) -> bool {
        self.origin == ReleaseOrigin::Fallback
    }
}

/// Extract the file name from a URL, ignoring any query string or fragment.
///
/// # Example
///
/// ```
/// use naner_schema::file_name_from_url;
///
/// assert_eq!(file_name_from_url("https://example.com/a/b.zip?x=1"), "b.zip");
/// assert_eq!(file_name_from_url(""), "");
/// ```
pub fn file_name_from_url(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or("");
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

/// Contents of the version marker written inside an installed vendor's directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledState {
    /// Vendor the directory belongs to.
    pub name: VendorName,
    /// Version reported by the resolver.
    pub version: String,
    /// Pinned fallback version, when the fallback was installed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned_version: Option<String>,
    /// URL the payload was downloaded from.
    pub url: String,
    /// When the install completed.
    pub installed_at: DateTime<Utc>,
}

impl InstalledState {
    /// Human-readable version, including the pinned version for fallbacks.
    pub fn display_version(&self) -> String {
        match &self.pinned_version {
            Some(pinned) => format!("{} ({pinned})", self.version),
            None => self.version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_tagged() {
        let fb = Fallback {
            url: "https://example.com/dl/tool-1.2.3.zip".to_string(),
            file_name: None,
            version: Some("1.2.3".to_string()),
        };
        let release = ResolvedRelease::from_fallback(&fb);
        assert_eq!(release.version, FALLBACK_VERSION);
        assert_eq!(release.file_name, "tool-1.2.3.zip");
        assert!(release.is_fallback());
        assert_eq!(release.pinned_version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn empty_version_becomes_unknown() {
        let release = ResolvedRelease::resolved("https://x/y.zip", "y.zip", "");
        assert_eq!(release.version, UNKNOWN_VERSION);
    }

    #[test]
    fn installed_state_serializes_camel_case() {
        let state = InstalledState {
            name: VendorName::new("node").unwrap(),
            version: FALLBACK_VERSION.to_string(),
            pinned_version: Some("20.11.1".to_string()),
            url: "https://nodejs.org/dist/v20.11.1/node-v20.11.1-win-x64.zip".to_string(),
            installed_at: Utc::now(),
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"pinnedVersion\":\"20.11.1\""));
        assert!(json.contains("\"installedAt\""));
        assert_eq!(state.display_version(), "fallback (20.11.1)");
    }
}
