//! Vendor descriptors: the unit of work for the installation engine.

use std::borrow::Borrow;
use std::path::{Component, Path};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hash::{Checksum, ChecksumError};
use crate::source::VendorSource;

/// A normalized vendor name.
///
/// Names are lowercased and restricted to `[a-z0-9._-]` so they can be used
/// directly as directory names inside the scratch area.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VendorName(String);

impl VendorName {
    /// Create a new vendor name, normalizing the input to lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error string if the name is empty, starts with `.`, or
    /// contains characters outside `[A-Za-z0-9._-]`.
    pub fn new(name: &str) -> Result<Self, String> {
        let normalized = name.trim().to_lowercase();
        if normalized.is_empty() {
            return Err("Vendor name must not be empty".to_string());
        }
        if normalized.starts_with('.') {
            return Err(format!("Vendor name must not start with '.': '{name}'"));
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            return Err(format!("Invalid vendor name: '{name}'"));
        }
        Ok(Self(normalized))
    }

    /// Return the normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VendorName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for VendorName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for VendorName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<Path> for VendorName {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

impl Borrow<str> for VendorName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for VendorName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl PartialEq<&str> for VendorName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.to_lowercase()
    }
}

impl TryFrom<String> for VendorName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl TryFrom<&str> for VendorName {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VendorName> for String {
    fn from(name: VendorName) -> Self {
        name.0
    }
}

/// Statically pinned download used when dynamic resolution fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fallback {
    /// Direct download URL.
    pub url: String,
    /// File name to store the download under. Defaults to the last URL segment.
    #[serde(default)]
    pub file_name: Option<String>,
    /// Version the pinned URL corresponds to, recorded for reference.
    #[serde(default)]
    pub version: Option<String>,
}

fn default_portable_marker() -> String {
    ".portable".to_string()
}

/// Optional fix-up run after a vendor has been extracted.
///
/// This is a deliberately closed set; paths are relative to the vendor's
/// installed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PostInstallStep {
    /// Create an empty marker file that switches an application into
    /// portable mode.
    PortableMarker {
        /// Marker file name.
        #[serde(default = "default_portable_marker")]
        file: String,
    },
    /// Write a text document, typically a default settings file.
    WriteFile {
        /// Target path.
        path: String,
        /// File contents.
        contents: String,
        /// Replace an existing file. Off by default so user edits survive.
        #[serde(default)]
        overwrite: bool,
    },
    /// Ensure a directory exists.
    CreateDirectory {
        /// Directory path.
        path: String,
    },
}

impl PostInstallStep {
    /// Relative path this step touches.
    pub fn path(&self) -> &str {
        match self {
            Self::PortableMarker { file } => file,
            Self::WriteFile { path, .. } | Self::CreateDirectory { path } => path,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Static configuration describing how to locate, verify, and unpack one vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorDescriptor {
    /// Display identity and lookup key.
    pub name: VendorName,
    /// Short human-readable summary.
    #[serde(default)]
    pub description: String,
    /// Directory under the vendor root where contents land.
    pub extract_directory: String,
    /// Release discovery strategy and its parameters.
    pub source: VendorSource,
    /// Pinned download used when `source` cannot be resolved.
    #[serde(default)]
    pub fallback: Option<Fallback>,
    /// Expected checksum of the downloaded blob. Absent means no verification.
    #[serde(default)]
    pub checksum: Option<String>,
    /// Extra arguments for installer-package formats.
    #[serde(default)]
    pub installer_arguments: Option<Vec<String>>,
    /// Vendors that must be processed before this one.
    #[serde(default)]
    pub dependencies: Vec<VendorName>,
    /// Extract over the existing directory on update instead of replacing it.
    #[serde(default)]
    pub preserve_state_on_update: bool,
    /// Fix-ups run once extraction succeeds.
    #[serde(default)]
    pub post_install: Vec<PostInstallStep>,
    /// Disabled vendors are reported as skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Reasons a descriptor is rejected at catalog load time.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// `extractDirectory` is empty, absolute, escapes the vendor root, or is hidden.
    #[error("{vendor}: invalid extractDirectory '{path}': {reason}")]
    ExtractDirectory {
        /// Offending vendor.
        vendor: VendorName,
        /// The configured path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The scrape pattern does not compile or has no capture group.
    #[error("{vendor}: invalid scrape pattern: {reason}")]
    Pattern {
        /// Offending vendor.
        vendor: VendorName,
        /// Compiler message or missing-group notice.
        reason: String,
    },

    /// A post-install step points outside the vendor directory.
    #[error("{vendor}: post-install path '{path}' must be relative and stay inside the vendor directory")]
    PostInstallPath {
        /// Offending vendor.
        vendor: VendorName,
        /// The configured path.
        path: String,
    },

    /// The expected checksum cannot be parsed.
    #[error("{vendor}: invalid checksum: {source}")]
    Checksum {
        /// Offending vendor.
        vendor: VendorName,
        /// Why the checksum was rejected.
        #[source]
        source: ChecksumError,
    },

    /// The vendor lists itself as a dependency.
    #[error("{0}: a vendor cannot depend on itself")]
    SelfDependency(VendorName),
}

/// Returns true when `path` is relative and every component is a plain name.
fn is_contained(path: &str) -> bool {
    let p = Path::new(path);
    !path.is_empty() && p.components().all(|c| matches!(c, Component::Normal(_)))
}

impl VendorDescriptor {
    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns the first [`DescriptorError`] found.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        let dir_error = |reason| DescriptorError::ExtractDirectory {
            vendor: self.name.clone(),
            path: self.extract_directory.clone(),
            reason,
        };
        if !is_contained(&self.extract_directory) {
            return Err(dir_error("must be a relative path without '..'"));
        }
        if self.extract_directory.starts_with('.') {
            return Err(dir_error("hidden directories are reserved"));
        }

        if let Some(checksum) = &self.checksum {
            Checksum::parse(checksum).map_err(|source| DescriptorError::Checksum {
                vendor: self.name.clone(),
                source,
            })?;
        }

        if let VendorSource::WebScrape { pattern, .. } = &self.source {
            let re = Regex::new(pattern).map_err(|e| DescriptorError::Pattern {
                vendor: self.name.clone(),
                reason: e.to_string(),
            })?;
            if re.captures_len() < 2 {
                return Err(DescriptorError::Pattern {
                    vendor: self.name.clone(),
                    reason: "pattern has no capture group".to_string(),
                });
            }
        }

        for step in &self.post_install {
            if !is_contained(step.path()) {
                return Err(DescriptorError::PostInstallPath {
                    vendor: self.name.clone(),
                    path: step.path().to_string(),
                });
            }
        }

        if self.dependencies.contains(&self.name) {
            return Err(DescriptorError::SelfDependency(self.name.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VendorSource;

    fn descriptor(json: &str) -> VendorDescriptor {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn vendor_name_normalizes_and_validates() {
        assert_eq!(VendorName::new("PowerShell").unwrap().as_str(), "powershell");
        assert!(VendorName::new("").is_err());
        assert!(VendorName::new(".downloads").is_err());
        assert!(VendorName::new("a/b").is_err());
        assert_eq!(VendorName::new("7zip").unwrap(), "7ZIP");
    }

    #[test]
    fn optional_fields_default_to_disabled() {
        let d = descriptor(
            r#"{
                "name": "7zip",
                "extractDirectory": "7zip",
                "source": {"type": "static", "url": "https://example.com/7z2408-x64.msi"}
            }"#,
        );
        assert!(d.checksum.is_none());
        assert!(d.fallback.is_none());
        assert!(d.installer_arguments.is_none());
        assert!(d.dependencies.is_empty());
        assert!(d.post_install.is_empty());
        assert!(!d.preserve_state_on_update);
        assert!(d.enabled);
        assert!(matches!(d.source, VendorSource::Static { .. }));
        d.validate().unwrap();
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let d = descriptor(
            r#"{
                "name": "x",
                "extractDirectory": "x",
                "futureField": 42,
                "source": {"type": "static", "url": "https://example.com/x.zip"}
            }"#,
        );
        assert_eq!(d.name, "x");
    }

    #[test]
    fn full_descriptor_round_trips_post_install() {
        let d = descriptor(
            r#"{
                "name": "windows-terminal",
                "extractDirectory": "terminal",
                "preserveStateOnUpdate": true,
                "source": {"type": "github-release", "repo": "microsoft/terminal", "assetSuffix": "_x64.zip"},
                "fallback": {"url": "https://example.com/wt-1.21.zip", "version": "1.21"},
                "postInstall": [
                    {"kind": "portable-marker"},
                    {"kind": "write-file", "path": "settings/settings.json", "contents": "{}"}
                ]
            }"#,
        );
        assert!(d.preserve_state_on_update);
        assert_eq!(
            d.post_install[0],
            PostInstallStep::PortableMarker {
                file: ".portable".to_string()
            }
        );
        assert_eq!(d.post_install[1].path(), "settings/settings.json");
        assert_eq!(d.fallback.as_ref().unwrap().version.as_deref(), Some("1.21"));
        d.validate().unwrap();
    }

    #[test]
    fn rejects_escaping_extract_directory() {
        for bad in ["../evil", "/abs", "", ".downloads", "a/../b"] {
            let mut d = descriptor(
                r#"{"name": "x", "extractDirectory": "x", "source": {"type": "static", "url": "u"}}"#,
            );
            d.extract_directory = bad.to_string();
            assert!(
                matches!(d.validate(), Err(DescriptorError::ExtractDirectory { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_scrape_without_capture_group() {
        let d = descriptor(
            r#"{
                "name": "msys2",
                "extractDirectory": "msys64",
                "source": {"type": "web-scrape", "pageUrl": "https://repo.msys2.org/distrib/", "pattern": "msys2-base.*\\.tar\\.xz", "baseUrl": "https://repo.msys2.org/distrib/"}
            }"#,
        );
        assert!(matches!(d.validate(), Err(DescriptorError::Pattern { .. })));
    }

    #[test]
    fn rejects_post_install_outside_vendor_dir() {
        let d = descriptor(
            r#"{
                "name": "x",
                "extractDirectory": "x",
                "source": {"type": "static", "url": "u"},
                "postInstall": [{"kind": "create-directory", "path": "../outside"}]
            }"#,
        );
        assert!(matches!(
            d.validate(),
            Err(DescriptorError::PostInstallPath { .. })
        ));
    }

    #[test]
    fn rejects_self_dependency() {
        let d = descriptor(
            r#"{"name": "x", "extractDirectory": "x", "source": {"type": "static", "url": "u"}, "dependencies": ["X"]}"#,
        );
        assert!(matches!(d.validate(), Err(DescriptorError::SelfDependency(_))));
    }

    #[test]
    fn rejects_unparseable_checksum() {
        let mut d = descriptor(
            r#"{"name": "x", "extractDirectory": "x", "source": {"type": "static", "url": "u"}}"#,
        );
        d.checksum = Some(format!("md5:{}", "0".repeat(32)));
        assert!(matches!(
            d.validate(),
            Err(DescriptorError::Checksum {
                source: ChecksumError::UnsupportedAlgorithm(_),
                ..
            })
        ));

        d.checksum = Some("sha256:not-a-digest".to_string());
        assert!(matches!(
            d.validate(),
            Err(DescriptorError::Checksum { .. })
        ));

        d.checksum = Some(format!("SHA256:{}", "AB".repeat(32)));
        d.validate().unwrap();
    }
}
