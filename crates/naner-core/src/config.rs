//! Engine configuration (`naner.toml`).
//!
//! Every field has a default, so a missing file or a partial file is fine.

use std::path::Path;

use naner_schema::VendorName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid archive vendor: {0}")]
    ArchiveVendor(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub http: HttpConfig,
    pub endpoints: Endpoints,
    pub tools: ToolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Overall request timeout, sized for large archives over slow links.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Sent to the GitHub API to raise the anonymous rate limit.
    pub github_token: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            user_agent: crate::USER_AGENT.to_string(),
            github_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub github_api: String,
    pub node_index: String,
    pub node_dist: String,
    pub go_index: String,
    pub go_dist: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            github_api: "https://api.github.com".to_string(),
            node_index: "https://nodejs.org/dist/index.json".to_string(),
            node_dist: "https://nodejs.org/dist".to_string(),
            go_index: "https://go.dev/dl/?mode=json".to_string(),
            go_dist: "https://go.dev/dl".to_string(),
        }
    }
}

/// How two-stage compressed tarballs are unpacked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TarBackend {
    /// Decode in-process (gzip, zstd, plain tar).
    Native,
    /// Shell out to the archive-utility vendor (decompress, then un-tar).
    External,
}

impl Default for TarBackend {
    fn default() -> Self {
        if cfg!(windows) {
            Self::External
        } else {
            Self::Native
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub tar_backend: TarBackend,
    /// Vendor that ships the external archive tool. It must be installed first.
    pub archive_vendor: String,
    /// Executable path relative to the archive vendor's directory.
    pub archive_executable: String,
    /// Installer used for administrative (extraction-only) installs.
    pub installer: String,
    pub timeout_secs: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tar_backend: TarBackend::default(),
            archive_vendor: "7zip".to_string(),
            archive_executable: if cfg!(windows) { "7z.exe" } else { "7z" }.to_string(),
            installer: "msiexec".to_string(),
            timeout_secs: 900,
        }
    }
}

impl ToolConfig {
    /// The archive vendor as a validated name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ArchiveVendor`] when the configured name is invalid.
    pub fn archive_vendor_name(&self) -> Result<VendorName, ConfigError> {
        VendorName::new(&self.archive_vendor).map_err(ConfigError::ArchiveVendor)
    }
}

impl EngineConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or mistyped fields.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist. `GITHUB_TOKEN` fills in a missing token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        if config.http.github_token.is_none() {
            config.http.github_token = std::env::var("GITHUB_TOKEN")
                .ok()
                .filter(|t| !t.is_empty());
        }
        Ok(config)
    }
}
