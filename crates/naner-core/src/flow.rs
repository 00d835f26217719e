//! Vendor Installation Flow Typestate Pattern
//!
//! Models one vendor's pipeline as a series of explicit state transitions:
//!
//! ```text
//! PendingVendor --[resolve()]--> ResolvedVendor --[download()]--> DownloadedVendor
//!     --[verify()]--> VerifiedVendor --[extract()]--> ExtractedVendor
//!     --[commit()]--> CommittedVendor --[configure()]--> InstalledVendor
//! ```
//!
//! Extraction cannot be reached without a successful verification, so a
//! checksum mismatch can never lead to unpacking a tampered archive.
//!
//! Every transition only writes below the vendor's scratch directory until
//! [`ExtractedVendor::commit`], which is the first step that touches the
//! installed directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use naner_schema::{InstalledState, ResolvedRelease, VERSION_MARKER, VendorDescriptor};
use thiserror::Error;
use walkdir::WalkDir;

use crate::configure;
use crate::io::extract::{ExtractError, Extractor, merge_tree};
use crate::io::transport::{Transport, TransportError};
use crate::io::verify::{self, Verification, VerifyError};
use crate::paths::Layout;
use crate::reporter::Reporter;
use crate::resolver::{ResolveError, Resolver};

/// Staging directory name inside a vendor's scratch directory.
const STAGING_DIR: &str = ".staging";

/// Per-vendor pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    NotStarted,
    Resolving,
    Downloading,
    Verifying,
    Extracting,
    Configuring,
    Installed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotStarted => "not started",
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Extracting => "extracting",
            Self::Configuring => "configuring",
            Self::Installed => "installed",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Download failed: {0}")]
    Download(#[from] TransportError),

    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid download file name: '{0}'")]
    FileName(String),
}

impl InstallError {
    /// The stage the vendor was in when this error ended its pipeline.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Resolve(_) => Stage::Resolving,
            Self::Download(_) | Self::FileName(_) => Stage::Downloading,
            Self::Verify(_) => Stage::Verifying,
            Self::Extract(_) | Self::Io(_) => Stage::Extracting,
        }
    }
}

/// Read a vendor directory's version marker. Missing or unreadable markers are `None`.
pub fn read_marker(dir: &Path) -> Option<InstalledState> {
    let text = fs::read_to_string(dir.join(VERSION_MARKER)).ok()?;
    serde_json::from_str(&text)
        .inspect_err(|e| tracing::debug!("Ignoring unreadable marker in {}: {e}", dir.display()))
        .ok()
}

/// Write (or overwrite) a vendor directory's version marker.
///
/// # Errors
///
/// Returns an I/O error if the marker cannot be written.
pub fn write_marker(dir: &Path, state: &InstalledState) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(state).map_err(std::io::Error::other)?;
    fs::write(dir.join(VERSION_MARKER), json)
}

/// State 1: A vendor that has been selected for processing.
///
/// # Transitions
///
/// - [`resolve()`](Self::resolve) -> [`ResolvedVendor`]
#[derive(Debug)]
pub struct PendingVendor<'d> {
    pub descriptor: &'d VendorDescriptor,
}

/// State 2: The concrete download is known.
///
/// # Transitions
///
/// - [`download()`](Self::download) -> [`DownloadedVendor`]
#[derive(Debug)]
pub struct ResolvedVendor<'d> {
    pub descriptor: &'d VendorDescriptor,
    pub release: ResolvedRelease,
}

/// State 3: The archive sits in the vendor's scratch directory.
#[derive(Debug)]
pub struct DownloadedVendor<'d> {
    pub descriptor: &'d VendorDescriptor,
    pub release: ResolvedRelease,
    pub archive: PathBuf,
    pub bytes: u64,
}

/// State 4: The archive passed (or did not need) checksum verification.
#[derive(Debug)]
pub struct VerifiedVendor<'d> {
    pub descriptor: &'d VendorDescriptor,
    pub release: ResolvedRelease,
    pub archive: PathBuf,
    pub verification: Verification,
}

/// State 5: The payload is unpacked and flattened in staging.
#[derive(Debug)]
pub struct ExtractedVendor<'d> {
    pub descriptor: &'d VendorDescriptor,
    pub release: ResolvedRelease,
    pub staging: PathBuf,
}

/// State 6: The payload is in the vendor directory.
#[derive(Debug)]
pub struct CommittedVendor<'d> {
    pub descriptor: &'d VendorDescriptor,
    pub release: ResolvedRelease,
    pub dir: PathBuf,
}

/// Final state: installed, configured, and marked.
#[derive(Debug)]
pub struct InstalledVendor {
    pub state: InstalledState,
    pub dir: PathBuf,
    pub files: usize,
}

impl<'d> PendingVendor<'d> {
    pub fn new(descriptor: &'d VendorDescriptor) -> Self {
        Self { descriptor }
    }

    /// Resolves the vendor's release, falling back to its pinned download.
    pub async fn resolve(self, resolver: &Resolver) -> Result<ResolvedVendor<'d>, InstallError> {
        let release = resolver.resolve(self.descriptor).await?;
        Ok(ResolvedVendor {
            descriptor: self.descriptor,
            release,
        })
    }
}

impl<'d> ResolvedVendor<'d> {
    /// Downloads the release into `<downloads>/<name>/`.
    ///
    /// If the download fails and the release is not already the fallback,
    /// the fallback is tried once.
    pub async fn download(
        self,
        layout: &Layout,
        transport: &dyn Transport,
        reporter: &dyn Reporter,
    ) -> Result<DownloadedVendor<'d>, InstallError> {
        let scratch = layout.scratch_dir(&self.descriptor.name);
        fs::create_dir_all(&scratch).map_err(TransportError::Io)?;

        let name = &self.descriptor.name;
        let progress = |percent: u8, current: u64, total: u64| {
            reporter.downloading(name, percent, current, total);
        };

        let mut release = self.release;
        let downloaded = loop {
            let archive = scratch.join(safe_file_name(&release.file_name)?);
            match transport
                .download(&release.download_url, &archive, &progress)
                .await
            {
                Ok(bytes) => {
                    break DownloadedVendor {
                        descriptor: self.descriptor,
                        release,
                        archive,
                        bytes,
                    };
                }
                Err(e) => match (&self.descriptor.fallback, release.is_fallback()) {
                    (Some(fallback), false) => {
                        reporter.warning(&format!(
                            "{name}: download of {} failed ({e}), retrying with fallback {}",
                            release.download_url, fallback.url
                        ));
                        let mut pinned = ResolvedRelease::from_fallback(fallback);
                        pinned.checksum.clone_from(&self.descriptor.checksum);
                        release = pinned;
                    }
                    _ => return Err(e.into()),
                },
            }
        };
        Ok(downloaded)
    }
}

/// The download's file name without any directory components.
fn safe_file_name(file_name: &str) -> Result<&str, InstallError> {
    Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| *n == file_name && *n != STAGING_DIR)
        .ok_or_else(|| InstallError::FileName(file_name.to_string()))
}

impl<'d> DownloadedVendor<'d> {
    /// Checks the archive against the release checksum, if any.
    pub async fn verify(self) -> Result<VerifiedVendor<'d>, InstallError> {
        let verification =
            verify::verify_async(self.archive.clone(), self.release.checksum.clone()).await?;
        if let Verification::Matched(algorithm) = &verification {
            tracing::debug!("{}: {algorithm} checksum verified", self.descriptor.name);
        }
        Ok(VerifiedVendor {
            descriptor: self.descriptor,
            release: self.release,
            archive: self.archive,
            verification,
        })
    }
}

impl<'d> VerifiedVendor<'d> {
    /// Extracts into a fresh staging directory next to the archive.
    pub async fn extract(
        self,
        layout: &Layout,
        extractor: &Extractor,
    ) -> Result<ExtractedVendor<'d>, InstallError> {
        let staging = layout.scratch_dir(&self.descriptor.name).join(STAGING_DIR);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }

        let extractor = extractor.clone();
        let archive = self.archive.clone();
        let dest = staging.clone();
        let name = self.descriptor.name.clone();
        let args = self.descriptor.installer_arguments.clone();
        tokio::task::spawn_blocking(move || {
            extractor.extract(&archive, &dest, &name, args.as_deref())
        })
        .await
        .map_err(std::io::Error::other)??;

        Ok(ExtractedVendor {
            descriptor: self.descriptor,
            release: self.release,
            staging,
        })
    }
}

impl<'d> ExtractedVendor<'d> {
    /// Moves the staged payload into the vendor directory.
    ///
    /// With `replace`, an existing directory is removed first; otherwise the
    /// payload is merged over it so local files survive.
    pub fn commit(self, layout: &Layout, replace: bool) -> Result<CommittedVendor<'d>, InstallError> {
        let dir = layout.vendor_dir(self.descriptor);

        if replace && dir.exists() {
            tracing::debug!("Removing {} before replacing it", dir.display());
            fs::remove_dir_all(&dir)?;
        }

        if dir.exists() {
            merge_tree(&self.staging, &dir)?;
            fs::remove_dir(&self.staging)?;
        } else {
            if let Some(parent) = dir.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&self.staging, &dir)?;
        }

        Ok(CommittedVendor {
            descriptor: self.descriptor,
            release: self.release,
            dir,
        })
    }
}

impl CommittedVendor<'_> {
    /// Runs post-install steps and writes the version marker.
    ///
    /// Neither can fail the install; problems are reported as warnings.
    pub fn configure(self, reporter: &dyn Reporter) -> InstalledVendor {
        let name = &self.descriptor.name;
        if let Err(e) = configure::configure(self.descriptor, &self.dir) {
            reporter.warning(&format!("{name}: post-install configuration failed: {e}"));
        }

        let state = InstalledState {
            name: name.clone(),
            version: self.release.version,
            pinned_version: self.release.pinned_version,
            url: self.release.download_url,
            installed_at: Utc::now(),
        };
        if let Err(e) = write_marker(&self.dir, &state) {
            reporter.warning(&format!("{name}: could not write version marker: {e}"));
        }

        let files = WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .count();

        InstalledVendor {
            state,
            dir: self.dir,
            files,
        }
    }
}
