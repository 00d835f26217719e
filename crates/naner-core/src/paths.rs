use std::path::{Path, PathBuf};

use dirs::home_dir;
use naner_schema::{DOWNLOADS_DIR, VERSION_MARKER, VendorDescriptor, VendorName};

/// Returns the default root directory, or None if the user's home cannot be resolved.
///
/// `NANER_HOME` overrides the default of `~/.naner`.
pub fn try_naner_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("NANER_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".naner"))
}

/// Directory layout rooted at one naner installation.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Engine configuration: `<root>/naner.toml`
    pub fn config_path(&self) -> PathBuf {
        self.root.join("naner.toml")
    }

    /// Catalog override: `<root>/vendors.json`
    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("vendors.json")
    }

    /// Vendor root: `<root>/vendor`
    pub fn vendor_root(&self) -> PathBuf {
        self.root.join("vendor")
    }

    /// Batch scratch area: `<root>/vendor/.downloads`
    pub fn downloads_dir(&self) -> PathBuf {
        self.vendor_root().join(DOWNLOADS_DIR)
    }

    /// Per-vendor scratch directory inside the batch scratch area.
    pub fn scratch_dir(&self, name: &VendorName) -> PathBuf {
        self.downloads_dir().join(name)
    }

    /// Installed location of a vendor.
    pub fn vendor_dir(&self, descriptor: &VendorDescriptor) -> PathBuf {
        self.vendor_root().join(&descriptor.extract_directory)
    }

    /// Version marker inside a vendor's installed directory.
    pub fn marker_path(&self, descriptor: &VendorDescriptor) -> PathBuf {
        self.vendor_dir(descriptor).join(VERSION_MARKER)
    }
}

/// True when `dir` exists and has at least one entry.
///
/// This is a presence check, not a correctness check.
pub fn is_populated(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
