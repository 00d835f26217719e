//! Shared types and catalog format for naner.
//!
//! A vendor catalog is a JSON array of [`VendorDescriptor`] objects. Each
//! descriptor names exactly one [`VendorSource`] strategy, so the set of
//! meaningful parameters is always determined by the source tag.

pub mod descriptor;
pub mod hash;
pub mod release;
pub mod repo;
pub mod source;

// Re-exports
pub use descriptor::*;
pub use hash::*;
pub use release::*;
pub use repo::GitHubRepo;
pub use source::*;

/// File name of the per-vendor installed-state marker.
pub const VERSION_MARKER: &str = ".naner-version.json";

/// Name of the scratch directory created under the vendor root for a batch.
pub const DOWNLOADS_DIR: &str = ".downloads";
