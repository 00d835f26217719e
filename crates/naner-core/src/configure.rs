//! Post-install fix-ups.
//!
//! Runs a descriptor's [`PostInstallStep`]s against its installed directory.
//! The binary is already usable by the time this runs, so the engine turns
//! any error here into a warning.

use std::fs;
use std::path::{Path, PathBuf};

use naner_schema::{PostInstallStep, VendorDescriptor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigureError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ConfigureError + '_ {
    move |source| ConfigureError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Apply one step. Returns false when the step had nothing to do.
fn apply(step: &PostInstallStep, installed: &Path) -> Result<bool, ConfigureError> {
    let target = installed.join(step.path());
    match step {
        PostInstallStep::PortableMarker { .. } => {
            if target.exists() {
                return Ok(false);
            }
            fs::write(&target, b"").map_err(io_err(&target))?;
        }
        PostInstallStep::WriteFile {
            contents,
            overwrite,
            ..
        } => {
            if target.exists() && !overwrite {
                tracing::debug!("Keeping existing {}", target.display());
                return Ok(false);
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            fs::write(&target, contents).map_err(io_err(&target))?;
        }
        PostInstallStep::CreateDirectory { .. } => {
            if target.is_dir() {
                return Ok(false);
            }
            fs::create_dir_all(&target).map_err(io_err(&target))?;
        }
    }
    Ok(true)
}

/// Run every post-install step for `descriptor` inside `installed`.
///
/// Returns how many steps changed something. Stops at the first failure.
///
/// # Errors
///
/// Returns [`ConfigureError`] when a file or directory cannot be written.
pub fn configure(descriptor: &VendorDescriptor, installed: &Path) -> Result<usize, ConfigureError> {
    let mut applied = 0;
    for step in &descriptor.post_install {
        if apply(step, installed)? {
            tracing::debug!("{}: applied {:?}", descriptor.name, step);
            applied += 1;
        }
    }
    Ok(applied)
}
