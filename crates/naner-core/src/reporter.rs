//! Reporter trait for dependency injection
//!
//! This trait allows the engine to report progress and per-vendor outcomes
//! without being coupled to a specific terminal or GUI implementation.

use naner_schema::VendorName;

use crate::flow::Stage;

pub trait Reporter: Send + Sync {
    /// Indicates a new batch or phase has started (e.g. "Installing vendors").
    fn section(&self, title: &str);

    /// A vendor entered a new pipeline stage.
    fn stage(&self, name: &VendorName, stage: Stage);

    /// Download progress, reported in 10% steps when the total size is known.
    fn downloading(&self, name: &VendorName, percent: u8, current: u64, total: u64);

    /// Marks a vendor as successfully installed.
    fn done(&self, name: &VendorName, version: &str, detail: &str);

    /// Marks a vendor as skipped (already installed or disabled).
    fn skipped(&self, name: &VendorName, reason: &str);

    /// Marks a vendor as failed at `stage` with a specific reason.
    fn failed(&self, name: &VendorName, stage: Stage, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);

    /// Display a final summary of the batch.
    fn summary(&self, installed: usize, skipped: usize, failed: usize, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn stage(&self, name: &VendorName, stage: Stage) {
        (**self).stage(name, stage);
    }
    fn downloading(&self, name: &VendorName, percent: u8, current: u64, total: u64) {
        (**self).downloading(name, percent, current, total);
    }
    fn done(&self, name: &VendorName, version: &str, detail: &str) {
        (**self).done(name, version, detail);
    }
    fn skipped(&self, name: &VendorName, reason: &str) {
        (**self).skipped(name, reason);
    }
    fn failed(&self, name: &VendorName, stage: Stage, reason: &str) {
        (**self).failed(name, stage, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
    fn summary(&self, installed: usize, skipped: usize, failed: usize, elapsed_secs: f64) {
        (**self).summary(installed, skipped, failed, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn stage(&self, _: &VendorName, _: Stage) {}
    fn downloading(&self, _: &VendorName, _: u8, _: u64, _: u64) {}
    fn done(&self, _: &VendorName, _: &str, _: &str) {}
    fn skipped(&self, _: &VendorName, _: &str) {}
    fn failed(&self, _: &VendorName, _: Stage, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
    fn summary(&self, _: usize, _: usize, _: usize, _: f64) {}
}

/// Forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn section(&self, title: &str) {
        tracing::info!("== {title} ==");
    }

    fn stage(&self, name: &VendorName, stage: Stage) {
        tracing::debug!(vendor = %name, "{stage}");
    }

    fn downloading(&self, name: &VendorName, percent: u8, current: u64, total: u64) {
        tracing::info!(vendor = %name, "downloaded {percent}% ({current}/{total} bytes)");
    }

    fn done(&self, name: &VendorName, version: &str, detail: &str) {
        tracing::info!(vendor = %name, version, "{detail}");
    }

    fn skipped(&self, name: &VendorName, reason: &str) {
        tracing::info!(vendor = %name, "skipped: {reason}");
    }

    fn failed(&self, name: &VendorName, stage: Stage, reason: &str) {
        tracing::warn!(vendor = %name, %stage, "failed: {reason}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn warning(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn summary(&self, installed: usize, skipped: usize, failed: usize, elapsed_secs: f64) {
        tracing::info!(
            "{installed} installed, {skipped} skipped, {failed} failed in {elapsed_secs:.1}s"
        );
    }
}
