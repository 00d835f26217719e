//! Installation orchestrator.
//!
//! Walks the catalog in dependency order and drives each vendor through the
//! [`flow`](crate::flow) pipeline. Vendors run strictly one after another: they
//! share one scratch directory and one external archive tool.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use naner_schema::{InstalledState, ResolvedRelease, VendorDescriptor, VendorName};
use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::config::{ConfigError, EngineConfig};
use crate::flow::{self, InstallError, InstalledVendor, PendingVendor, Stage};
use crate::io::extract::Extractor;
use crate::io::transport::{HttpTransport, Transport, TransportError};
use crate::paths::{Layout, is_populated};
use crate::reporter::Reporter;
use crate::resolver::{ResolveError, Resolver};

/// Errors that stop a batch before (or instead of) processing vendors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Cannot prepare {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    /// Skip vendors whose directory is already populated.
    Install,
    /// Re-resolve and reinstall everything.
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorStatus {
    Installed { version: String },
    Skipped { reason: String },
    Failed { stage: Stage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorOutcome {
    pub name: VendorName,
    pub status: VendorStatus,
}

/// Per-vendor results of one batch. Partial success is the normal case.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<VendorOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn installed(&self) -> usize {
        self.count(|s| matches!(s, VendorStatus::Installed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, VendorStatus::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, VendorStatus::Failed { .. }))
    }

    pub fn status(&self, name: &str) -> Option<&VendorStatus> {
        self.outcomes
            .iter()
            .find(|o| o.name == name)
            .map(|o| &o.status)
    }

    fn count(&self, pred: impl Fn(&VendorStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

pub struct Engine {
    layout: Layout,
    catalog: Catalog,
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    resolver: Resolver,
    reporter: Arc<dyn Reporter>,
}

impl Engine {
    pub fn new(
        layout: Layout,
        catalog: Catalog,
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let resolver = Resolver::new(Arc::clone(&transport), config.endpoints.clone());
        Self {
            layout,
            catalog,
            config,
            transport,
            resolver,
            reporter,
        }
    }

    /// An engine talking to the network through [`HttpTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Transport`] if the HTTP client cannot be built.
    pub fn with_http(
        layout: Layout,
        catalog: Catalog,
        config: EngineConfig,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, EngineError> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::new(layout, catalog, config, transport, reporter))
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Presence check: the vendor directory exists and is non-empty.
    pub fn is_installed(&self, descriptor: &VendorDescriptor) -> bool {
        is_populated(&self.layout.vendor_dir(descriptor))
    }

    /// What the version marker says is installed, if anything.
    pub fn installed_state(&self, descriptor: &VendorDescriptor) -> Option<InstalledState> {
        flow::read_marker(&self.layout.vendor_dir(descriptor))
    }

    /// Resolve one vendor without downloading anything.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] for unknown vendors or when neither the source
    /// nor a fallback yields a release.
    pub async fn resolve(&self, name: &str) -> Result<ResolvedRelease, EngineError> {
        let descriptor = self
            .catalog
            .find(name)
            .ok_or_else(|| CatalogError::UnknownVendor(name.to_string()))?;
        Ok(self.resolver.resolve(descriptor).await?)
    }

    /// Install every selected vendor whose directory is empty or missing.
    ///
    /// `names` restricts the batch; an empty slice means the whole catalog.
    ///
    /// # Errors
    ///
    /// Only batch setup can fail. Per-vendor failures are reported in the
    /// returned [`BatchReport`].
    pub async fn install(&self, names: &[String]) -> Result<BatchReport, EngineError> {
        self.run_batch(BatchMode::Install, names).await
    }

    /// Reinstall every selected vendor regardless of its current state.
    ///
    /// # Errors
    ///
    /// See [`Engine::install`].
    pub async fn update(&self, names: &[String]) -> Result<BatchReport, EngineError> {
        self.run_batch(BatchMode::Update, names).await
    }

    /// The extractor, pointed at the archive vendor's executable.
    fn extractor(&self) -> Result<Extractor, EngineError> {
        let tools = &self.config.tools;
        let archive_vendor = tools.archive_vendor_name()?;
        let vendor_dir = match self.catalog.find(&archive_vendor) {
            Some(descriptor) => self.layout.vendor_dir(descriptor),
            None => self.layout.vendor_root().join(&archive_vendor),
        };
        Ok(Extractor::new(
            tools,
            vendor_dir.join(&tools.archive_executable),
        ))
    }

    async fn run_batch(&self, mode: BatchMode, names: &[String]) -> Result<BatchReport, EngineError> {
        let started = Instant::now();
        let vendors = self.catalog.select(names)?;
        let extractor = self.extractor()?;

        self.reporter.section(match mode {
            BatchMode::Install => "Installing vendors",
            BatchMode::Update => "Updating vendors",
        });

        let downloads = self.layout.downloads_dir();
        fs::create_dir_all(&downloads).map_err(|source| EngineError::Scratch {
            path: downloads.clone(),
            source,
        })?;

        let mut report = BatchReport::default();
        let mut failed: HashSet<VendorName> = HashSet::new();
        for descriptor in vendors {
            let status = self.process(descriptor, mode, &extractor, &failed).await;
            if matches!(status, VendorStatus::Failed { .. }) {
                failed.insert(descriptor.name.clone());
            }
            report.outcomes.push(VendorOutcome {
                name: descriptor.name.clone(),
                status,
            });
        }

        if let Err(e) = fs::remove_dir_all(&downloads) {
            tracing::warn!("Failed to remove {}: {e}", downloads.display());
        }

        report.elapsed = started.elapsed();
        self.reporter.summary(
            report.installed(),
            report.skipped(),
            report.failed(),
            report.elapsed.as_secs_f64(),
        );
        Ok(report)
    }

    async fn process(
        &self,
        descriptor: &VendorDescriptor,
        mode: BatchMode,
        extractor: &Extractor,
        failed: &HashSet<VendorName>,
    ) -> VendorStatus {
        let name = &descriptor.name;
        let reporter = self.reporter.as_ref();

        if !descriptor.enabled {
            let reason = "disabled".to_string();
            reporter.skipped(name, &reason);
            return VendorStatus::Skipped { reason };
        }

        let dir = self.layout.vendor_dir(descriptor);
        match mode {
            BatchMode::Install if is_populated(&dir) => {
                let reason = match flow::read_marker(&dir) {
                    Some(state) => format!("already installed ({})", state.display_version()),
                    None => "already installed".to_string(),
                };
                reporter.skipped(name, &reason);
                return VendorStatus::Skipped { reason };
            }
            BatchMode::Update => {
                if let Some(state) = flow::read_marker(&dir) {
                    reporter.info(&format!("{name}: replacing {}", state.display_version()));
                } else if is_populated(&dir) {
                    reporter.info(&format!("{name}: replacing unversioned installation"));
                }
            }
            BatchMode::Install => {}
        }

        self.warn_unmet_dependencies(descriptor, failed);

        let replace = mode == BatchMode::Update && !descriptor.preserve_state_on_update;
        match self.run(descriptor, extractor, replace).await {
            Ok(installed) => {
                reporter.done(
                    name,
                    &installed.state.display_version(),
                    &format!("{} files in {}", installed.files, installed.dir.display()),
                );
                VendorStatus::Installed {
                    version: installed.state.version,
                }
            }
            Err(e) => {
                let stage = e.stage();
                let reason = e.to_string();
                reporter.failed(name, stage, &reason);
                VendorStatus::Failed { stage, reason }
            }
        }
    }

    /// The dependent still runs its own pipeline; this only makes the likely
    /// cause of a later failure visible.
    fn warn_unmet_dependencies(&self, descriptor: &VendorDescriptor, failed: &HashSet<VendorName>) {
        for dep in &descriptor.dependencies {
            let unmet = failed.contains(dep)
                || self
                    .catalog
                    .find(dep)
                    .is_some_and(|d| !d.enabled || !self.is_installed(d));
            if unmet {
                self.reporter.warning(&format!(
                    "{}: dependency {dep} is not installed; continuing anyway",
                    descriptor.name
                ));
            }
        }
    }

    async fn run(
        &self,
        descriptor: &VendorDescriptor,
        extractor: &Extractor,
        replace: bool,
    ) -> Result<InstalledVendor, InstallError> {
        let name = &descriptor.name;
        let reporter = self.reporter.as_ref();

        reporter.stage(name, Stage::Resolving);
        let resolved = PendingVendor::new(descriptor).resolve(&self.resolver).await?;

        reporter.stage(name, Stage::Downloading);
        let downloaded = resolved
            .download(&self.layout, self.transport.as_ref(), reporter)
            .await?;

        reporter.stage(name, Stage::Verifying);
        let verified = downloaded.verify().await?;

        reporter.stage(name, Stage::Extracting);
        let extracted = verified.extract(&self.layout, extractor).await?;
        let committed = extracted.commit(&self.layout, replace)?;

        reporter.stage(name, Stage::Configuring);
        let installed = committed.configure(reporter);

        reporter.stage(name, Stage::Installed);
        Ok(installed)
    }
}
