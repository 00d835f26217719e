//! naner - portable vendor bootstrapper
//!
//! Thin command-line front end over `naner-core`. It decides where the root
//! directory and catalog come from, wires a console reporter into the engine,
//! and prints results. All acquisition logic lives in the engine.
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]

pub mod cmd;
pub mod ui;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use naner_core::paths::try_naner_home;
use naner_core::{Catalog, EngineConfig, Layout};

#[derive(Debug, Parser)]
#[command(name = "naner")]
#[command(author, version, about = "naner - portable vendor bootstrapper")]
pub struct Cli {
    /// Root directory (defaults to ~/.naner)
    #[arg(long, global = true, env = "NANER_HOME")]
    pub root: Option<PathBuf>,

    /// Vendor catalog JSON (defaults to <root>/vendors.json, then the built-in catalog)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install vendors that are not installed yet
    Install {
        /// Vendor names (all vendors if empty)
        vendors: Vec<String>,
    },
    /// Re-resolve and reinstall vendors
    Update {
        /// Vendor names (all vendors if empty)
        vendors: Vec<String>,
    },
    /// List catalog vendors and their installed versions
    List,
    /// Show what would be downloaded for a vendor, without downloading it
    Resolve {
        /// Vendor name
        vendor: String,
    },
}

/// Everything a command needs before it can build an engine.
#[derive(Debug)]
pub struct Context {
    pub layout: Layout,
    pub catalog: Catalog,
    pub config: EngineConfig,
}

impl Context {
    pub fn load(root: Option<PathBuf>, catalog: Option<PathBuf>) -> Result<Self> {
        let root = match root {
            Some(root) => root,
            None => try_naner_home()
                .context("Could not determine the home directory; pass --root or set NANER_HOME")?,
        };
        let layout = Layout::new(root);

        let config = EngineConfig::load(&layout.config_path())
            .with_context(|| format!("Failed to load {}", layout.config_path().display()))?;

        let catalog = match catalog {
            Some(path) => Catalog::load(&path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
            None if layout.catalog_path().is_file() => Catalog::load(&layout.catalog_path())
                .with_context(|| {
                    format!("Failed to load catalog {}", layout.catalog_path().display())
                })?,
            None => Catalog::builtin().context("Built-in catalog is invalid")?,
        };
        tracing::debug!(
            "Root {} with {} vendors",
            layout.root().display(),
            catalog.len()
        );

        Ok(Self {
            layout,
            catalog,
            config,
        })
    }
}
