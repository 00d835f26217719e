//! naner-core - vendor acquisition and installation engine.
//!
//! The engine takes a [`Catalog`] of vendor descriptors and a root directory,
//! and for each vendor runs:
//!
//! ```text
//! resolve -> download -> verify -> extract -> configure -> write marker
//! ```
//!
//! Vendors are processed strictly sequentially. A failing vendor is reported
//! and the batch moves on to the next one.
//!
//! # Directory Layout
//!
//! ```text
//! <root>/
//! ├── naner.toml              # optional engine configuration
//! ├── vendors.json            # optional catalog override
//! └── vendor/
//!     ├── .downloads/         # scratch area, removed after each batch
//!     └── <extractDirectory>/
//!         └── .naner-version.json
//! ```

pub mod catalog;
pub mod config;
pub mod configure;
pub mod engine;
pub mod flow;
pub mod io;
pub mod paths;
pub mod reporter;
pub mod resolver;

pub use catalog::Catalog;
pub use config::EngineConfig;
pub use engine::{BatchMode, BatchReport, Engine, VendorOutcome, VendorStatus};
pub use flow::Stage;
pub use io::transport::{HttpTransport, Transport};
pub use paths::Layout;
pub use reporter::{NullReporter, Reporter, TracingReporter};
pub use resolver::{Resolver, Strategy};

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("naner/", env!("CARGO_PKG_VERSION"));
