use std::sync::Arc;

use anyhow::{Result, bail};
use naner_core::{BatchReport, Engine};

use crate::Context;
use crate::ui::ConsoleReporter;

fn engine(ctx: Context) -> Result<Engine> {
    let reporter = Arc::new(ConsoleReporter::new());
    Ok(Engine::with_http(ctx.layout, ctx.catalog, ctx.config, reporter)?)
}

/// Install vendors that are not installed yet.
pub async fn install(ctx: Context, vendors: &[String]) -> Result<()> {
    let report = engine(ctx)?.install(vendors).await?;
    finish(&report)
}

/// Reinstall vendors from freshly resolved releases.
pub async fn update(ctx: Context, vendors: &[String]) -> Result<()> {
    let report = engine(ctx)?.update(vendors).await?;
    finish(&report)
}

fn finish(report: &BatchReport) -> Result<()> {
    if report.failed() > 0 {
        bail!("{} of {} vendors failed", report.failed(), report.outcomes.len());
    }
    Ok(())
}
