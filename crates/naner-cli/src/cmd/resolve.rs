use std::sync::Arc;

use anyhow::Result;
use naner_core::{Engine, TracingReporter};

use crate::Context;

/// Print the release a vendor would install, without downloading it.
pub async fn resolve(ctx: Context, vendor: &str) -> Result<()> {
    let engine = Engine::with_http(ctx.layout, ctx.catalog, ctx.config, Arc::new(TracingReporter))?;
    let release = engine.resolve(vendor).await?;

    println!("{vendor} {}", release.version);
    println!("  url:      {}", release.download_url);
    println!("  file:     {}", release.file_name);
    if let Some(checksum) = &release.checksum {
        println!("  checksum: {checksum}");
    }
    if release.is_fallback() {
        println!("  (fallback release)");
    }
    Ok(())
}
