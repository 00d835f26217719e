use anyhow::Result;
use comfy_table::Table;
use comfy_table::presets::UTF8_FULL_CONDENSED;

use crate::Context;

/// Print the catalog with each vendor's installed version.
pub fn list(ctx: &Context) -> Result<()> {
    let vendors = ctx.catalog.ordered()?;

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec!["Vendor", "Directory", "Source", "Installed", "Description"]);

    for descriptor in vendors {
        let dir = ctx.layout.vendor_dir(descriptor);
        let installed = match naner_core::flow::read_marker(&dir) {
            Some(state) => state.display_version(),
            None if naner_core::paths::is_populated(&dir) => "unknown".to_string(),
            None if !descriptor.enabled => "disabled".to_string(),
            None => "-".to_string(),
        };
        table.add_row(vec![
            descriptor.name.to_string(),
            descriptor.extract_directory.clone(),
            descriptor.source.kind().to_string(),
            installed,
            descriptor.description.clone(),
        ]);
    }

    println!("{table}");
    Ok(())
}
