use crate::pipeline;
use anyhow::{Context, Result, anyhow};
use changetracker_core::dump::DumpReader;
use changetracker_core::{AppConfig, View};
use console::style;
use std::path::Path;

pub fn execute(config_path: &Path, file: &Path, view: Option<View>) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;

    let target = config.upload_target().ok_or_else(|| {
        anyhow!(
            "SharePoint upload is not configured (clientId, tenantId and sharepoint.siteUrl are required)"
        )
    })?;

    let view = match view {
        Some(view) => view,
        None => view_from_file_name(file).ok_or_else(|| {
            anyhow!(
                "Cannot tell which view {} belongs to - pass --view",
                file.display()
            )
        })?,
    };

    let rows = DumpReader::from_file(file)
        .with_context(|| format!("Failed to read dump {}", file.display()))?;
    println!(
        "{} Loaded {} {} rows from {}",
        style("✓").green(),
        rows.len(),
        view,
        file.display()
    );

    let runtime = pipeline::runtime()?;
    runtime.block_on(async {
        let mut session = pipeline::authenticate(&target, config_path).await?;
        match pipeline::upload_view(&mut session, &config, &target.site_url, view, &rows).await {
            Some(stats) => {
                println!("\n{} {}", style("Upload complete:").bold().green(), stats);
                Ok(())
            }
            None => Err(anyhow!("Upload to {} failed", config.list_name(view))),
        }
    })
}

/// Infer the view from a dump name like `roadmap-2025-03-04T09-15-00.json`
fn view_from_file_name(file: &Path) -> Option<View> {
    let name = file.file_stem()?.to_str()?;
    View::ALL
        .into_iter()
        .find(|view| {
            name.strip_prefix(view.file_stem())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
        })
}
