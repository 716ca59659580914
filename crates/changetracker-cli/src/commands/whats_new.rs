use crate::pipeline;
use anyhow::{Result, bail};
use changetracker_core::{AppConfig, ScrapeReport, View};
use console::style;
use std::path::{Path, PathBuf};

pub fn execute(config_path: &Path, output: Option<PathBuf>, upload: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let output_dir = output.unwrap_or_else(|| config.output_dir.clone());

    let upload_target = match (upload, config.upload_target()) {
        (false, _) => None,
        (true, Some(target)) => Some(target),
        (true, None) => bail!(
            "SharePoint upload is not configured (clientId, tenantId and sharepoint.siteUrl are required)"
        ),
    };

    let runtime = pipeline::runtime()?;
    runtime.block_on(async {
        let rows = pipeline::fetch_whats_new(&config).await?;
        println!(
            "{} Found {} what's new entries",
            style("✓").green(),
            rows.len()
        );

        let mut report = ScrapeReport::new();
        report.set(View::WhatsNew, Some(rows));
        pipeline::save_report(&report, &output_dir)?;

        if let Some(target) = upload_target {
            let mut session = pipeline::authenticate(&target, config_path).await?;
            pipeline::upload_report(&mut session, &config, &target.site_url, &report).await;
        }
        Ok(())
    })
}
