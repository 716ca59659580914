use crate::pipeline;
use anyhow::Result;
use changetracker_browser::PortalScraper;
use changetracker_core::{AppConfig, View};
use console::style;
use std::path::Path;

pub fn execute(config_path: &Path, no_upload: bool) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let upload_target = if no_upload {
        None
    } else {
        config.upload_target()
    };

    let runtime = pipeline::runtime()?;

    runtime.block_on(async {
        println!("{}", style("Scraping the Entra portal...").bold());
        let mut report = PortalScraper::new(&config).run().await?;

        if config.http_scraping.enabled {
            match pipeline::fetch_whats_new(&config).await {
                Ok(rows) => report.set(View::WhatsNew, Some(rows)),
                Err(e) => tracing::warn!("Could not scrape the What's new page: {:#}", e),
            }
        }

        pipeline::print_report_summary(&report);

        if config.save_to_file || upload_target.is_none() {
            println!();
            pipeline::save_report(&report, &config.output_dir)?;
        }

        let Some(target) = upload_target else {
            println!(
                "\n{}",
                style("SharePoint upload not configured - data saved locally only").yellow()
            );
            return Ok(());
        };

        println!();
        let mut session = pipeline::authenticate(&target, config_path).await?;
        let totals =
            pipeline::upload_report(&mut session, &config, &target.site_url, &report).await;

        println!("\n{} {}", style("Upload complete:").bold().green(), totals);
        Ok(())
    })
}
