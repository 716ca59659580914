use crate::pipeline;
use anyhow::Result;
use changetracker_browser::PortalScraper;
use changetracker_core::AppConfig;
use std::path::{Path, PathBuf};

pub fn execute(config_path: &Path, output: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)?;
    let output_dir = output.unwrap_or_else(|| config.output_dir.clone());

    let runtime = pipeline::runtime()?;
    let report = runtime.block_on(PortalScraper::new(&config).run())?;

    pipeline::print_report_summary(&report);
    println!();
    pipeline::save_report(&report, &output_dir)?;
    Ok(())
}
