use anyhow::Result;
use changetracker_core::{AppConfig, View};
use console::style;
use std::path::Path;

/// Validate the configuration file and print what a run would do
pub fn execute(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    println!(
        "{} {} is valid",
        style("✓").green(),
        style(config_path.display()).bold()
    );

    println!("\n{}", style("Portal").bold().cyan());
    println!("  URL:          {}", config.portal.url);
    println!(
        "  Date filter:  {}",
        config
            .date_filter
            .map(|f| f.label())
            .unwrap_or("none (portal default)")
    );
    println!("  Profile:      {}", config.portal.profile_dir.display());
    println!(
        "  Headless:     {}",
        if config.portal.headless { "yes" } else { "no" }
    );

    println!("\n{}", style("Views").bold().cyan());
    for view in View::ALL {
        let source = match config.browser_view(view) {
            Some(browser) => {
                let details = if browser.extract_details {
                    "with details"
                } else {
                    "rows only"
                };
                format!("tab {}, {}", browser.tab, details)
            }
            None if config.http_scraping.enabled => config.http_scraping.whats_new_url.clone(),
            None => "disabled".to_string(),
        };
        let list = match config.list_target(view) {
            Some(target) => format!("{} ({} mapped fields)", target.name, target.mapping.len()),
            None => format!("{} (no mapping)", config.list_name(view)),
        };
        println!("  {:<22} {}", view.to_string(), source);
        println!("  {:<22} {} {}", "", style("→").dim(), list);
    }

    println!("\n{}", style("Output").bold().cyan());
    match config.upload_target() {
        Some(target) => {
            println!("  SharePoint:   {}", target.site_url);
            println!("  Tenant:       {}", target.tenant_id);
        }
        None => println!(
            "  SharePoint:   {}",
            style("not configured - data saved locally only").yellow()
        ),
    }
    println!(
        "  Save to file: {} ({})",
        if config.save_to_file || config.upload_target().is_none() {
            "yes"
        } else {
            "no"
        },
        config.output_dir.display()
    );

    Ok(())
}
