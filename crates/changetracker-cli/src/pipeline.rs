//! Steps shared by the commands: saving dumps, fetching the docs page and
//! publishing rows to SharePoint.

use anyhow::{Context, Result};
use changetracker_core::config::UploadTarget;
use changetracker_core::dump::{DumpWriter, dump_path, file_timestamp};
use changetracker_core::{AppConfig, Row, ScrapeReport, View, whats_new};
use changetracker_graph::{DeviceCodeAuth, GraphClient, GraphSession, UploadStats, upload_rows};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

/// Write one JSON dump per available view, all sharing one timestamp
pub fn save_report(report: &ScrapeReport, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    let timestamp = file_timestamp(&chrono::Local::now());
    let mut written = Vec::new();
    for (view, rows) in report.available() {
        let path = dump_path(dir, view, &timestamp);
        DumpWriter::to_file(rows, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!(
            "{} Saved {} {} rows to {}",
            style("✓").green(),
            rows.len(),
            view,
            path.display()
        );
        written.push(path);
    }
    Ok(written)
}

/// Download and parse the What's new documentation page
pub async fn fetch_whats_new(config: &AppConfig) -> Result<Vec<Row>> {
    let url = Url::parse(&config.http_scraping.whats_new_url)
        .context("Invalid httpScraping.whatsNewUrl")?;

    tracing::info!("Fetching {}", url);
    let client = reqwest::Client::builder()
        .user_agent(concat!("changetracker/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()?;
    let html = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let rows = whats_new::parse_rows(&html, Some(&url));
    tracing::info!("Parsed {} what's new entries", rows.len());
    Ok(rows)
}

/// Token cache lives beside the configuration file
pub fn token_cache_path(config_path: &Path) -> PathBuf {
    let dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    dir.join(changetracker_graph::TOKEN_CACHE_FILE)
}

/// Sign in (cached token, refresh token, then device code) and open a session
pub async fn authenticate(target: &UploadTarget, config_path: &Path) -> Result<GraphSession> {
    let auth = DeviceCodeAuth::new(&target.client_id, &target.tenant_id)?
        .with_cache_path(token_cache_path(config_path));

    let token = auth
        .acquire(|code| {
            println!();
            println!("{}", style("Sign-in required").bold().yellow());
            println!("  {}", code.instructions());
            println!();
        })
        .await
        .context("SharePoint authentication failed")?;

    println!("{} Authenticated with Microsoft Graph", style("✓").green());
    Ok(GraphSession::new(GraphClient::new(token)?))
}

/// Upload rows of one view into its configured list
///
/// Returns `None` when the list could not be used at all (no mapping,
/// unknown site or list); per-item failures are inside the stats.
pub async fn upload_view(
    session: &mut GraphSession,
    config: &AppConfig,
    site_url: &str,
    view: View,
    rows: &[Row],
) -> Option<UploadStats> {
    let Some(target) = config.list_target(view) else {
        tracing::warn!(
            "No SharePoint list mapping configured for {} - skipping upload",
            view
        );
        return None;
    };

    println!(
        "{} Uploading {} {} rows to list {}",
        style("→").cyan(),
        rows.len(),
        view,
        style(&target.name).bold()
    );

    let progress = ProgressBar::new(rows.len() as u64);
    if let Ok(bar_style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
    {
        progress.set_style(bar_style.progress_chars("█▓░"));
    }

    let result = upload_rows(session, site_url, target, rows, |stats| {
        progress.set_position(stats.processed() as u64);
        progress.set_message(stats.to_string());
    })
    .await;
    progress.finish_and_clear();

    match result {
        Ok(stats) => {
            println!("{} {}: {}", style("✓").green(), target.name, stats);
            Some(stats)
        }
        Err(e) => {
            println!("{} {}: {}", style("✗").red(), target.name, e);
            None
        }
    }
}

/// Upload every view in the report that has rows
pub async fn upload_report(
    session: &mut GraphSession,
    config: &AppConfig,
    site_url: &str,
    report: &ScrapeReport,
) -> UploadStats {
    let mut totals = UploadStats::default();
    for (view, rows) in report.available() {
        if rows.is_empty() {
            tracing::info!("No {} rows to upload", view);
            continue;
        }
        if let Some(stats) = upload_view(session, config, site_url, view, rows).await {
            totals.total += stats.total;
            totals.inserted += stats.inserted;
            totals.skipped += stats.skipped;
            totals.errors += stats.errors;
        }
    }
    totals
}

/// Print how many rows each view produced
pub fn print_report_summary(report: &ScrapeReport) {
    println!("\n{}", style("Scrape summary").bold().cyan());
    for view in View::ALL {
        match report.get(view) {
            Some(rows) => println!("  {:<22} {} rows", view.to_string(), rows.len()),
            None => println!("  {:<22} {}", view.to_string(), style("not scraped").dim()),
        }
    }
}
