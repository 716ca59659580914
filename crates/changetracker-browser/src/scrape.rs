use crate::cdp::{CdpFrame, CdpPortal, Target, WaitState};
use crate::portal::{
    DetailHost, ListView, ListWalker, RowDetailOrchestrator, TabHost, WalkOptions,
    select_tab_and_filter,
};
use crate::{BrowserFinder, BrowserLauncher, CdpSession, Error, ProfileManager, Result};
use changetracker_core::{AppConfig, Row, ScrapeReport, View};
use chromiumoxide::Page;
use std::process::{Child, ExitStatus};
use std::time::Duration;

/// Scrapes the portal views through a launched browser
pub struct PortalScraper<'a> {
    config: &'a AppConfig,
}

impl<'a> PortalScraper<'a> {
    pub fn new(config: &'a AppConfig) -> Self {
        Self { config }
    }

    /// Launch the browser, scrape every portal view and shut the browser down
    ///
    /// Fails only when the browser cannot be driven at all or the portal's
    /// root frame never becomes available.
    pub async fn run(&self) -> Result<ScrapeReport> {
        let portal = &self.config.portal;

        let binary = BrowserFinder::new(portal.chrome_path.clone()).find()?;
        let profile = ProfileManager::persistent(portal.profile_dir.clone())?;
        profile.clear_stale_locks();

        let launcher = BrowserLauncher::new(
            binary,
            profile.path().to_path_buf(),
            Some("about:blank".to_string()),
        )
        .with_debugging_port(portal.debugging_port)
        .with_window_size(portal.window_size)
        .headless(portal.headless);

        let mut child = launcher.launch()?;
        tracing::info!(
            "Browser launched (pid {}) with profile {}",
            child.id(),
            profile.path().display()
        );

        let result = match CdpSession::new(launcher.debugging_port()).connect().await {
            Ok(browser) => {
                let report = self.scrape_page(&browser.page).await;
                browser.close().await;
                report
            }
            Err(e) => Err(e),
        };

        stop_browser(&mut child);
        result
    }

    async fn scrape_page(&self, page: &Page) -> Result<ScrapeReport> {
        let portal = &self.config.portal;

        tracing::info!("Navigating to {}", portal.url);
        tokio::time::timeout(ms(portal.navigation_timeout_ms), page.goto(portal.url.as_str()))
            .await
            .map_err(|_| Error::Timeout {
                what: format!("navigation to {}", portal.url),
                timeout_ms: portal.navigation_timeout_ms,
            })??;

        let main = CdpFrame::main(page).await?;
        let list = self.root_frame(&main).await?;

        let selectors = &self.config.selectors;
        if list
            .wait_for(
                &Target::css(&selectors.splash_screen),
                WaitState::Hidden,
                ms(portal.initial_splash_timeout_ms),
            )
            .await
            .is_err()
        {
            tracing::debug!("Splash screen not found or already hidden");
        }
        if list
            .wait_for(
                &Target::css(&selectors.progress_dots),
                WaitState::Hidden,
                ms(portal.initial_progress_timeout_ms),
            )
            .await
            .is_err()
        {
            tracing::debug!("Progress indicator not found or already hidden");
        }

        let portal_page = CdpPortal::new(main, list, selectors);
        Ok(scrape_views(&portal_page, self.config).await)
    }

    /// The embedded frame hosting the list views; its absence is fatal
    async fn root_frame(&self, main: &CdpFrame) -> Result<CdpFrame> {
        let portal = &self.config.portal;
        let timeout = ms(portal.frame_timeout_ms);

        main.wait_for(&Target::css(&portal.root_frame), WaitState::Attached, timeout)
            .await
            .map_err(|e| Error::FrameUnavailable(format!("{} never attached: {}", portal.root_frame, e)))?;

        let frame = main
            .child_frames(&portal.root_frame)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::FrameUnavailable(format!("{} has no content frame", portal.root_frame))
            })?;

        frame.wait_until_ready(timeout).await.map_err(|e| {
            Error::FrameUnavailable(format!(
                "{} attached, but its content is not available: {}",
                portal.root_frame, e
            ))
        })?;

        tracing::info!("Portal frame ready");
        Ok(frame)
    }
}

/// Scrape every portal view in order
pub async fn scrape_views<P>(portal: &P, config: &AppConfig) -> ScrapeReport
where
    P: ListView + TabHost + DetailHost,
{
    let mut report = ScrapeReport::new();
    for view in View::PORTAL {
        let rows = scrape_view(portal, view, config).await;
        report.set(view, rows);
    }
    report
}

/// Scrape one view; `None` when its tab cannot be engaged
pub async fn scrape_view<P>(portal: &P, view: View, config: &AppConfig) -> Option<Vec<Row>>
where
    P: ListView + TabHost + DetailHost,
{
    let settings = config.browser_view(view)?;
    tracing::info!("Scraping {}", view);

    if !select_tab_and_filter(portal, &settings.tab, config.date_filter, &config.timeouts).await {
        tracing::warn!("Could not engage the {} tab", view);
        return None;
    }

    let orchestrator = RowDetailOrchestrator::new(portal, config);
    let options = WalkOptions::new(&config.scraper_config, settings.extract_details);
    let rows = ListWalker::new(portal, &orchestrator, options).walk().await;

    tracing::info!("Extracted {} items from {}", rows.len(), view);
    Some(rows)
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Kill the browser process and reap it
fn stop_browser(child: &mut Child) -> Option<ExitStatus> {
    if let Err(e) = child.kill() {
        tracing::debug!("Browser process already exited: {}", e);
    }
    match child.wait() {
        Ok(status) => {
            tracing::debug!("Browser process exited with {}", status);
            Some(status)
        }
        Err(e) => {
            tracing::debug!("Could not reap browser process: {}", e);
            None
        }
    }
}
