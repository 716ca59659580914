use super::{DetailHost, DetailSource, DetailSurface, pane};
use crate::Result;
use async_trait::async_trait;
use changetracker_core::config::{Coordinates, TextPatterns, Timeouts};
use changetracker_core::{AppConfig, RowDetails, TextMatch};
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Drives one row's detail surface through open, locate, extract and close
///
/// Only one surface is expected to be open at a time, so rows must be fed in
/// sequence. Every failure degrades to empty fields.
pub struct RowDetailOrchestrator<'a, H: DetailHost> {
    host: &'a H,
    timeouts: &'a Timeouts,
    patterns: &'a TextPatterns,
    click_outside: Coordinates,
}

impl<'a, H: DetailHost> RowDetailOrchestrator<'a, H> {
    pub fn new(host: &'a H, config: &'a AppConfig) -> Self {
        Self {
            host,
            timeouts: &config.timeouts,
            patterns: &config.text_patterns,
            click_outside: config.scraper_config.click_outside_coords,
        }
    }

    async fn extract(&self, row_index: u32, row_title: &str) -> Result<RowDetails> {
        self.open(row_index).await?;

        let Some(surface) = self.find_surface(row_title, row_index).await? else {
            tracing::warn!("Details frame not available for row {}", row_index);
            self.close(row_index).await;
            return Ok(RowDetails::empty());
        };

        let details = RowDetails {
            overview: pane::extract_overview(&surface, self.patterns, row_index).await,
            url: pane::extract_url(&surface, self.patterns, row_index).await,
            description: pane::extract_description(&surface, self.patterns, row_index).await,
        };

        self.close(row_index).await;
        Ok(details.trimmed())
    }

    /// Select the row so a fresh surface renders, deselecting it first if needed
    async fn open(&self, row_index: u32) -> Result<()> {
        let click = ms(self.timeouts.click);
        if self.host.row_selected(row_index).await? {
            self.host.toggle_row(row_index, click).await?;
            sleep(ms(self.timeouts.checkbox_delay)).await;
        }
        self.host.toggle_row(row_index, click).await?;
        self.host
            .wait_for_surface(ms(self.timeouts.general_wait))
            .await
    }

    /// First attached surface whose headings mention the row title
    async fn find_surface(&self, row_title: &str, row_index: u32) -> Result<Option<H::Surface>> {
        let title = (!row_title.trim().is_empty()).then(|| TextMatch::literal(row_title));

        for surface in self.host.surfaces().await? {
            if let Err(e) = surface
                .wait_until_loaded(ms(self.timeouts.progress_dots))
                .await
            {
                tracing::debug!("Skipping detail surface for row {}: {}", row_index, e);
                continue;
            }

            let Some(title) = &title else {
                return Ok(Some(surface));
            };
            match surface.headings().await {
                Ok(headings) if title.position(&headings).is_some() => return Ok(Some(surface)),
                Ok(_) => {}
                Err(e) => tracing::debug!("Skipping detail surface for row {}: {}", row_index, e),
            }
        }

        tracing::warn!(
            "Could not find detail surface with matching title for row {}",
            row_index
        );
        Ok(None)
    }

    /// Close the open surface: close affordance or outside click, then Escape
    async fn close(&self, row_index: u32) {
        let primary: Result<()> = async {
            let affordance = self.host.close_affordance().await?;
            if affordance.present && affordance.visible {
                self.host
                    .click_close(ms(self.timeouts.button_close))
                    .await?;
            } else {
                self.host.click_at(self.click_outside).await?;
            }
            self.host
                .wait_for_surfaces_removed(ms(self.timeouts.close_pane))
                .await
        }
        .await;

        let Err(e) = primary else {
            return;
        };
        tracing::warn!(
            "Could not close details pane with button/click for row {}, trying Escape: {}",
            row_index,
            e
        );

        let escaped: Result<()> = async {
            self.host.press_escape().await?;
            self.host
                .wait_for_surfaces_removed(ms(self.timeouts.close_pane))
                .await
        }
        .await;
        if escaped.is_err() {
            tracing::warn!(
                "Details frame did not detach for row {}, continuing anyway",
                row_index
            );
        }
    }

    /// Best-effort close after a failed extraction
    async fn close_after_error(&self, row_index: u32) {
        let result: Result<()> = async {
            if self.host.close_affordance().await?.present {
                self.host.click_close(ms(self.timeouts.close_pane)).await?;
            } else {
                self.host.click_at(self.click_outside).await?;
            }
            self.host
                .wait_for_last_surface_detached(ms(self.timeouts.detach))
                .await
        }
        .await;

        if let Err(e) = result {
            tracing::debug!("Cleanup after failed extraction of row {}: {}", row_index, e);
        }
    }
}

#[async_trait]
impl<H: DetailHost> DetailSource for RowDetailOrchestrator<'_, H> {
    async fn extract_row_details(&self, row_index: u32, row_title: &str) -> RowDetails {
        let started = Instant::now();
        tracing::info!("START extracting details for row {}", row_index);

        match self.extract(row_index, row_title).await {
            Ok(details) => {
                tracing::info!(
                    "END extracting details for row {} (took {}ms)",
                    row_index,
                    started.elapsed().as_millis()
                );
                details
            }
            Err(e) => {
                tracing::warn!(
                    "ERROR extracting details for row {} (took {}ms): {}",
                    row_index,
                    started.elapsed().as_millis(),
                    e
                );
                self.close_after_error(row_index).await;
                RowDetails::empty()
            }
        }
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
