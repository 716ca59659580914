use super::frame::{CdpFrame, Target, WaitState};
use super::scripts;
use crate::portal::{
    ApplyState, ClickMode, CloseAffordance, DetailHost, DetailSurface, ListView, RenderedRow,
    ScrollMetrics, SectionTarget, TabHost,
};
use crate::Result;
use async_trait::async_trait;
use changetracker_core::config::{Coordinates, Selectors};
use serde_json::json;
use std::time::Duration;

/// The portal page: the top-level frame hosting detail surfaces and the
/// embedded frame hosting the tabs and the list
pub struct CdpPortal<'a> {
    page: CdpFrame,
    list: CdpFrame,
    selectors: &'a Selectors,
}

impl<'a> CdpPortal<'a> {
    pub fn new(page: CdpFrame, list: CdpFrame, selectors: &'a Selectors) -> Self {
        Self {
            page,
            list,
            selectors,
        }
    }

    fn row_check(&self, row_index: u32) -> Target {
        Target::row_control(
            &self.selectors.details_row,
            row_index,
            &self.selectors.details_row_check,
        )
    }

    fn details_iframe(&self) -> Target {
        Target::css(&self.selectors.details_iframe)
    }

    fn close_button(&self) -> Target {
        Target::css(&self.selectors.close_button).last()
    }

    fn filter_button(&self) -> Target {
        Target::css(format!("{} button", self.selectors.filter_button_container))
    }

    fn filter_option(&self) -> Target {
        Target::css(format!("span{}", self.selectors.radio_label))
    }

    async fn scroll(&self, op: &str, step: u32) -> Result<ScrollMetrics> {
        self.list
            .run(
                scripts::SCROLL,
                &json!({
                    "selector": self.selectors.scrollable_container,
                    "op": op,
                    "step": step,
                }),
            )
            .await
    }
}

#[async_trait]
impl ListView for CdpPortal<'_> {
    async fn scroll_to_top(&self) -> Result<()> {
        self.scroll("top", 0).await.map(|_| ())
    }

    async fn rendered_rows(&self) -> Result<Vec<RenderedRow>> {
        self.list
            .run(
                scripts::LIST_ROWS,
                &json!({
                    "row": self.selectors.details_row,
                    "fields": self.selectors.details_row_fields,
                    "cell": self.selectors.details_row_cell,
                }),
            )
            .await
    }

    async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
        self.scroll("metrics", 0).await
    }

    async fn scroll_by(&self, step_px: u32) -> Result<()> {
        self.scroll("by", step_px).await.map(|_| ())
    }
}

#[async_trait]
impl TabHost for CdpPortal<'_> {
    async fn wait_for_splash_hidden(&self, timeout: Duration) -> Result<()> {
        self.list
            .wait_for(
                &Target::css(&self.selectors.splash_screen),
                WaitState::Hidden,
                timeout,
            )
            .await
    }

    async fn tab_names(&self) -> Result<Vec<String>> {
        self.list.names(&Target::role("tab")).await
    }

    async fn wait_for_tab_visible(&self, nth: usize, timeout: Duration) -> Result<()> {
        self.list
            .wait_for(&Target::role("tab").nth(nth), WaitState::Visible, timeout)
            .await
    }

    async fn click_tab(&self, nth: usize, mode: ClickMode, timeout: Duration) -> Result<()> {
        self.list
            .click(&Target::role("tab").nth(nth), mode, timeout)
            .await
    }

    async fn wait_for_filter_button(&self, timeout: Duration) -> Result<()> {
        self.list
            .wait_for(&self.filter_button(), WaitState::Visible, timeout)
            .await
    }

    async fn click_filter_button(&self, timeout: Duration) -> Result<()> {
        self.list
            .click(&self.filter_button(), ClickMode::Normal, timeout)
            .await
    }

    async fn filter_option_labels(&self) -> Result<Vec<String>> {
        self.list.texts(&self.filter_option()).await
    }

    async fn click_filter_option(&self, nth: usize, timeout: Duration) -> Result<()> {
        self.list
            .click(&self.filter_option().nth(nth), ClickMode::Normal, timeout)
            .await
    }

    async fn apply_state(&self) -> Result<ApplyState> {
        let probe = self
            .list
            .probe(&Target::css(&self.selectors.apply_button))
            .await?;
        Ok(if !probe.found {
            ApplyState::Absent
        } else if probe.enabled {
            ApplyState::Enabled
        } else {
            ApplyState::Disabled
        })
    }

    async fn click_apply(&self, timeout: Duration) -> Result<()> {
        self.list
            .click(
                &Target::css(&self.selectors.apply_button),
                ClickMode::Normal,
                timeout,
            )
            .await
    }
}

#[async_trait]
impl DetailHost for CdpPortal<'_> {
    type Surface = CdpSurface;

    async fn row_selected(&self, row_index: u32) -> Result<bool> {
        let checked = self
            .list
            .attribute(&self.row_check(row_index), "aria-checked")
            .await?;
        Ok(checked.as_deref() == Some("true"))
    }

    async fn toggle_row(&self, row_index: u32, timeout: Duration) -> Result<()> {
        self.list
            .click(&self.row_check(row_index), ClickMode::Normal, timeout)
            .await
    }

    async fn wait_for_surface(&self, timeout: Duration) -> Result<()> {
        self.page
            .wait_for(&self.details_iframe(), WaitState::AnyVisible, timeout)
            .await
    }

    async fn surfaces(&self) -> Result<Vec<CdpSurface>> {
        let frames = self
            .page
            .child_frames(&self.selectors.details_iframe)
            .await?;
        Ok(frames
            .into_iter()
            .map(|frame| CdpSurface {
                frame,
                progress_dots: self.selectors.progress_dots.clone(),
            })
            .collect())
    }

    async fn close_affordance(&self) -> Result<CloseAffordance> {
        let probe = self.page.probe(&self.close_button()).await?;
        Ok(CloseAffordance {
            present: probe.count > 0,
            visible: probe.visible,
        })
    }

    async fn click_close(&self, timeout: Duration) -> Result<()> {
        self.page
            .click(&self.close_button(), ClickMode::Normal, timeout)
            .await
    }

    async fn click_at(&self, point: Coordinates) -> Result<()> {
        self.page.click_at(point).await
    }

    async fn press_escape(&self) -> Result<()> {
        self.page.press_escape().await
    }

    async fn wait_for_surfaces_removed(&self, timeout: Duration) -> Result<()> {
        self.page
            .wait_for(&self.details_iframe(), WaitState::Detached, timeout)
            .await
    }

    async fn wait_for_last_surface_detached(&self, timeout: Duration) -> Result<()> {
        let target = self.details_iframe();
        let before = self.page.probe(&target).await?.count;
        if before == 0 {
            return Ok(());
        }
        self.page
            .wait_for_probe(&target, timeout, move |probe| probe.count < before)
            .await
    }
}

/// A detail surface rendered into its own frame
pub struct CdpSurface {
    frame: CdpFrame,
    progress_dots: String,
}

#[async_trait]
impl DetailSurface for CdpSurface {
    async fn is_detached(&self) -> bool {
        self.frame.is_detached().await
    }

    async fn wait_until_loaded(&self, progress_timeout: Duration) -> Result<()> {
        if let Err(e) = self
            .frame
            .wait_for(
                &Target::css(&self.progress_dots),
                WaitState::Hidden,
                progress_timeout,
            )
            .await
        {
            tracing::debug!("Progress indicator still showing: {}", e);
        }
        self.frame.wait_until_ready(progress_timeout).await
    }

    async fn headings(&self) -> Result<Vec<String>> {
        self.frame.run(scripts::HEADINGS, &json!({})).await
    }

    async fn section(&self, heading: usize, target: SectionTarget) -> Result<Option<String>> {
        let args = match target {
            SectionTarget::ParentText(tag) => {
                json!({ "heading": heading, "relation": "parent", "tag": tag, "attr": null })
            }
            SectionTarget::ParentAttr { tag, attr } => {
                json!({ "heading": heading, "relation": "parent", "tag": tag, "attr": attr })
            }
            SectionTarget::FollowingSiblingText(tag) => {
                json!({ "heading": heading, "relation": "following", "tag": tag, "attr": null })
            }
        };
        self.frame.run(scripts::SECTION, &args).await
    }
}
