//! Portal scraping: tab selection, the virtualized list walk and per-row
//! detail extraction.
//!
//! The algorithms here only talk to the page through the traits below, so
//! they run unchanged against the CDP-backed implementation in
//! [`crate::cdp`] and against in-memory fakes in tests.

mod details;
mod pane;
mod tabs;
mod walker;

pub use details::RowDetailOrchestrator;
pub use pane::{extract_description, extract_overview, extract_url};
pub use tabs::{click_tab, select_tab_and_filter, set_date_range_filter};
pub use walker::{ListWalker, WalkOptions};

use crate::Result;
use async_trait::async_trait;
use changetracker_core::RowDetails;
use changetracker_core::config::Coordinates;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;

lazy_static! {
    static ref TRAILING_INDEX: Regex = Regex::new(r"-(\d+)$").unwrap();
}

/// Pixels short of the maximum scroll offset still counted as the bottom
pub const SCROLL_TOLERANCE_PX: f64 = 2.0;

/// One cell of a rendered list row
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedCell {
    /// The column's `data-automation-key`, if labeled
    pub key: Option<String>,
    pub text: String,
}

/// A list row as currently rendered by the virtualized container
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedRow {
    /// The row-position attribute (`data-item-index`)
    pub item_index: Option<String>,
    pub element_id: Option<String>,
    pub cells: Vec<RenderedCell>,
}

impl RenderedRow {
    /// The row's list index
    ///
    /// Read from the row-position attribute, or from trailing digits of the
    /// element id when the attribute is missing or empty.
    pub fn index(&self) -> Option<u32> {
        let raw = match self.item_index.as_deref().filter(|s| !s.is_empty()) {
            Some(attr) => attr,
            None => {
                let id = self.element_id.as_deref()?;
                TRAILING_INDEX.captures(id)?.get(1)?.as_str()
            }
        };
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok()
    }

    /// Column fields in DOM order, keyed by column key or `col{i}` for
    /// unlabeled cells
    pub fn fields(&self) -> Vec<(String, String)> {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let key = match cell.key.as_deref() {
                    Some(k) if !k.is_empty() => k.to_string(),
                    _ => format!("col{}", i),
                };
                (key, cell.text.trim().to_string())
            })
            .collect()
    }
}

/// Scroll state of the list container
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ScrollMetrics {
    pub top: f64,
    pub max: f64,
}

impl ScrollMetrics {
    pub fn at_bottom(&self) -> bool {
        self.top >= self.max - SCROLL_TOLERANCE_PX
    }
}

/// A scrollable, virtualized list
#[async_trait]
pub trait ListView: Send + Sync {
    async fn scroll_to_top(&self) -> Result<()>;

    /// Rows currently present in the render tree, in document order
    async fn rendered_rows(&self) -> Result<Vec<RenderedRow>>;

    async fn scroll_metrics(&self) -> Result<ScrollMetrics>;

    /// Advance the scroll offset by `step_px`, clamped to the maximum
    async fn scroll_by(&self, step_px: u32) -> Result<()>;
}

/// Produces the detail fields of one row; never fails
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn extract_row_details(&self, row_index: u32, row_title: &str) -> RowDetails;
}

/// Where a section's content sits relative to its landmark heading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionTarget {
    /// Inner text of the first `tag` under the heading's parent
    ParentText(&'static str),
    /// An attribute of the first `tag` under the heading's parent
    ParentAttr {
        tag: &'static str,
        attr: &'static str,
    },
    /// Inner text of the first following sibling `tag` of the heading
    FollowingSiblingText(&'static str),
}

/// An open detail surface
#[async_trait]
pub trait DetailSurface: Send + Sync {
    /// Whether the surface has been torn down
    async fn is_detached(&self) -> bool;

    /// Wait for the surface's progress indicator to clear and its document to load
    ///
    /// A progress indicator that never clears is tolerated; an error means
    /// the surface itself is unusable.
    async fn wait_until_loaded(&self, progress_timeout: Duration) -> Result<()>;

    /// Text of every section heading, in document order
    async fn headings(&self) -> Result<Vec<String>>;

    /// Read content relative to the heading at `heading` (an index into [`Self::headings`])
    async fn section(&self, heading: usize, target: SectionTarget) -> Result<Option<String>>;
}

/// Close affordance state on the page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloseAffordance {
    pub present: bool,
    pub visible: bool,
}

/// The page hosting the list rows and their detail surfaces
#[async_trait]
pub trait DetailHost: Send + Sync {
    type Surface: DetailSurface;

    /// Whether the row's selection control is checked
    async fn row_selected(&self, row_index: u32) -> Result<bool>;

    /// Click the row's selection control
    async fn toggle_row(&self, row_index: u32, timeout: Duration) -> Result<()>;

    /// Wait until at least one visible detail surface is attached
    async fn wait_for_surface(&self, timeout: Duration) -> Result<()>;

    /// Every detail surface currently attached, in document order
    async fn surfaces(&self) -> Result<Vec<Self::Surface>>;

    /// State of the last close affordance on the page
    async fn close_affordance(&self) -> Result<CloseAffordance>;

    /// Click the last close affordance
    async fn click_close(&self, timeout: Duration) -> Result<()>;

    /// Dispatch a mouse click at a viewport point
    async fn click_at(&self, point: Coordinates) -> Result<()>;

    async fn press_escape(&self) -> Result<()>;

    /// Wait until no detail surface remains in the render tree
    async fn wait_for_surfaces_removed(&self, timeout: Duration) -> Result<()>;

    /// Wait until the most recent detail surface is detached
    async fn wait_for_last_surface_detached(&self, timeout: Duration) -> Result<()>;
}

/// Apply control state in the filter menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyState {
    Absent,
    Disabled,
    Enabled,
}

/// How a click is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickMode {
    /// Real pointer click at the element's center; fails if another element
    /// would receive it
    Normal,
    /// Dispatch the click on the element directly, skipping hit testing
    Force,
}

/// The frame hosting the view tabs and the date filter menu
#[async_trait]
pub trait TabHost: Send + Sync {
    async fn wait_for_splash_hidden(&self, timeout: Duration) -> Result<()>;

    /// Accessible names of every tab, in document order
    async fn tab_names(&self) -> Result<Vec<String>>;

    async fn wait_for_tab_visible(&self, nth: usize, timeout: Duration) -> Result<()>;

    async fn click_tab(&self, nth: usize, mode: ClickMode, timeout: Duration) -> Result<()>;

    async fn wait_for_filter_button(&self, timeout: Duration) -> Result<()>;

    async fn click_filter_button(&self, timeout: Duration) -> Result<()>;

    /// Labels of the radio options currently visible in the filter menu
    async fn filter_option_labels(&self) -> Result<Vec<String>>;

    async fn click_filter_option(&self, nth: usize, timeout: Duration) -> Result<()>;

    async fn apply_state(&self) -> Result<ApplyState>;

    async fn click_apply(&self, timeout: Duration) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(item_index: Option<&str>, element_id: Option<&str>) -> RenderedRow {
        RenderedRow {
            item_index: item_index.map(str::to_string),
            element_id: element_id.map(str::to_string),
            cells: vec![],
        }
    }

    #[test]
    fn test_index_prefers_position_attribute() {
        assert_eq!(row(Some("7"), Some("row-12")).index(), Some(7));
    }

    #[test]
    fn test_index_falls_back_to_id_digits() {
        assert_eq!(row(None, Some("ms-DetailsRow-42")).index(), Some(42));
        assert_eq!(row(Some(""), Some("row-3")).index(), Some(3));
        assert_eq!(row(None, Some("row-3a")).index(), None);
        assert_eq!(row(None, None).index(), None);
    }

    #[test]
    fn test_non_numeric_attribute_is_not_an_index() {
        assert_eq!(row(Some("x1"), Some("row-5")).index(), None);
        assert_eq!(row(Some("-1"), None).index(), None);
    }

    #[test]
    fn test_fields_use_positional_fallback() {
        let rendered = RenderedRow {
            item_index: Some("0".to_string()),
            element_id: None,
            cells: vec![
                RenderedCell {
                    key: Some("title".to_string()),
                    text: "  Passkeys \n".to_string(),
                },
                RenderedCell {
                    key: None,
                    text: "GA".to_string(),
                },
                RenderedCell {
                    key: Some(String::new()),
                    text: " 2025 ".to_string(),
                },
            ],
        };
        assert_eq!(
            rendered.fields(),
            vec![
                ("title".to_string(), "Passkeys".to_string()),
                ("col1".to_string(), "GA".to_string()),
                ("col2".to_string(), "2025".to_string()),
            ]
        );
    }

    #[test]
    fn test_bottom_tolerance() {
        assert!(ScrollMetrics { top: 998.5, max: 1000.0 }.at_bottom());
        assert!(!ScrollMetrics { top: 990.0, max: 1000.0 }.at_bottom());
        assert!(ScrollMetrics { top: 0.0, max: 0.0 }.at_bottom());
    }
}
