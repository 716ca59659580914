use crate::TextMatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Portal page the browser scrape starts from
pub const DEFAULT_PORTAL_URL: &str =
    "https://entra.microsoft.com/#blade/Microsoft_AAD_IAM/ChangeManagementHubList.ReactView";

/// Documentation page listing what's new
pub const DEFAULT_WHATS_NEW_URL: &str =
    "https://learn.microsoft.com/en-us/entra/fundamentals/whats-new";

/// Browser and portal entry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PortalConfig {
    pub url: String,
    /// Selector for the embedded frame hosting the list views
    pub root_frame: String,
    pub navigation_timeout_ms: u64,
    pub frame_timeout_ms: u64,
    pub initial_splash_timeout_ms: u64,
    pub initial_progress_timeout_ms: u64,
    pub chrome_path: Option<PathBuf>,
    pub profile_dir: PathBuf,
    pub headless: bool,
    pub debugging_port: u16,
    pub window_size: WindowSize,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_PORTAL_URL.to_string(),
            root_frame: r#"iframe[name="ChangeManagementHubList.ReactView"]"#.to_string(),
            navigation_timeout_ms: 60_000,
            frame_timeout_ms: 30_000,
            initial_splash_timeout_ms: 60_000,
            initial_progress_timeout_ms: 15_000,
            chrome_path: None,
            profile_dir: PathBuf::from("edge-profile"),
            headless: false,
            debugging_port: 9222,
            window_size: WindowSize::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Per-interaction wait ceilings and fixed delays, in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
    pub splash_screen: u64,
    pub progress_dots: u64,
    pub general_wait: u64,
    pub click: u64,
    pub detach: u64,
    pub close_pane: u64,
    pub button_close: u64,
    pub short_delay: u64,
    pub menu_delay: u64,
    pub checkbox_delay: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            splash_screen: 30_000,
            progress_dots: 15_000,
            general_wait: 10_000,
            click: 5_000,
            detach: 5_000,
            close_pane: 5_000,
            button_close: 3_000,
            short_delay: 1_000,
            menu_delay: 500,
            checkbox_delay: 300,
        }
    }
}

/// CSS selectors for the portal's list and detail markup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Selectors {
    pub splash_screen: String,
    pub details_iframe: String,
    pub details_row: String,
    pub details_row_check: String,
    pub details_row_fields: String,
    pub details_row_cell: String,
    pub progress_dots: String,
    pub close_button: String,
    pub scrollable_container: String,
    pub filter_button_container: String,
    pub apply_button: String,
    pub radio_label: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            splash_screen: ".fxs-splashscreen".to_string(),
            details_iframe: "iframe.fxs-part-frame".to_string(),
            details_row: "div.ms-DetailsRow".to_string(),
            details_row_check: r#"[data-automationid="DetailsRowCheck"]"#.to_string(),
            details_row_fields: r#"[data-automationid="DetailsRowFields"]"#.to_string(),
            details_row_cell: r#"[data-automationid="DetailsRowCell"]"#.to_string(),
            progress_dots: "div.fxs-progress-dots".to_string(),
            close_button: r#"button[aria-label="Close"]"#.to_string(),
            scrollable_container: r#"[data-is-scrollable="true"]"#.to_string(),
            filter_button_container: r#"div[data-selection-index="1"]"#.to_string(),
            apply_button: r#"button[aria-label="Apply"]"#.to_string(),
            radio_label: ".ms-ChoiceFieldLabel".to_string(),
        }
    }
}

impl Selectors {
    /// Every selector with its configuration key
    pub fn entries(&self) -> [(&'static str, &str); 12] {
        [
            ("splashScreen", &self.splash_screen),
            ("detailsIframe", &self.details_iframe),
            ("detailsRow", &self.details_row),
            ("detailsRowCheck", &self.details_row_check),
            ("detailsRowFields", &self.details_row_fields),
            ("detailsRowCell", &self.details_row_cell),
            ("progressDots", &self.progress_dots),
            ("closeButton", &self.close_button),
            ("scrollableContainer", &self.scrollable_container),
            ("filterButtonContainer", &self.filter_button_container),
            ("applyButton", &self.apply_button),
            ("radioLabel", &self.radio_label),
        ]
    }
}

/// Tunables for the virtualized list walk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScraperConfig {
    pub scroll_step_px: u32,
    pub pass_delay_ms: u64,
    pub max_idle_passes: u32,
    pub total_timeout_ms: u64,
    pub max_retry_attempts: u32,
    pub click_outside_coords: Coordinates,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            scroll_step_px: 400,
            pass_delay_ms: 600,
            max_idle_passes: 3,
            total_timeout_ms: 600_000,
            max_retry_attempts: 3,
            click_outside_coords: Coordinates { x: 100.0, y: 100.0 },
        }
    }
}

/// Viewport point, in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// Heading landmarks used to find sections of a detail surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TextPatterns {
    pub overview: TextMatch,
    pub next_steps: TextMatch,
    pub what_is_changing: TextMatch,
    pub roadmap_description: TextMatch,
}

impl Default for TextPatterns {
    fn default() -> Self {
        Self {
            overview: TextMatch::literal("Overview"),
            next_steps: TextMatch::literal("Next steps"),
            what_is_changing: TextMatch::literal("What is changing"),
            roadmap_description: TextMatch::literal("Here's what you will see in this release:"),
        }
    }
}

/// Destination list for one view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTarget {
    pub name: String,
    /// SharePoint internal field name → record key
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,
    /// Field compared together with Title to detect duplicates
    #[serde(default)]
    pub date_field: Option<String>,
}

/// One browser-scraped view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserView {
    pub tab: TextMatch,
    #[serde(default = "default_true")]
    pub extract_details: bool,
    #[serde(default)]
    pub sharepoint_list: Option<ListTarget>,
}

impl BrowserView {
    fn with_tab(tab: &str) -> Self {
        Self {
            tab: TextMatch::parse(tab).unwrap_or_else(|_| TextMatch::literal(tab)),
            extract_details: true,
            sharepoint_list: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserScraping {
    pub roadmap: BrowserView,
    pub change_announcements: BrowserView,
}

impl Default for BrowserScraping {
    fn default() -> Self {
        Self {
            roadmap: BrowserView::with_tab("/^Roadmap$/i"),
            change_announcements: BrowserView::with_tab("/^Change announcements$/i"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpLists {
    pub whats_new: Option<ListTarget>,
}

/// The documentation page scraped over plain HTTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpScraping {
    pub enabled: bool,
    pub whats_new_url: String,
    pub sharepoint_list: HttpLists,
}

impl Default for HttpScraping {
    fn default() -> Self {
        Self {
            enabled: true,
            whats_new_url: DEFAULT_WHATS_NEW_URL.to_string(),
            sharepoint_list: HttpLists::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharePointConfig {
    pub site_url: String,
}

fn default_true() -> bool {
    true
}
