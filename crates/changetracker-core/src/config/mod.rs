mod sections;

pub use sections::{
    BrowserScraping, BrowserView, Coordinates, HttpLists, HttpScraping, ListTarget, PortalConfig,
    ScraperConfig, Selectors, SharePointConfig, TextPatterns, Timeouts, WindowSize,
    DEFAULT_PORTAL_URL, DEFAULT_WHATS_NEW_URL,
};

use crate::{Error, Result, View};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Date ranges the portal's filter menu offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DateFilter {
    LastMonth,
    LastThreeMonths,
    LastSixMonths,
    LastYear,
}

impl DateFilter {
    pub const ALL: [DateFilter; 4] = [
        DateFilter::LastMonth,
        DateFilter::LastThreeMonths,
        DateFilter::LastSixMonths,
        DateFilter::LastYear,
    ];

    /// Label of the radio option in the filter menu
    pub fn label(&self) -> &'static str {
        match self {
            DateFilter::LastMonth => "Last 1 month",
            DateFilter::LastThreeMonths => "Last 3 months",
            DateFilter::LastSixMonths => "Last 6 months",
            DateFilter::LastYear => "Last 1 year",
        }
    }
}

impl fmt::Display for DateFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for DateFilter {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DateFilter::ALL
            .into_iter()
            .find(|f| f.label() == value)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "Invalid date filter \"{}\". Valid options: {}",
                    value,
                    DateFilter::ALL.map(|f| f.label()).join(", ")
                ))
            })
    }
}

impl From<DateFilter> for String {
    fn from(value: DateFilter) -> Self {
        value.label().to_string()
    }
}

/// Credentials and site needed to upload to SharePoint lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub client_id: String,
    pub tenant_id: String,
    pub site_url: String,
}

/// Validated application configuration
///
/// Built only through [`AppConfig::load`], [`AppConfig::from_json`] or
/// [`AppConfig::default`], so every instance has passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub date_filter: Option<DateFilter>,
    pub save_to_file: bool,
    pub output_dir: PathBuf,
    pub client_id: Option<String>,
    pub tenant_id: Option<String>,
    pub sharepoint: Option<SharePointConfig>,
    pub portal: PortalConfig,
    pub timeouts: Timeouts,
    pub selectors: Selectors,
    pub scraper_config: ScraperConfig,
    pub text_patterns: TextPatterns,
    pub browser_scraping: BrowserScraping,
    pub http_scraping: HttpScraping,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            date_filter: None,
            save_to_file: false,
            output_dir: PathBuf::from("."),
            client_id: None,
            tenant_id: None,
            sharepoint: None,
            portal: PortalConfig::default(),
            timeouts: Timeouts::default(),
            selectors: Selectors::default(),
            scraper_config: ScraperConfig::default(),
            text_patterns: TextPatterns::default(),
            browser_scraping: BrowserScraping::default(),
            http_scraping: HttpScraping::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        tracing::debug!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;

        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(
                "{} not found - using defaults, data will only be saved locally",
                path.display()
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse and validate configuration JSON
    pub fn from_json(content: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(content).map_err(|e| {
            if e.is_data() {
                Error::InvalidConfig(e.to_string())
            } else {
                Error::Parse(e)
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<()> {
        self.validate_auth()?;
        self.validate_scraper()?;

        for (key, selector) in self.selectors.entries() {
            if selector.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("selectors.{} is empty", key)));
            }
        }
        if self.portal.root_frame.trim().is_empty() {
            return Err(Error::InvalidConfig("portal.rootFrame is empty".to_string()));
        }

        parse_url("portal.url", &self.portal.url)?;
        if self.http_scraping.enabled {
            parse_url("httpScraping.whatsNewUrl", &self.http_scraping.whats_new_url)?;
        }

        for view in View::ALL {
            if let Some(target) = self.list_target(view) {
                if target.name.trim().is_empty() {
                    return Err(Error::InvalidConfig(format!(
                        "sharepointList.name for {} is empty",
                        view.key()
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_auth(&self) -> Result<()> {
        let client_id = non_blank(self.client_id.as_deref());
        let tenant_id = non_blank(self.tenant_id.as_deref());
        let site_url = non_blank(self.sharepoint.as_ref().map(|s| s.site_url.as_str()));

        match (client_id, tenant_id, site_url) {
            (None, None, None) => Ok(()),
            (Some(_), Some(_), Some(site)) => {
                let url = parse_url("sharepoint.siteUrl", site)?;
                if url.scheme() != "https" {
                    return Err(Error::InvalidConfig(format!(
                        "sharepoint.siteUrl must use https: {}",
                        site
                    )));
                }
                Ok(())
            }
            (client, tenant, site) => {
                let missing: Vec<&str> = [
                    ("clientId", client.is_none()),
                    ("tenantId", tenant.is_none()),
                    ("sharepoint.siteUrl", site.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();
                Err(Error::InvalidConfig(format!(
                    "Incomplete SharePoint settings, missing: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    fn validate_scraper(&self) -> Result<()> {
        let scraper = &self.scraper_config;
        if scraper.scroll_step_px == 0 {
            return Err(Error::InvalidConfig(
                "scraperConfig.scrollStepPx must be greater than 0".to_string(),
            ));
        }
        if scraper.max_idle_passes == 0 {
            return Err(Error::InvalidConfig(
                "scraperConfig.maxIdlePasses must be at least 1".to_string(),
            ));
        }
        if scraper.max_retry_attempts == 0 {
            return Err(Error::InvalidConfig(
                "scraperConfig.maxRetryAttempts must be at least 1".to_string(),
            ));
        }
        if scraper.total_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "scraperConfig.totalTimeoutMs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Upload settings, present only when every credential field is set
    pub fn upload_target(&self) -> Option<UploadTarget> {
        Some(UploadTarget {
            client_id: non_blank(self.client_id.as_deref())?.to_string(),
            tenant_id: non_blank(self.tenant_id.as_deref())?.to_string(),
            site_url: non_blank(self.sharepoint.as_ref().map(|s| s.site_url.as_str()))?
                .to_string(),
        })
    }

    /// Settings for a browser-scraped view
    pub fn browser_view(&self, view: View) -> Option<&BrowserView> {
        match view {
            View::Roadmap => Some(&self.browser_scraping.roadmap),
            View::ChangeAnnouncements => Some(&self.browser_scraping.change_announcements),
            View::WhatsNew => None,
        }
    }

    /// Destination list configured for a view
    pub fn list_target(&self, view: View) -> Option<&ListTarget> {
        match view {
            View::WhatsNew => self.http_scraping.sharepoint_list.whats_new.as_ref(),
            portal => self
                .browser_view(portal)
                .and_then(|v| v.sharepoint_list.as_ref()),
        }
    }

    /// Name of the destination list for a view
    pub fn list_name(&self, view: View) -> String {
        self.list_target(view)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| view.default_list_name().to_string())
    }

    /// Find the view whose destination list has this name (case-insensitive)
    pub fn view_for_list(&self, list_name: &str) -> Option<View> {
        View::ALL
            .into_iter()
            .find(|v| self.list_name(*v).eq_ignore_ascii_case(list_name))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| Error::InvalidConfig(format!("{} is not a valid URL ({}): {}", key, e, value)))
}
