//! Browser automation for scraping the change portal.
//!
//! [`PortalScraper`] launches Edge (or Chrome) with a persistent profile,
//! connects over the DevTools protocol and walks each portal view. The
//! scraping algorithms live in [`portal`] and only depend on its traits;
//! [`cdp`] implements those traits against a live page.

mod browser_finder;
mod cdp_session;
mod error;
mod launcher;
mod profile;
mod scrape;

pub mod cdp;
pub mod portal;

pub use browser_finder::BrowserFinder;
pub use cdp_session::{CdpSession, ConnectedBrowser};
pub use error::{Error, Result};
pub use launcher::BrowserLauncher;
pub use profile::ProfileManager;
pub use scrape::{PortalScraper, scrape_view, scrape_views};
