use super::{ApplyState, ClickMode, TabHost};
use crate::{Error, Result};
use changetracker_core::TextMatch;
use changetracker_core::config::{DateFilter, Timeouts};
use std::time::Duration;
use tokio::time::{Instant, sleep};

const OPTION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Select a view tab and apply an optional date filter
///
/// Returns whether the tab was engaged. A filter that cannot be set is
/// logged and the view is scraped unfiltered.
pub async fn select_tab_and_filter<H>(
    host: &H,
    tab: &TextMatch,
    date_filter: Option<DateFilter>,
    timeouts: &Timeouts,
) -> bool
where
    H: TabHost + ?Sized,
{
    if !click_tab(host, tab, timeouts).await {
        return false;
    }

    if let Some(filter) = date_filter {
        if !set_date_range_filter(host, filter, timeouts).await {
            tracing::warn!("Could not set date range filter, continuing unfiltered");
        }
    }
    true
}

/// Click the first tab whose accessible name matches
pub async fn click_tab<H>(host: &H, tab: &TextMatch, timeouts: &Timeouts) -> bool
where
    H: TabHost + ?Sized,
{
    if host
        .wait_for_splash_hidden(ms(timeouts.splash_screen))
        .await
        .is_err()
    {
        tracing::debug!("Splash screen not found or already hidden");
    }

    match try_click_tab(host, tab, timeouts).await {
        Ok(clicked) => clicked,
        Err(e) => {
            tracing::warn!("Error clicking tab \"{}\": {}", tab, e);
            false
        }
    }
}

async fn try_click_tab<H>(host: &H, tab: &TextMatch, timeouts: &Timeouts) -> Result<bool>
where
    H: TabHost + ?Sized,
{
    let names = host.tab_names().await?;
    let Some(nth) = tab.position(&names) else {
        tracing::warn!("Tab \"{}\" not found among {:?}", tab, names);
        return Ok(false);
    };

    host.wait_for_tab_visible(nth, ms(timeouts.general_wait))
        .await?;

    let click = ms(timeouts.click);
    if let Err(e) = host.click_tab(nth, ClickMode::Normal, click).await {
        tracing::info!("Normal click failed, forcing click on tab \"{}\": {}", tab, e);
        host.click_tab(nth, ClickMode::Force, click).await?;
    }

    sleep(ms(timeouts.short_delay)).await;
    Ok(true)
}

/// Pick a date range in the filter menu and apply it
pub async fn set_date_range_filter<H>(host: &H, filter: DateFilter, timeouts: &Timeouts) -> bool
where
    H: TabHost + ?Sized,
{
    match try_set_filter(host, filter, timeouts).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Error setting date range filter to \"{}\": {}", filter, e);
            false
        }
    }
}

async fn try_set_filter<H>(host: &H, filter: DateFilter, timeouts: &Timeouts) -> Result<()>
where
    H: TabHost + ?Sized,
{
    let click = ms(timeouts.click);

    host.wait_for_filter_button(ms(timeouts.general_wait))
        .await?;
    host.click_filter_button(click).await?;
    tracing::debug!("Filter button clicked");

    sleep(ms(timeouts.menu_delay)).await;

    let nth = wait_for_option(host, &TextMatch::literal(filter.label()), click).await?;
    host.click_filter_option(nth, click).await?;
    tracing::info!("Selected filter option: {}", filter);

    sleep(ms(timeouts.menu_delay)).await;

    match host.apply_state().await? {
        ApplyState::Enabled => {
            host.click_apply(click).await?;
            tracing::debug!("Apply button clicked");
            sleep(ms(timeouts.short_delay)).await;
        }
        state => tracing::debug!("Apply skipped ({:?})", state),
    }
    Ok(())
}

/// Poll the filter menu until an option with the label is visible
async fn wait_for_option<H>(host: &H, label: &TextMatch, timeout: Duration) -> Result<usize>
where
    H: TabHost + ?Sized,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(nth) = label.position(&host.filter_option_labels().await?) {
            return Ok(nth);
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout {
                what: format!("filter option \"{}\"", label),
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        sleep(OPTION_POLL_INTERVAL).await;
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}
