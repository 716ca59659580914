use super::{DetailSource, ListView};
use changetracker_core::config::ScraperConfig;
use changetracker_core::{Row, RowDetails};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Tunables for one list walk
#[derive(Debug, Clone)]
pub struct WalkOptions {
    pub scroll_step_px: u32,
    pub pass_delay: Duration,
    pub max_idle_passes: u32,
    pub total_timeout: Duration,
    pub max_retry_attempts: u32,
    pub extract_details: bool,
}

impl WalkOptions {
    pub fn new(config: &ScraperConfig, extract_details: bool) -> Self {
        Self {
            scroll_step_px: config.scroll_step_px,
            pass_delay: Duration::from_millis(config.pass_delay_ms),
            max_idle_passes: config.max_idle_passes,
            total_timeout: Duration::from_millis(config.total_timeout_ms),
            max_retry_attempts: config.max_retry_attempts.max(1),
            extract_details,
        }
    }
}

/// Enumerates every row of a virtualized list by scrolling it
///
/// A walk ends when the container sits at its maximum offset and
/// `max_idle_passes` consecutive passes found no unseen row, or when
/// `total_timeout` elapses. The deadline is checked before every pass and
/// before every newly seen row, so the overrun is bounded by one detail
/// extraction (with its retries). A timed-out walk returns what it collected.
pub struct ListWalker<'a, L: ?Sized, D: ?Sized> {
    list: &'a L,
    details: &'a D,
    options: WalkOptions,
}

impl<'a, L, D> ListWalker<'a, L, D>
where
    L: ListView + ?Sized,
    D: DetailSource + ?Sized,
{
    pub fn new(list: &'a L, details: &'a D, options: WalkOptions) -> Self {
        Self {
            list,
            details,
            options,
        }
    }

    /// Walk the list once, returning rows in discovery order with unique indices
    pub async fn walk(&self) -> Vec<Row> {
        let started = Instant::now();
        let mut rows = Vec::new();
        let mut seen = HashSet::new();
        let mut idle_passes = 0u32;

        if let Err(e) = self.list.scroll_to_top().await {
            tracing::warn!("Could not reset list scroll position: {}", e);
        }
        sleep(self.options.pass_delay).await;

        loop {
            if self.deadline_passed(started) {
                self.log_timeout(rows.len());
                break;
            }

            let rendered = match self.list.rendered_rows().await {
                Ok(rendered) => rendered,
                Err(e) => {
                    tracing::warn!("Could not read rendered rows, stopping walk: {}", e);
                    break;
                }
            };

            let mut found_new = false;
            let mut timed_out = false;
            for rendered_row in rendered {
                let Some(index) = rendered_row.index() else {
                    continue;
                };
                if seen.contains(&index) {
                    continue;
                }
                if self.deadline_passed(started) {
                    timed_out = true;
                    break;
                }
                seen.insert(index);
                found_new = true;

                let mut row = Row::new(index, rendered_row.fields());
                if self.options.extract_details {
                    let details = self.details_with_retry(index, row.title()).await;
                    row.attach_details(details);
                }
                rows.push(row);
            }

            if timed_out {
                self.log_timeout(rows.len());
                break;
            }

            if found_new {
                idle_passes = 0;
            } else {
                idle_passes += 1;
            }

            let at_bottom = match self.list.scroll_metrics().await {
                Ok(metrics) => metrics.at_bottom(),
                Err(e) => {
                    tracing::warn!("Could not read scroll position, stopping walk: {}", e);
                    break;
                }
            };

            if at_bottom && idle_passes >= self.options.max_idle_passes {
                tracing::info!("Reached bottom of list and stabilized");
                break;
            }

            if let Err(e) = self.list.scroll_by(self.options.scroll_step_px).await {
                tracing::warn!("Could not scroll list, stopping walk: {}", e);
                break;
            }
            sleep(self.options.pass_delay).await;
        }

        tracing::info!("Collected {} unique rows", rows.len());
        rows
    }

    fn deadline_passed(&self, started: Instant) -> bool {
        started.elapsed() > self.options.total_timeout
    }

    fn log_timeout(&self, collected: usize) {
        tracing::warn!(
            "List walk timed out after {}ms; returning {} accumulated rows",
            self.options.total_timeout.as_millis(),
            collected
        );
    }

    /// Extract a row's details, retrying while the description comes back empty
    async fn details_with_retry(&self, index: u32, title: &str) -> RowDetails {
        let attempts = self.options.max_retry_attempts;
        let mut details = RowDetails::empty();

        for attempt in 1..=attempts {
            details = self.details.extract_row_details(index, title).await;
            if !details.description.is_empty() {
                break;
            }
            if attempt < attempts {
                tracing::info!(
                    "Empty description for row {}, retrying (attempt {}/{})",
                    index,
                    attempt,
                    attempts
                );
            } else {
                tracing::warn!(
                    "Empty description for row {} after {} attempts",
                    index,
                    attempts
                );
            }
        }
        details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::{RenderedCell, RenderedRow, ScrollMetrics};
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const ROW_HEIGHT: f64 = 40.0;

    /// A virtualized list that renders a window of rows around the scroll offset
    struct FakeList {
        total_rows: u32,
        window: u32,
        viewport: f64,
        state: Mutex<ListState>,
    }

    #[derive(Default)]
    struct ListState {
        top: f64,
        scans: u32,
        /// Extra rows that appear after this many scans at the bottom
        late_rows: Option<(u32, u32)>,
    }

    impl FakeList {
        fn new(total_rows: u32, window: u32) -> Self {
            Self {
                total_rows,
                window,
                viewport: window as f64 * ROW_HEIGHT,
                state: Mutex::new(ListState::default()),
            }
        }

        fn rows_in_view(&self) -> u32 {
            let state = self.state.lock().unwrap();
            match state.late_rows {
                Some((after, extra)) if state.scans > after => self.total_rows + extra,
                _ => self.total_rows,
            }
        }

        fn max(&self) -> f64 {
            (self.total_rows as f64 * ROW_HEIGHT - self.viewport).max(0.0)
        }

        fn scans(&self) -> u32 {
            self.state.lock().unwrap().scans
        }
    }

    fn rendered(index: u32) -> RenderedRow {
        RenderedRow {
            item_index: Some(index.to_string()),
            element_id: None,
            cells: vec![
                RenderedCell {
                    key: Some("title".to_string()),
                    text: format!(" Item {} ", index),
                },
                RenderedCell {
                    key: None,
                    text: "GA".to_string(),
                },
            ],
        }
    }

    #[async_trait]
    impl ListView for FakeList {
        async fn scroll_to_top(&self) -> Result<()> {
            self.state.lock().unwrap().top = 0.0;
            Ok(())
        }

        async fn rendered_rows(&self) -> Result<Vec<RenderedRow>> {
            let total = self.rows_in_view();
            let mut state = self.state.lock().unwrap();
            state.scans += 1;
            let first = (state.top / ROW_HEIGHT) as u32;
            let last = (first + self.window).min(total);
            let mut rows: Vec<RenderedRow> = (first..last).map(rendered).collect();
            // Virtualized lists keep a header row without an index
            rows.push(RenderedRow::default());
            Ok(rows)
        }

        async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
            Ok(ScrollMetrics {
                top: self.state.lock().unwrap().top,
                max: self.max(),
            })
        }

        async fn scroll_by(&self, step_px: u32) -> Result<()> {
            let max = self.max();
            let mut state = self.state.lock().unwrap();
            state.top = (state.top + step_px as f64).min(max);
            Ok(())
        }
    }

    /// Detail source returning an empty description for the first `k` calls per row
    struct FlakyDetails {
        empty_attempts: u32,
        calls: Mutex<HashMap<u32, u32>>,
    }

    impl FlakyDetails {
        fn new(empty_attempts: u32) -> Self {
            Self {
                empty_attempts,
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, index: u32) -> u32 {
            self.calls.lock().unwrap().get(&index).copied().unwrap_or(0)
        }

        fn total_calls(&self) -> u32 {
            self.calls.lock().unwrap().values().sum()
        }
    }

    #[async_trait]
    impl DetailSource for FlakyDetails {
        async fn extract_row_details(&self, row_index: u32, row_title: &str) -> RowDetails {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(row_index).or_insert(0);
            *count += 1;
            let description = if *count > self.empty_attempts {
                format!("About {}", row_title)
            } else {
                String::new()
            };
            RowDetails {
                url: format!("https://example.com/{}", row_index),
                description,
                overview: format!("Overview {}", row_index),
            }
        }
    }

    fn options(extract_details: bool) -> WalkOptions {
        WalkOptions::new(&ScraperConfig::default(), extract_details)
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_visible_rows_with_details() {
        let list = FakeList::new(3, 10);
        let details = FlakyDetails::new(0);

        let rows = ListWalker::new(&list, &details, options(true)).walk().await;

        assert_eq!(rows.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1, 2]);
        for row in &rows {
            assert_eq!(row.title(), format!("Item {}", row.index));
            assert_eq!(row.fields["col1"], "GA");
            assert_eq!(row.url, format!("https://example.com/{}", row.index));
            assert_eq!(row.description, format!("About Item {}", row.index));
            assert_eq!(row.overview, format!("Overview {}", row.index));
        }
        assert_eq!(details.total_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_details_fields_stay_empty() {
        let list = FakeList::new(3, 10);
        let details = FlakyDetails::new(0);

        let rows = ListWalker::new(&list, &details, options(false)).walk().await;

        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert!(!row.fields.is_empty());
            assert_eq!(row.url, "");
            assert_eq!(row.description, "");
            assert_eq!(row.overview, "");
        }
        assert_eq!(details.total_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scrolling_collects_unique_rows() {
        // Windows overlap as the list scrolls by 400px (10 rows) over a 25-row view
        let list = FakeList::new(120, 25);
        let details = FlakyDetails::new(0);

        let rows = ListWalker::new(&list, &details, options(false)).walk().await;

        let indices: Vec<u32> = rows.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..120).collect::<Vec<_>>());
        let unique: HashSet<u32> = indices.iter().copied().collect();
        assert_eq!(unique.len(), indices.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_after_exactly_max_idle_passes_at_bottom() {
        let list = FakeList::new(3, 10);
        let details = FlakyDetails::new(0);
        let options = WalkOptions {
            max_idle_passes: 4,
            ..options(false)
        };

        ListWalker::new(&list, &details, options).walk().await;

        // One productive pass, then exactly four idle ones
        assert_eq!(list.scans(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_rendered_rows_reset_idle_counter() {
        let list = FakeList::new(3, 10);
        list.state.lock().unwrap().late_rows = Some((2, 2));
        let details = FlakyDetails::new(0);

        let rows = ListWalker::new(&list, &details, options(false)).walk().await;

        assert_eq!(rows.len(), 5);
        // Productive, idle, idle, productive, then three idle passes
        assert_eq!(list.scans(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_description_found() {
        let list = FakeList::new(1, 10);
        let details = FlakyDetails::new(2);

        let rows = ListWalker::new(&list, &details, options(true)).walk().await;

        assert_eq!(rows[0].description, "About Item 0");
        assert_eq!(details.calls(0), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_keeps_empty_description() {
        let list = FakeList::new(2, 10);
        let details = FlakyDetails::new(u32::MAX);

        let rows = ListWalker::new(&list, &details, options(true)).walk().await;

        assert_eq!(details.calls(0), 3);
        assert_eq!(details.calls(1), 3);
        assert_eq!(rows[0].description, "");
        assert_eq!(rows[0].url, "https://example.com/0");
    }

    /// A list that keeps rendering new rows forever
    struct EndlessList {
        next: Mutex<u32>,
    }

    #[async_trait]
    impl ListView for EndlessList {
        async fn scroll_to_top(&self) -> Result<()> {
            Ok(())
        }

        async fn rendered_rows(&self) -> Result<Vec<RenderedRow>> {
            let mut next = self.next.lock().unwrap();
            *next += 1;
            Ok(vec![rendered(*next)])
        }

        async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
            Ok(ScrollMetrics { top: 0.0, max: 1e9 })
        }

        async fn scroll_by(&self, _step_px: u32) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_returns_partial_rows() {
        let list = EndlessList {
            next: Mutex::new(0),
        };
        let details = FlakyDetails::new(0);
        let options = WalkOptions {
            total_timeout: Duration::from_millis(6_300),
            ..options(false)
        };

        let started = Instant::now();
        let rows = ListWalker::new(&list, &details, options).walk().await;

        assert!(started.elapsed() < Duration::from_millis(6_300 + 600));
        // 600ms settle plus one pass every 600ms
        assert_eq!(rows.len(), 10);
    }

    /// Detail source that takes a fixed time per extraction
    struct SlowDetails {
        delay: Duration,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl DetailSource for SlowDetails {
        async fn extract_row_details(&self, row_index: u32, _row_title: &str) -> RowDetails {
            *self.calls.lock().unwrap() += 1;
            sleep(self.delay).await;
            RowDetails {
                url: String::new(),
                description: format!("Row {}", row_index),
                overview: String::new(),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_checked_between_rows_of_one_pass() {
        // Every row renders in the first pass; each extraction takes a second
        let list = FakeList::new(20, 25);
        let details = SlowDetails {
            delay: Duration::from_secs(1),
            calls: Mutex::new(0),
        };
        let options = WalkOptions {
            total_timeout: Duration::from_millis(2_500),
            ..options(true)
        };

        let started = Instant::now();
        let rows = ListWalker::new(&list, &details, options).walk().await;

        // Extractions run 0.6s-1.6s and 1.6s-2.6s, then the deadline stops the pass
        assert_eq!(rows.iter().map(|r| r.index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(*details.calls.lock().unwrap(), 2);
        assert!(started.elapsed() < Duration::from_millis(2_700));
        assert_eq!(list.scans(), 1);
    }

    struct BrokenList;

    #[async_trait]
    impl ListView for BrokenList {
        async fn scroll_to_top(&self) -> Result<()> {
            Err(Error::FrameDetached)
        }

        async fn rendered_rows(&self) -> Result<Vec<RenderedRow>> {
            Err(Error::FrameDetached)
        }

        async fn scroll_metrics(&self) -> Result<ScrollMetrics> {
            Err(Error::FrameDetached)
        }

        async fn scroll_by(&self, _step_px: u32) -> Result<()> {
            Err(Error::FrameDetached)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_errors_end_walk_without_panicking() {
        let details = FlakyDetails::new(0);
        let rows = ListWalker::new(&BrokenList, &details, options(true)).walk().await;
        assert!(rows.is_empty());
    }
}
