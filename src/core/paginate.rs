use crate::core::detail::{DetailExpander, DetailOutcome};
use crate::core::event_select::{EventSelector, SelectionOutcome};
use crate::core::extract::FieldExtractor;
use crate::core::selectors::{GridSelectors, Timings};
use crate::core::sink::CsvCheckpointSink;
use crate::domain::model::{EventSpec, PageState};
use crate::domain::ports::{BrowserSession, Clock, Locator};
use crate::utils::error::Result;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EmptyPage,
    NoNextControl,
    PageCeiling,
    NextClickFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeState {
    AwaitingInitialLoad,
    ScrapingPage(u32),
    Done(StopReason),
    Aborted(String),
    Interrupted,
}

impl ScrapeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScrapeState::Done(_) | ScrapeState::Aborted(_) | ScrapeState::Interrupted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub event: String,
    pub pages_scraped: u32,
    pub total_results: usize,
    pub rows_written: usize,
    pub state: ScrapeState,
    pub selection: Option<SelectionOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationOptions {
    pub selectors: GridSelectors,
    pub timings: Timings,
    pub expand_details: bool,
    pub max_pages: u32,
}

/// Walks the results grid page by page, checkpointing each page to the sink.
pub struct PaginationDriver<'a, S: BrowserSession + ?Sized, C: Clock + ?Sized> {
    session: &'a S,
    clock: &'a C,
    extractor: &'a FieldExtractor,
    options: &'a PaginationOptions,
}

impl<'a, S: BrowserSession + ?Sized, C: Clock + ?Sized> PaginationDriver<'a, S, C> {
    pub fn new(
        session: &'a S,
        clock: &'a C,
        extractor: &'a FieldExtractor,
        options: &'a PaginationOptions,
    ) -> Self {
        Self {
            session,
            clock,
            extractor,
            options,
        }
    }

    pub async fn run<W: Write>(
        &self,
        url: &str,
        event: &EventSpec,
        sink: &mut CsvCheckpointSink<W>,
    ) -> ScrapeReport {
        tracing::info!("Scraping: {}", event.display_name);
        tracing::info!("URL: {}", url);

        let mut progress = PageState::first();
        let mut pages_scraped = 0;
        let mut selection = None;

        let state = match self
            .drive(url, event, sink, &mut progress, &mut pages_scraped, &mut selection)
            .await
        {
            Ok(reason) => {
                tracing::info!(
                    "Completed {}: {} total results ({:?})",
                    event.display_name,
                    progress.total_results,
                    reason
                );
                ScrapeState::Done(reason)
            }
            Err(e) => {
                tracing::error!(
                    "Scrape of {} aborted on page {}: {:?}",
                    event.display_name,
                    progress.page,
                    e
                );
                ScrapeState::Aborted(e.to_string())
            }
        };

        ScrapeReport {
            event: event.key.clone(),
            pages_scraped,
            total_results: progress.total_results,
            rows_written: sink.rows_written(),
            state,
            selection,
        }
    }

    async fn drive<W: Write>(
        &self,
        url: &str,
        event: &EventSpec,
        sink: &mut CsvCheckpointSink<W>,
        progress: &mut PageState,
        pages_scraped: &mut u32,
        selection: &mut Option<SelectionOutcome>,
    ) -> Result<StopReason> {
        let timings = &self.options.timings;
        let mut state = ScrapeState::AwaitingInitialLoad;
        tracing::debug!("{:?}", state);

        self.session.navigate(url).await?;
        self.clock.sleep(Timings::ms(timings.initial_load_ms)).await;

        if let Some(filter) = &event.filter {
            let selector =
                EventSelector::new(self.session, self.clock, &self.options.selectors, timings);
            let outcome = selector.select(filter).await;
            if !outcome.is_success() {
                tracing::warn!("Could not select event filter '{}': {:?}", filter, outcome);
            }
            *selection = Some(outcome);
            self.clock.sleep(Timings::ms(timings.post_select_ms)).await;
        }

        loop {
            state = ScrapeState::ScrapingPage(progress.page);
            tracing::info!("Page {}:", progress.page);
            tracing::debug!("{:?}", state);

            let count = self.scrape_page(sink).await?;
            *pages_scraped = progress.page;

            if count == 0 {
                tracing::info!("No data found");
                return Ok(StopReason::EmptyPage);
            }
            progress.total_results += count;
            tracing::info!("Total so far: {}", progress.total_results);

            if progress.page >= self.options.max_pages {
                tracing::warn!("Reached page ceiling of {}", self.options.max_pages);
                return Ok(StopReason::PageCeiling);
            }

            progress.next_control = self.find_next_control().await;
            let Some(next) = progress.next_control.clone() else {
                tracing::info!("No more pages");
                return Ok(StopReason::NoNextControl);
            };

            if let Err(e) = self.advance(&next).await {
                tracing::warn!("Error clicking next: {}", e);
                return Ok(StopReason::NextClickFailed);
            }
            tracing::info!("Moving to page {}...", progress.page + 1);
            progress.page += 1;
        }
    }

    /// Extracts the current page, expands rows when enabled, writes and flushes.
    async fn scrape_page<W: Write>(&self, sink: &mut CsvCheckpointSink<W>) -> Result<usize> {
        let html = self.session.page_source().await?;
        let mut records = self.extractor.extract_page(&html);
        let row_count = records.len();
        tracing::info!("Found {} rows", row_count);

        if row_count == 0 {
            return Ok(0);
        }

        if self.options.expand_details {
            let expander = DetailExpander::new(
                self.session,
                self.clock,
                &self.options.selectors,
                &self.options.timings,
            )?;

            for (idx, record) in records.iter_mut().enumerate() {
                let outcome = expander.expand(record.row_index).await;
                match &outcome {
                    DetailOutcome::Found(detail) => tracing::debug!(
                        "Row {}/{}: found {} fields{}",
                        idx + 1,
                        row_count,
                        detail.fields.len(),
                        if detail.used_text_fallback { " (text fallback)" } else { "" }
                    ),
                    other => tracing::debug!("Row {}/{}: {:?}", idx + 1, row_count, other),
                }
                record.merge_detail(outcome.into_fields());
                sink.write_record(record)?;
            }
            sink.flush()?;
        } else {
            sink.write_page(&records)?;
        }

        Ok(row_count)
    }

    /// First visible, enabled match across the selector list, in order.
    async fn find_next_control(&self) -> Option<Locator> {
        for selector in &self.options.selectors.next_page {
            let total = match self.session.count(selector).await {
                Ok(total) => total,
                Err(e) => {
                    tracing::debug!("Next selector '{}' failed: {}", selector, e);
                    continue;
                }
            };
            for index in 0..total {
                let candidate = Locator::nth(selector, index);
                if self.is_enabled_control(&candidate).await.unwrap_or(false) {
                    return Some(candidate);
                }
            }
        }
        None
    }

    async fn is_enabled_control(&self, candidate: &Locator) -> Result<bool> {
        if !self.session.is_interactable(candidate).await? {
            return Ok(false);
        }
        if self.session.attribute(candidate, "disabled").await?.is_some() {
            return Ok(false);
        }
        let aria_disabled = self.session.attribute(candidate, "aria-disabled").await?;
        Ok(aria_disabled.as_deref() != Some("true"))
    }

    async fn advance(&self, next: &Locator) -> Result<()> {
        let timings = &self.options.timings;
        self.session.scroll_to_bottom().await?;
        self.clock.sleep(Timings::ms(timings.next_scroll_ms)).await;
        self.session.scroll_into_view(next).await?;
        self.clock.sleep(Timings::ms(timings.next_scroll_ms)).await;
        self.session.click(next).await?;
        self.clock.sleep(Timings::ms(timings.next_settle_ms)).await;
        Ok(())
    }
}
