use crate::config::ScrapeConfig;
use crate::core::extract::FieldExtractor;
use crate::core::paginate::{PaginationDriver, ScrapeReport, ScrapeState};
use crate::core::sink::CsvCheckpointSink;
use crate::domain::model::EventSpec;
use crate::domain::ports::{BrowserSession, Clock};
use crate::utils::error::Result;
use std::future::Future;

/// Scrapes one event into its CSV file.
///
/// The driver is raced against `shutdown`; whichever finishes first, the
/// sink is flushed and the browser session closed before returning. Rows
/// flushed before an interrupt stay in the file.
pub async fn scrape_event<S, C, F>(
    session: &S,
    clock: &C,
    config: &ScrapeConfig,
    event: &EventSpec,
    shutdown: F,
) -> Result<ScrapeReport>
where
    S: BrowserSession + ?Sized,
    C: Clock + ?Sized,
    F: Future<Output = ()>,
{
    let path = config.output_path_for(event);
    let extractor = FieldExtractor::new(config.mapping.clone(), &config.selectors)?;
    let options = config.pagination_options();

    let mut sink = match CsvCheckpointSink::create(&path) {
        Ok(sink) => sink,
        Err(e) => {
            close_session(session).await;
            return Err(e);
        }
    };
    tracing::info!("Writing to: {}", path.display());

    let driver = PaginationDriver::new(session, clock, &extractor, &options);
    let report = {
        let run = driver.run(&config.url, event, &mut sink);
        tokio::pin!(run);
        tokio::pin!(shutdown);

        tokio::select! {
            biased;
            _ = &mut shutdown => None,
            report = &mut run => Some(report),
        }
    };

    let report = report.unwrap_or_else(|| {
        tracing::warn!("Stopped by user");
        ScrapeReport {
            event: event.key.clone(),
            pages_scraped: 0,
            total_results: sink.rows_written(),
            rows_written: sink.rows_written(),
            state: ScrapeState::Interrupted,
            selection: None,
        }
    });

    let rows_written = sink.rows_written();
    let finished = sink.finish();
    close_session(session).await;
    finished?;

    tracing::info!(
        "✓ {}: {} results saved to {}",
        event.key,
        rows_written,
        path.display()
    );
    Ok(report)
}

async fn close_session<S: BrowserSession + ?Sized>(session: &S) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser session: {}", e);
    }
}
