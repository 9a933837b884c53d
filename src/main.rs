use clap::Parser;
use ironman_results::adapters::ChromeSession;
use ironman_results::config::ScraperArgs;
use ironman_results::core::paginate::ScrapeState;
use ironman_results::core::{scrape_event, TokioClock};
use ironman_results::utils::{logger, validation::Validate};
use ironman_results::EtlError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn fail(e: &EtlError) -> ! {
    tracing::error!(
        "❌ {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());
    std::process::exit(e.exit_code().max(1));
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = ScraperArgs::parse();
    logger::init_cli_logger(args.verbose);

    let config = match args.resolve() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    if let Err(e) = config.validate() {
        fail(&e);
    }
    let events = match config.selected_events(&args.events) {
        Ok(events) => events,
        Err(e) => fail(&e),
    };

    tracing::info!("{}", "=".repeat(70));
    tracing::info!("IRONMAN KONA COMPLETE RESULTS SCRAPER");
    tracing::info!("Scraping {} event(s)", events.len());
    tracing::info!("CSV files update in real time as data is collected");
    tracing::info!("{}", "=".repeat(70));

    let interrupted = Arc::new(AtomicBool::new(false));
    let clock = TokioClock;
    let mut failures = 0;

    for event in &events {
        let session = match ChromeSession::launch(config.headless).await {
            Ok(session) => session,
            Err(e) => fail(&e),
        };

        let flag = interrupted.clone();
        let shutdown = async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                flag.store(true, Ordering::SeqCst);
            } else {
                std::future::pending::<()>().await;
            }
        };

        match scrape_event(&session, &clock, &config, event, shutdown).await {
            Ok(report) => {
                if let ScrapeState::Aborted(reason) = &report.state {
                    tracing::warn!("{} aborted: {}", report.event, reason);
                    failures += 1;
                }
            }
            Err(e) => {
                tracing::error!("❌ {} failed: {}", event.key, e);
                failures += 1;
            }
        }

        if interrupted.load(Ordering::SeqCst) {
            tracing::warn!("Interrupted; skipping remaining events");
            break;
        }
    }

    tracing::info!("{}", "=".repeat(70));
    if failures == 0 {
        tracing::info!("ALL EVENTS COMPLETED");
    } else {
        tracing::warn!("{} event(s) did not complete", failures);
        std::process::exit(1);
    }
}
