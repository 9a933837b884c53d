use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins; otherwise this crate logs at `crate_level`, others at warn.
fn env_filter(crate_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ironman_results={},warn", crate_level)))
}

/// Compact console output for interactive runs of the scraper and workflow.
pub fn init_cli_logger(verbose: bool) {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter(if verbose { "debug" } else { "info" }))
        .with(layer)
        .init();
}

/// Scheduler-run workflow executions ship their logs as JSON lines.
pub fn init_json_logger() {
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .json()
        .with_current_span(false);

    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(layer)
        .init();
}
