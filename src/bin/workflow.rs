use clap::Parser;
use ironman_results::adapters::{DatabricksClient, LocalStorage, PgTableSource};
use ironman_results::config::{WorkflowArgs, WorkflowConfig};
use ironman_results::core::etl::EtlEngine;
use ironman_results::core::workflow::resolve_process_year;
use ironman_results::core::{ObjectStore, TokioClock};
use ironman_results::domain::batch::RunContext;
use ironman_results::utils::{logger, validation::Validate};
use ironman_results::EtlError;
use std::time::Duration;

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

async fn run_with<O: ObjectStore>(store: O, config: WorkflowConfig, ctx: &RunContext) {
    let source = match PgTableSource::connect(&config.database.url, config.database.max_connections).await {
        Ok(source) => source,
        Err(e) => fail(&e),
    };
    let trigger = match DatabricksClient::new(
        &config.job.host,
        &config.job.token,
        Duration::from_secs(config.job.timeout_seconds),
    ) {
        Ok(trigger) => trigger,
        Err(e) => fail(&e),
    };

    let engine = EtlEngine::new(source, store, trigger, TokioClock, config);
    match engine.run(ctx).await {
        Ok(summary) => match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(&EtlError::from(e)),
        },
        Err(failure) => {
            eprintln!("❌ Failed step: {}", failure.step);
            fail(&failure.source);
        }
    }
}

#[tokio::main]
async fn main() {
    let args = WorkflowArgs::parse();
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => fail(&e),
    };
    let conf = match args.run_conf() {
        Ok(conf) => conf,
        Err(e) => fail(&e),
    };
    let process_year = match resolve_process_year(&conf) {
        Ok(year) => year,
        Err(e) => fail(&e),
    };

    let now = chrono::Local::now();
    let ctx = RunContext {
        dag_id: config.dag_id.clone(),
        run_id: args
            .run_id
            .clone()
            .unwrap_or_else(|| format!("manual__{}", now.format("%Y-%m-%dT%H:%M:%S"))),
        execution_date: now.date_naive(),
        conf,
    };

    if args.dry_run {
        // Plan only; connections and credentials are not required.
        tracing::info!("Dry run for {} (run {})", ctx.dag_id, ctx.run_id);
        for table in config.tables_for_year(process_year) {
            tracing::info!("Would export {} as {}", table.table, table.filename);
        }
        let engine = EtlEngine::new((), LocalStorage::new(&config.storage.local_dir), (), TokioClock, config);
        for step in engine.plan() {
            println!("{}", step);
        }
        return;
    }

    if let Err(e) = config.validate() {
        fail(&e);
    }

    #[cfg(feature = "aws")]
    if let Some(bucket) = config.storage.bucket.clone() {
        let store = ironman_results::adapters::S3Storage::from_env(bucket, config.storage.region.clone()).await;
        run_with(store, config, &ctx).await;
        return;
    }

    if config.storage.bucket.is_some() {
        tracing::warn!("storage.bucket is set but this build has no S3 support; writing locally");
    }
    let store = LocalStorage::new(&config.storage.local_dir);
    run_with(store, config, &ctx).await;
}
