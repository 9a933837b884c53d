mod common;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::FakeClock;
use httpmock::prelude::*;
use ironman_results::core::etl::{EtlEngine, TRIGGER_STEP, VALIDATE_STEP};
use ironman_results::core::workflow::{extract_and_upload, validate_uploads, UploadOutcome};
use ironman_results::core::{ObjectStore, TableSource};
use ironman_results::domain::batch::{Gender, RunConf, RunContext, TableSnapshot, TableSpec};
use ironman_results::utils::validation::Validate;
use ironman_results::{DatabricksClient, EtlError, LocalStorage, Result, WorkflowConfig};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::{NamedTempFile, TempDir};

/// Tables held in memory, keyed by name.
#[derive(Default)]
struct MemorySource {
    tables: HashMap<String, TableSnapshot>,
}

impl MemorySource {
    fn with(mut self, table: &str, rows: &[(&str, &str)]) -> Self {
        let snapshot = TableSnapshot {
            columns: vec!["rank".to_string(), "athlete_name".to_string()],
            rows: rows
                .iter()
                .map(|(rank, name)| vec![Some(rank.to_string()), Some(name.to_string())])
                .collect(),
        };
        self.tables.insert(table.to_string(), snapshot);
        self
    }
}

#[async_trait]
impl TableSource for MemorySource {
    async fn fetch_table(&self, table: &str) -> Result<TableSnapshot> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| EtlError::DatabaseError {
                message: format!("relation \"{}\" does not exist", table),
            })
    }
}

fn context(year: Option<serde_json::Value>) -> RunContext {
    RunContext {
        dag_id: "ironman_dag".to_string(),
        run_id: "manual__2025-11-02T06:00:00".to_string(),
        execution_date: NaiveDate::from_ymd_opt(2025, 11, 2).unwrap(),
        conf: RunConf {
            process_year: year,
            run_mode: None,
        },
    }
}

fn config(server: &MockServer) -> WorkflowConfig {
    let mut config = WorkflowConfig::default();
    config.job.host = server.base_url();
    config.job.token = "dapi-test".to_string();
    config.job.job_id = 77;
    config.job.polling_period_seconds = 10;
    config
}

fn client(server: &MockServer) -> DatabricksClient {
    DatabricksClient::new(&server.base_url(), "dapi-test", Duration::from_secs(5)).unwrap()
}

fn source_2024() -> MemorySource {
    MemorySource::default()
        .with("2024_men", &[("1", "Patrick Lange"), ("2", "Magnus Ditlev")])
        .with("2024_women", &[("1", "Laura Philipp")])
}

#[tokio::test]
async fn test_full_run_uploads_selected_year_and_triggers_job() {
    let server = MockServer::start_async().await;
    let run_now = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/2.1/jobs/run-now")
                .header("authorization", "Bearer dapi-test")
                .json_body(json!({
                    "job_id": 77,
                    "idempotency_token": "manual__2025-11-02T06:00:00",
                    "notebook_params": {
                        "execution_date": "2025-11-02",
                        "process_year": "2024",
                        "run_mode": "incremental",
                        "triggered_by": "ironman-workflow"
                    }
                }));
            then.status(200).json_body(json!({"run_id": 9001}));
        })
        .await;
    let runs_get = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/2.1/jobs/runs/get")
                .query_param("run_id", "9001");
            then.status(200).json_body(json!({
                "run_id": 9001,
                "state": {"life_cycle_state": "TERMINATED", "result_state": "SUCCESS"}
            }));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let engine = EtlEngine::new(
        source_2024(),
        LocalStorage::new(dir.path()),
        client(&server),
        FakeClock::default(),
        config(&server),
    );

    let summary = engine.run(&context(Some(json!(2024)))).await.unwrap();

    run_now.assert_async().await;
    runs_get.assert_async().await;
    assert_eq!(summary.process_year, 2024);
    assert_eq!(summary.execution_date, "2025-11-02");
    assert_eq!(summary.uploads.len(), 6);
    assert_eq!(summary.uploads.iter().filter(|u| u.is_skipped()).count(), 4);
    assert_eq!(summary.validation.files_validated, 2);
    assert_eq!(summary.job.run.run_id, 9001);

    let uploaded = engine
        .store()
        .read_object("inbound/year=2024/2024_men.csv")
        .await
        .unwrap();
    assert_eq!(
        String::from_utf8(uploaded).unwrap(),
        "rank,athlete_name\n1,Patrick Lange\n2,Magnus Ditlev\n"
    );
    assert!(!dir.path().join("inbound/year=2023").exists());
}

#[tokio::test]
async fn test_failed_job_run_fails_trigger_step() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/2.1/jobs/run-now");
            then.status(200).json_body(json!({"run_id": 5}));
        })
        .await;
    let failed = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/2.1/jobs/runs/get");
            then.status(200).json_body(json!({
                "state": {
                    "life_cycle_state": "INTERNAL_ERROR",
                    "result_state": "FAILED",
                    "state_message": "Cluster terminated"
                }
            }));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let engine = EtlEngine::new(
        source_2024(),
        LocalStorage::new(dir.path()),
        client(&server),
        FakeClock::default(),
        config(&server),
    );

    let failure = engine.run(&context(Some(json!("2024")))).await.unwrap_err();

    failed.assert_async().await;
    assert_eq!(failure.step, TRIGGER_STEP);
    assert!(matches!(failure.source, EtlError::JobError { .. }));
    assert!(failure.source.to_string().contains("Cluster terminated"));
}

#[tokio::test]
async fn test_empty_table_stops_at_its_extract_step() {
    let server = MockServer::start_async().await;
    let run_now = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/2.1/jobs/run-now");
            then.status(200).json_body(json!({"run_id": 1}));
        })
        .await;

    let source = MemorySource::default()
        .with("2024_men", &[])
        .with("2024_women", &[("1", "Laura Philipp")]);
    let dir = TempDir::new().unwrap();
    let engine = EtlEngine::new(
        source,
        LocalStorage::new(dir.path()),
        client(&server),
        FakeClock::default(),
        config(&server),
    );

    let failure = engine.run(&context(Some(json!(2024)))).await.unwrap_err();

    assert_eq!(failure.step, "extract_upload_2024_men");
    assert!(matches!(
        failure.source,
        EtlError::EmptySourceError { ref table } if table == "2024_men"
    ));
    run_now.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_missing_process_year_fails_first_step() {
    let server = MockServer::start_async().await;
    let dir = TempDir::new().unwrap();
    let engine = EtlEngine::new(
        source_2024(),
        LocalStorage::new(dir.path()),
        client(&server),
        FakeClock::default(),
        config(&server),
    );

    let failure = engine.run(&context(None)).await.unwrap_err();

    assert_eq!(failure.step, "extract_upload_2023_men");
    assert!(matches!(failure.source, EtlError::ConfigError { .. }));
}

#[tokio::test]
async fn test_existing_object_is_not_overwritten() {
    let dir = TempDir::new().unwrap();
    let store = LocalStorage::new(dir.path());
    store
        .put_object("inbound/year=2024/2024_men.csv", b"rank\n1\n", false)
        .await
        .unwrap();

    let spec = TableSpec::new(2024, Gender::Men, "2024_men", "2024_men.csv");
    let err = extract_and_upload(&source_2024(), &store, "inbound", &spec, &context(Some(json!(2024))))
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::StorageError { .. }));
    let kept = store.read_object("inbound/year=2024/2024_men.csv").await.unwrap();
    assert_eq!(kept, b"rank\n1\n");
}

#[tokio::test]
async fn test_other_years_are_skipped_without_reading() {
    let dir = TempDir::new().unwrap();
    let store = LocalStorage::new(dir.path());
    let spec = TableSpec::new(2023, Gender::Women, "2023_women", "2023_women.csv");

    // the source has no 2023 table; a read would fail
    let outcome = extract_and_upload(&source_2024(), &store, "inbound/", &spec, &context(Some(json!(2024))))
        .await
        .unwrap();

    assert_eq!(
        outcome,
        UploadOutcome::Skipped {
            table: "2023_women".to_string(),
            year: 2023,
            gender: Gender::Women,
        }
    );
}

#[tokio::test]
async fn test_validation_reports_every_missing_or_empty_file() {
    let dir = TempDir::new().unwrap();
    let store = LocalStorage::new(dir.path());
    store
        .put_object("inbound/year=2024/a.csv", b"rank\n1\n", false)
        .await
        .unwrap();
    store
        .put_object("inbound/year=2024/c.csv", b"", false)
        .await
        .unwrap();

    let tables = vec![
        TableSpec::new(2024, Gender::Men, "a", "a.csv"),
        TableSpec::new(2024, Gender::Women, "b", "b.csv"),
        TableSpec::new(2024, Gender::Women, "c", "c.csv"),
        TableSpec::new(2023, Gender::Men, "d", "d.csv"),
    ];

    let err = validate_uploads(&store, "inbound", &tables, &context(Some(json!(2024))))
        .await
        .unwrap_err();

    match err {
        EtlError::MissingObjectsError {
            year,
            files,
            location,
        } => {
            assert_eq!(year, 2024);
            assert_eq!(files, ["b.csv", "c.csv"]);
            assert!(location.contains("year=2024"));
        }
        other => panic!("expected MissingObjectsError, got {:?}", other),
    }

    store
        .put_object("inbound/year=2024/b.csv", b"rank\n2\n", false)
        .await
        .unwrap();
    store
        .put_object("inbound/year=2024/c.csv", b"rank\n3\n", true)
        .await
        .unwrap();
    let summary = validate_uploads(&store, "inbound", &tables, &context(Some(json!(2024))))
        .await
        .unwrap();
    assert_eq!(summary.files_validated, 3);
    assert_eq!(summary.total_size_bytes, 21);
}

#[tokio::test]
async fn test_validation_without_tables_for_year() {
    let dir = TempDir::new().unwrap();
    let store = LocalStorage::new(dir.path());
    let tables = vec![TableSpec::new(2024, Gender::Men, "a", "a.csv")];

    let err = validate_uploads(&store, "inbound", &tables, &context(Some(json!(2019))))
        .await
        .unwrap_err();
    assert!(matches!(err, EtlError::ConfigError { .. }));
}

#[test]
fn test_dry_run_plan_lists_steps_in_order() {
    let engine = EtlEngine::new((), (), (), (), WorkflowConfig::default());
    let plan = engine.plan();

    assert_eq!(plan.len(), 9);
    assert_eq!(plan[0], "extract_upload_2023_men");
    assert_eq!(plan[5], "extract_upload_2025_women");
    assert_eq!(plan[6], VALIDATE_STEP);
    assert_eq!(
        &plan[6..],
        ["validate_s3_files", "trigger_databricks_pipeline", "notify_success"]
    );
}

#[test]
fn test_config_file_loading() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
dag_id = "ironman_kona"
latest_year = 2025

[storage]
prefix = "landing/ironman"
local_dir = "/tmp/ironman"

[database]
url = "postgres://etl@db.internal/ironman"
max_connections = 4

[job]
host = "https://dbc-42.cloud.databricks.com"
token = "dapi-abc"
job_id = 314
wait_for_termination = false

[[tables]]
year = 2025
gender = "M"
table = "kona_2025_men"
filename = "2025_men.csv"
"#
    )
    .unwrap();

    let config = WorkflowConfig::from_file(file.path()).unwrap();
    assert_eq!(config.dag_id, "ironman_kona");
    assert_eq!(config.storage.prefix, "landing/ironman");
    assert_eq!(config.database.max_connections, 4);
    assert_eq!(config.job.job_id, 314);
    assert!(!config.job.wait_for_termination);
    assert_eq!(config.job.max_polls, 240);
    assert_eq!(config.tables.len(), 1);
    assert_eq!(config.tables_for_year(2025)[0].table, "kona_2025_men");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_file_with_bad_toml() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "dag_id = ").unwrap();

    assert!(matches!(
        WorkflowConfig::from_file(file.path()),
        Err(EtlError::ConfigValidationError { .. })
    ));
}
