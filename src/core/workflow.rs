use crate::config::workflow::JobConfig;
use crate::domain::batch::{Gender, JobRun, JobRunRequest, JobRunState, RunConf, RunContext, TableSpec};
use crate::domain::ports::{Clock, JobTrigger, ObjectStore, TableSource};
use crate::utils::error::{EtlError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Reads `process_year` from the run parameters. Missing, null and blank
/// values are configuration errors.
pub fn resolve_process_year(conf: &RunConf) -> Result<i32> {
    let missing = || EtlError::ConfigError {
        message: "process_year is required. Trigger the run with e.g. {\"process_year\": 2024}"
            .to_string(),
    };
    let invalid = |value: &Value, reason: &str| EtlError::InvalidConfigValueError {
        field: "process_year".to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    let value = match &conf.process_year {
        None | Some(Value::Null) => return Err(missing()),
        Some(value) => value,
    };

    match value {
        Value::String(s) if s.trim().is_empty() => Err(missing()),
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map_err(|_| invalid(value, "Year must be an integer")),
        Value::Number(n) => {
            let year = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .ok_or_else(|| invalid(value, "Year must be an integer"))?;
            i32::try_from(year).map_err(|_| invalid(value, "Year out of range"))
        }
        _ => Err(invalid(value, "Year must be a number or a numeric string")),
    }
}

pub fn object_key(prefix: &str, year: i32, filename: &str) -> String {
    format!("{}/year={}/{}", prefix.trim_end_matches('/'), year, filename)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub table: String,
    pub object_path: String,
    pub rows: usize,
    pub size_bytes: usize,
    pub year: i32,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Skipped {
        table: String,
        year: i32,
        gender: Gender,
    },
    Uploaded(UploadSummary),
}

impl UploadOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, UploadOutcome::Skipped { .. })
    }
}

/// Exports one table for the selected year. Tables of other years are skipped.
pub async fn extract_and_upload<T, O>(
    source: &T,
    store: &O,
    prefix: &str,
    spec: &TableSpec,
    ctx: &RunContext,
) -> Result<UploadOutcome>
where
    T: TableSource + ?Sized,
    O: ObjectStore,
{
    let selected_year = resolve_process_year(&ctx.conf)?;

    if spec.year != selected_year {
        tracing::info!(
            "⏭️  SKIP: {} (task year={}) because process_year={}",
            spec.table,
            spec.year,
            selected_year
        );
        return Ok(UploadOutcome::Skipped {
            table: spec.table.clone(),
            year: spec.year,
            gender: spec.gender,
        });
    }

    tracing::info!("📥 [1/3] Reading table {}", spec.table);
    let snapshot = source.fetch_table(&spec.table).await?;
    let rows = snapshot.row_count();
    tracing::info!("Extracted {} rows from {}", rows, spec.table);

    if snapshot.is_empty() {
        return Err(EtlError::EmptySourceError {
            table: spec.table.clone(),
        });
    }

    tracing::info!("🔄 [2/3] Converting to CSV...");
    let csv = snapshot.to_csv()?;
    tracing::info!("CSV size: {} bytes", csv.len());

    tracing::info!("📤 [3/3] Uploading...");
    let key = object_key(prefix, selected_year, &spec.filename);
    store.put_object(&key, &csv, false).await?;

    let object_path = store.describe(&key);
    tracing::info!(
        "✅ Uploaded {} ({} rows, {} bytes)",
        object_path,
        rows,
        csv.len()
    );

    Ok(UploadOutcome::Uploaded(UploadSummary {
        table: spec.table.clone(),
        object_path,
        rows,
        size_bytes: csv.len(),
        year: spec.year,
        gender: spec.gender,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub process_year: i32,
    pub files_validated: usize,
    pub total_size_bytes: u64,
}

/// Checks that every expected file for the selected year exists with a
/// positive size. All failures are collected into one error.
pub async fn validate_uploads<O: ObjectStore>(
    store: &O,
    prefix: &str,
    tables: &[TableSpec],
    ctx: &RunContext,
) -> Result<ValidationSummary> {
    let selected_year = resolve_process_year(&ctx.conf)?;

    let expected: Vec<&str> = TableSpec::for_year(tables, selected_year)
        .into_iter()
        .map(|t| t.filename.as_str())
        .collect();
    if expected.is_empty() {
        return Err(EtlError::ConfigError {
            message: format!("No table entries configured for process_year={}", selected_year),
        });
    }

    tracing::info!("🔍 Checking files for year={}:", selected_year);
    let mut missing = Vec::new();
    let mut total_size = 0u64;

    for filename in &expected {
        let key = object_key(prefix, selected_year, filename);
        match store.head_object(&key).await {
            Ok(Some(size)) if size > 0 => {
                total_size += size;
                tracing::info!("  ✓ {} ({} bytes)", filename, size);
            }
            Ok(Some(_)) => {
                tracing::warn!("  ✗ {} - EMPTY", filename);
                missing.push(filename.to_string());
            }
            Ok(None) => {
                tracing::warn!("  ✗ {} - NOT FOUND", filename);
                missing.push(filename.to_string());
            }
            Err(e) => {
                tracing::warn!("  ✗ {} - ERROR: {}", filename, e);
                missing.push(filename.to_string());
            }
        }
    }

    if !missing.is_empty() {
        return Err(EtlError::MissingObjectsError {
            year: selected_year,
            files: missing,
            location: store.describe(&object_key(prefix, selected_year, "")),
        });
    }

    tracing::info!(
        "✅ All {} files validated ({} bytes)",
        expected.len(),
        total_size
    );
    Ok(ValidationSummary {
        process_year: selected_year,
        files_validated: expected.len(),
        total_size_bytes: total_size,
    })
}

fn conf_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parameters for the downstream job. The run id doubles as idempotency
/// token so a retried trigger for the same run starts nothing new.
pub fn build_job_request(
    job: &JobConfig,
    latest_year: Option<i32>,
    ctx: &RunContext,
) -> Result<JobRunRequest> {
    let process_year = match ctx.conf.process_year.as_ref().filter(|v| !v.is_null()) {
        Some(value) => conf_param(value),
        None => latest_year
            .map(|y| y.to_string())
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "latest_year".to_string(),
            })?,
    };
    let run_mode = ctx
        .conf
        .run_mode
        .clone()
        .unwrap_or_else(|| job.default_run_mode.clone());

    let notebook_params = BTreeMap::from([
        ("run_mode".to_string(), run_mode),
        ("process_year".to_string(), process_year),
        ("triggered_by".to_string(), job.triggered_by.clone()),
        (
            "execution_date".to_string(),
            ctx.execution_date.format("%Y-%m-%d").to_string(),
        ),
    ]);

    Ok(JobRunRequest {
        job_id: job.job_id,
        idempotency_token: ctx.run_id.clone(),
        notebook_params,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobOutcome {
    pub run: JobRun,
    /// Terminal state; `None` when the run was not awaited.
    pub final_state: Option<JobRunState>,
}

/// Starts the job and, when configured, polls until it terminates.
pub async fn trigger_job<J, C>(
    trigger: &J,
    clock: &C,
    job: &JobConfig,
    request: &JobRunRequest,
) -> Result<JobOutcome>
where
    J: JobTrigger + ?Sized,
    C: Clock + ?Sized,
{
    tracing::info!(
        "🚀 Triggering job {} (idempotency token {})",
        request.job_id,
        request.idempotency_token
    );
    let run = trigger.run_now(request).await?;
    tracing::info!("Job run {} started", run.run_id);

    if !job.wait_for_termination {
        return Ok(JobOutcome {
            run,
            final_state: None,
        });
    }

    let period = job.polling_period();
    for poll in 1..=job.max_polls {
        let state = trigger.run_state(run.run_id).await?;
        tracing::debug!(
            "Run {} poll {}/{}: {}",
            run.run_id,
            poll,
            job.max_polls,
            state.life_cycle_state
        );

        if state.is_terminal() {
            if state.is_success() {
                tracing::info!("✅ Job run {} finished successfully", run.run_id);
                return Ok(JobOutcome {
                    run,
                    final_state: Some(state),
                });
            }
            return Err(EtlError::JobError {
                message: format!(
                    "Run {} ended in {} / {}: {}",
                    run.run_id,
                    state.life_cycle_state,
                    state.result_state.as_deref().unwrap_or("UNKNOWN"),
                    state.state_message.as_deref().unwrap_or("")
                ),
            });
        }
        clock.sleep(period).await;
    }

    Err(EtlError::JobError {
        message: format!(
            "Run {} did not terminate after {} polls",
            run.run_id, job.max_polls
        ),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub dag_id: String,
    pub run_id: String,
    pub execution_date: String,
    pub process_year: i32,
    pub uploads: Vec<UploadOutcome>,
    pub validation: ValidationSummary,
    pub job: JobOutcome,
}

pub fn notify_success(
    ctx: &RunContext,
    uploads: Vec<UploadOutcome>,
    validation: ValidationSummary,
    job: JobOutcome,
) -> RunSummary {
    let summary = RunSummary {
        dag_id: ctx.dag_id.clone(),
        run_id: ctx.run_id.clone(),
        execution_date: ctx.execution_date.format("%Y-%m-%d").to_string(),
        process_year: validation.process_year,
        uploads,
        validation,
        job,
    };

    tracing::info!(
        dag_id = %summary.dag_id,
        run_id = %summary.run_id,
        execution_date = %summary.execution_date,
        process_year = summary.process_year,
        "🎉 PIPELINE SUCCESS"
    );
    summary
}

pub fn notify_failure(step: &str, error: &EtlError) {
    tracing::error!(
        failed_step = step,
        category = ?error.category(),
        "❌ PIPELINE FAILED: {}",
        error
    );
    tracing::error!("💡 {}", error.recovery_suggestion());
}
