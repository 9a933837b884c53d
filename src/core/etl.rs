use crate::config::WorkflowConfig;
use crate::core::workflow::{
    build_job_request, extract_and_upload, notify_failure, notify_success, trigger_job,
    validate_uploads, RunSummary,
};
use crate::domain::batch::RunContext;
use crate::domain::ports::{Clock, JobTrigger, ObjectStore, TableSource};
use crate::utils::error::EtlError;

pub const VALIDATE_STEP: &str = "validate_s3_files";
pub const TRIGGER_STEP: &str = "trigger_databricks_pipeline";
pub const NOTIFY_STEP: &str = "notify_success";

/// The step that stopped a workflow run and the error it raised.
#[derive(Debug, thiserror::Error)]
#[error("Step '{step}' failed: {source}")]
pub struct StepFailure {
    pub step: String,
    #[source]
    pub source: EtlError,
}

impl StepFailure {
    fn new(step: impl Into<String>, source: EtlError) -> Self {
        let failure = Self {
            step: step.into(),
            source,
        };
        notify_failure(&failure.step, &failure.source);
        failure
    }
}

/// Runs the export workflow: one extract/upload step per table, then
/// validation, the batch job trigger and the success notification.
pub struct EtlEngine<T, O, J, C> {
    source: T,
    store: O,
    trigger: J,
    clock: C,
    config: WorkflowConfig,
}

impl<T, O, J, C> EtlEngine<T, O, J, C> {
    pub fn new(source: T, store: O, trigger: J, clock: C, config: WorkflowConfig) -> Self {
        Self {
            source,
            store,
            trigger,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &O {
        &self.store
    }

    /// Step identifiers in execution order.
    pub fn plan(&self) -> Vec<String> {
        self.config
            .tables
            .iter()
            .map(|t| format!("extract_upload_{}", t.table))
            .chain([VALIDATE_STEP, TRIGGER_STEP, NOTIFY_STEP].map(String::from))
            .collect()
    }
}

impl<T, O, J, C> EtlEngine<T, O, J, C>
where
    T: TableSource,
    O: ObjectStore,
    J: JobTrigger,
    C: Clock,
{
    pub async fn run(&self, ctx: &RunContext) -> Result<RunSummary, StepFailure> {
        tracing::info!(
            "Starting workflow {} (run {}, {})",
            ctx.dag_id,
            ctx.run_id,
            ctx.execution_date
        );
        let prefix = &self.config.storage.prefix;

        let mut uploads = Vec::with_capacity(self.config.tables.len());
        for spec in &self.config.tables {
            let step = format!("extract_upload_{}", spec.table);
            tracing::info!("▶️  {}", step);
            let outcome = extract_and_upload(&self.source, &self.store, prefix, spec, ctx)
                .await
                .map_err(|e| StepFailure::new(step, e))?;
            uploads.push(outcome);
        }

        tracing::info!("▶️  {}", VALIDATE_STEP);
        let validation = validate_uploads(&self.store, prefix, &self.config.tables, ctx)
            .await
            .map_err(|e| StepFailure::new(VALIDATE_STEP, e))?;

        tracing::info!("▶️  {}", TRIGGER_STEP);
        let request = build_job_request(&self.config.job, self.config.latest_year(), ctx)
            .map_err(|e| StepFailure::new(TRIGGER_STEP, e))?;
        let job = trigger_job(&self.trigger, &self.clock, &self.config.job, &request)
            .await
            .map_err(|e| StepFailure::new(TRIGGER_STEP, e))?;

        tracing::info!("▶️  {}", NOTIFY_STEP);
        Ok(notify_success(ctx, uploads, validation, job))
    }
}
