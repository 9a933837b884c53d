use crate::domain::batch::{Gender, TableSpec};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub dag_id: String,
    /// Year sent downstream when the run names none; defaults to the newest table year.
    pub latest_year: Option<i32>,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub job: JobConfig,
    pub tables: Vec<TableSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// S3 bucket; when unset, objects go under `local_dir`.
    pub bucket: Option<String>,
    pub prefix: String,
    pub region: String,
    pub local_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub host: String,
    pub token: String,
    pub job_id: i64,
    pub default_run_mode: String,
    pub triggered_by: String,
    pub wait_for_termination: bool,
    pub polling_period_seconds: u64,
    pub max_polls: u32,
    pub timeout_seconds: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            dag_id: "ironman_dag".to_string(),
            latest_year: None,
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            job: JobConfig::default(),
            tables: default_tables(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: "inbound".to_string(),
            region: "ap-southeast-2".to_string(),
            local_dir: "./warehouse".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "${IRONMAN_DATABASE_URL}".to_string(),
            max_connections: 2,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            host: "${DATABRICKS_HOST}".to_string(),
            token: "${DATABRICKS_TOKEN}".to_string(),
            job_id: 0,
            default_run_mode: "incremental".to_string(),
            triggered_by: "ironman-workflow".to_string(),
            wait_for_termination: true,
            polling_period_seconds: 30,
            max_polls: 240,
            timeout_seconds: 30,
        }
    }
}

fn default_tables() -> Vec<TableSpec> {
    let mut tables = Vec::new();
    for year in [2023, 2024, 2025] {
        for (gender, suffix) in [(Gender::Men, "men"), (Gender::Women, "women")] {
            let name = format!("{}_{}", year, suffix);
            tables.push(TableSpec::new(year, gender, &name, &format!("{}.csv", name)));
        }
    }
    tables
}

impl WorkflowConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config: Self = super::read_toml(path)?;
        config.resolve_env_defaults();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: Self = super::parse_toml(content)?;
        config.resolve_env_defaults();
        Ok(config)
    }

    /// Built-in defaults carry `${VAR}` placeholders that file parsing never sees.
    fn resolve_env_defaults(&mut self) {
        self.database.url = super::substitute_env_vars(&self.database.url);
        self.job.host = super::substitute_env_vars(&self.job.host);
        self.job.token = super::substitute_env_vars(&self.job.token);
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.latest_year
            .or_else(|| self.tables.iter().map(|t| t.year).max())
    }

    pub fn tables_for_year(&self, year: i32) -> Vec<&TableSpec> {
        TableSpec::for_year(&self.tables, year)
    }
}

impl JobConfig {
    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.polling_period_seconds)
    }
}

fn is_unresolved(value: &str) -> bool {
    value.contains("${")
}

impl Validate for WorkflowConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("dag_id", &self.dag_id)?;

        if self.tables.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "tables".to_string(),
            });
        }
        for (i, table) in self.tables.iter().enumerate() {
            validate_non_empty_string(&format!("tables[{}].table", i), &table.table)?;
            validate_non_empty_string(&format!("tables[{}].filename", i), &table.filename)?;
        }

        validate_non_empty_string("storage.prefix", &self.storage.prefix)?;
        match &self.storage.bucket {
            Some(bucket) => validate_s3_bucket_name("storage.bucket", bucket)?,
            None => validate_path("storage.local_dir", &self.storage.local_dir)?,
        }

        if is_unresolved(&self.database.url) {
            return Err(EtlError::MissingConfigError {
                field: "database.url".to_string(),
            });
        }
        validate_non_empty_string("database.url", &self.database.url)?;
        validate_range("database.max_connections", self.database.max_connections, 1, 32)?;

        if is_unresolved(&self.job.host) || is_unresolved(&self.job.token) {
            return Err(EtlError::MissingConfigError {
                field: "job.host / job.token".to_string(),
            });
        }
        validate_url("job.host", &self.job.host)?;
        validate_non_empty_string("job.token", &self.job.token)?;
        if self.job.job_id <= 0 {
            return Err(EtlError::InvalidConfigValueError {
                field: "job.job_id".to_string(),
                value: self.job.job_id.to_string(),
                reason: "Job id must be a positive integer".to_string(),
            });
        }
        validate_non_empty_string("job.default_run_mode", &self.job.default_run_mode)?;
        validate_positive_number("job.max_polls", self.job.max_polls as usize, 1)?;

        tracing::debug!("✅ Workflow configuration validation passed");
        Ok(())
    }
}

pub fn validate_s3_bucket_name(field_name: &str, bucket_name: &str) -> Result<()> {
    if bucket_name.len() < 3 || bucket_name.len() > 63 {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name must be between 3 and 63 characters".to_string(),
        });
    }

    if !bucket_name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name can only contain lowercase letters, numbers, hyphens, and dots"
                .to_string(),
        });
    }

    if bucket_name.starts_with('-') || bucket_name.ends_with('-') {
        return Err(EtlError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: bucket_name.to_string(),
            reason: "S3 bucket name cannot start or end with a hyphen".to_string(),
        });
    }

    Ok(())
}
