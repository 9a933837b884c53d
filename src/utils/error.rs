use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("No data found in table {table}")]
    EmptySourceError { table: String },

    #[error("Missing files in object storage for year={year}: [{}]. Expected under {location}", files.join(", "))]
    MissingObjectsError {
        year: i32,
        files: Vec<String>,
        location: String,
    },

    #[error("Browser interaction failed: {message}")]
    BrowserError { message: String },

    #[error("Object storage error: {message}")]
    StorageError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Batch job error: {message}")]
    JobError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Browser,
    Storage,
    Source,
    Job,
    Io,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::BrowserError { .. } => ErrorCategory::Browser,
            EtlError::StorageError { .. } | EtlError::MissingObjectsError { .. } => {
                ErrorCategory::Storage
            }
            EtlError::DatabaseError { .. } | EtlError::EmptySourceError { .. } => {
                ErrorCategory::Source
            }
            EtlError::JobError { .. } | EtlError::ApiError(_) => ErrorCategory::Job,
            EtlError::IoError(_) => ErrorCategory::Io,
            EtlError::CsvError(_) | EtlError::SerializationError(_) => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Browser => ErrorSeverity::Medium,
            ErrorCategory::Job if self.is_transient() => ErrorSeverity::Medium,
            ErrorCategory::Io => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 可重試的錯誤 (網路或瀏覽器暫時性問題)
    pub fn is_transient(&self) -> bool {
        match self {
            EtlError::ApiError(e) => e.is_timeout() || e.is_connect(),
            EtlError::BrowserError { .. } => true,
            _ => false,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::MissingConfigError { field } => {
                format!("Provide a value for '{}' (e.g. --{} 2024)", field, field.replace('_', "-"))
            }
            EtlError::InvalidConfigValueError { field, .. }
            | EtlError::ConfigValidationError { field, .. } => {
                format!("Check the '{}' setting in the configuration file", field)
            }
            EtlError::ConfigError { .. } => "Review the configuration file and CLI flags".to_string(),
            EtlError::EmptySourceError { table } => {
                format!("Load results into table '{}' before running the workflow", table)
            }
            EtlError::MissingObjectsError { .. } => {
                "Re-run the extract step for the selected year".to_string()
            }
            EtlError::BrowserError { .. } => {
                "Retry the scrape; the results page may still be loading".to_string()
            }
            EtlError::StorageError { .. } => {
                "Check object storage credentials and bucket permissions".to_string()
            }
            EtlError::DatabaseError { .. } => {
                "Check the database URL and that the table exists".to_string()
            }
            EtlError::JobError { .. } | EtlError::ApiError(_) => {
                "Check the batch job host, token and job id".to_string()
            }
            EtlError::IoError(_) => "Check file permissions and free disk space".to_string(),
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Inspect the input data for malformed rows".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Browser => format!("Browser problem: {}", self),
            ErrorCategory::Storage => format!("Storage problem: {}", self),
            ErrorCategory::Source => format!("Source table problem: {}", self),
            ErrorCategory::Job => format!("Batch job problem: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Data => format!("Data problem: {}", self),
        }
    }

    /// 根據錯誤嚴重程度決定退出碼
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn browser(message: impl Into<String>) -> Self {
        EtlError::BrowserError {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
