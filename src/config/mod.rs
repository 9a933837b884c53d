#[cfg(feature = "cli")]
pub mod cli;
pub mod scrape;
pub mod workflow;

#[cfg(feature = "cli")]
pub use cli::{ScraperArgs, WorkflowArgs};
pub use scrape::ScrapeConfig;
pub use workflow::WorkflowConfig;

use crate::utils::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use std::path::Path;

static ENV_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

/// 替換環境變數 (例如 ${DATABRICKS_TOKEN})；未設定的變數保持原樣
pub(crate) fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
}

/// 從 TOML 字串解析配置
pub(crate) fn parse_toml<T: DeserializeOwned>(content: &str) -> Result<T> {
    let processed = substitute_env_vars(content);
    toml::from_str(&processed).map_err(|e| EtlError::ConfigValidationError {
        field: "toml_parsing".to_string(),
        message: format!("TOML parsing error: {}", e),
    })
}

/// 從 TOML 檔案載入配置
pub(crate) fn read_toml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
    parse_toml(&content)
}
