use crate::config::{ScrapeConfig, WorkflowConfig};
use crate::domain::batch::RunConf;
use crate::utils::error::{EtlError, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "ironman-scraper")]
#[command(about = "Scrapes IRONMAN World Championship results into one CSV per event")]
pub struct ScraperArgs {
    /// TOML file with events, selectors and timings
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long)]
    pub output_dir: Option<String>,

    /// Event key to scrape (repeatable); all configured events when omitted
    #[arg(long = "event", short)]
    pub events: Vec<String>,

    #[arg(long, help = "Skip per-row detail expansion")]
    pub no_expand: bool,

    #[arg(long, help = "Run the browser without a window")]
    pub headless: bool,

    #[arg(long)]
    pub max_pages: Option<u32>,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,
}

impl ScraperArgs {
    /// Loads the config file (or defaults) and applies command-line overrides.
    pub fn resolve(&self) -> Result<ScrapeConfig> {
        let mut config = match &self.config {
            Some(path) => ScrapeConfig::from_file(path)?,
            None => ScrapeConfig::default(),
        };

        if let Some(url) = &self.url {
            config.url = url.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if self.no_expand {
            config.expand_details = false;
        }
        if self.headless {
            config.headless = true;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "ironman-workflow")]
#[command(about = "Exports yearly results tables to object storage and triggers the batch job")]
pub struct WorkflowArgs {
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Year to process; required unless given in --conf
    #[arg(long)]
    pub process_year: Option<String>,

    #[arg(long)]
    pub run_mode: Option<String>,

    /// Run parameters as JSON, e.g. '{"process_year": 2024}'
    #[arg(long)]
    pub conf: Option<String>,

    #[arg(long)]
    pub run_id: Option<String>,

    #[arg(long, help = "Validate configuration and print the plan without running")]
    pub dry_run: bool,

    #[arg(long, help = "Emit JSON log lines")]
    pub json_logs: bool,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,
}

impl WorkflowArgs {
    pub fn load_config(&self) -> Result<WorkflowConfig> {
        match &self.config {
            Some(path) => WorkflowConfig::from_file(path),
            None => WorkflowConfig::from_toml_str(""),
        }
    }

    /// `--conf` JSON first, then the dedicated flags on top.
    pub fn run_conf(&self) -> Result<RunConf> {
        let mut conf = match &self.conf {
            Some(raw) => serde_json::from_str::<RunConf>(raw).map_err(|e| {
                EtlError::InvalidConfigValueError {
                    field: "conf".to_string(),
                    value: raw.clone(),
                    reason: format!("Run parameters must be a JSON object: {}", e),
                }
            })?,
            None => RunConf::default(),
        };

        if let Some(year) = &self.process_year {
            conf.process_year = Some(serde_json::Value::String(year.clone()));
        }
        if let Some(mode) = &self.run_mode {
            conf.run_mode = Some(mode.clone());
        }
        Ok(conf)
    }
}
