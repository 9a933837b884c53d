pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{DatabricksClient, LocalStorage};
pub use config::{ScrapeConfig, WorkflowConfig};
pub use self::core::{etl::EtlEngine, scrape::scrape_event, sink::CsvCheckpointSink};
pub use utils::error::{EtlError, Result};
