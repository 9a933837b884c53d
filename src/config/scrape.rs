use crate::core::paginate::PaginationOptions;
use crate::core::selectors::{GridSelectors, Timings};
use crate::domain::model::{EventSpec, FieldMapping};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const KONA_RESULTS_URL: &str =
    "https://labs-v2.competitor.com/results/event/e798aa20-f278-e111-b16a-005056956277_Kona";

/// Scraper settings. Every section is optional in the file; missing values
/// fall back to the Kona deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub url: String,
    pub output_dir: String,
    /// `{key}` is replaced by the lower-cased event key.
    pub file_template: String,
    pub expand_details: bool,
    pub max_pages: u32,
    pub headless: bool,
    pub events: Vec<EventSpec>,
    pub mapping: FieldMapping,
    pub selectors: GridSelectors,
    pub timings: Timings,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            url: KONA_RESULTS_URL.to_string(),
            output_dir: ".".to_string(),
            file_template: "ironman_kona_{key}_complete_results.csv".to_string(),
            expand_details: true,
            max_pages: 1000,
            headless: false,
            events: default_events(),
            mapping: FieldMapping::default(),
            selectors: GridSelectors::default(),
            timings: Timings::default(),
        }
    }
}

fn default_events() -> Vec<EventSpec> {
    let championship = |year: u32, field: &str| format!("{} IRONMAN World Championship - {}", year, field);

    let mut events = vec![EventSpec {
        key: "2025_Women".to_string(),
        display_name: championship(2025, "Women"),
        filter: None,
    }];
    for (year, field) in [(2025, "Men"), (2024, "Women"), (2024, "Men"), (2023, "Women"), (2023, "Men")] {
        let label = championship(year, field);
        events.push(EventSpec {
            key: format!("{}_{}", year, field),
            display_name: label.clone(),
            filter: Some(label),
        });
    }
    events
}

impl ScrapeConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        super::read_toml(path)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        super::parse_toml(content)
    }

    pub fn output_path_for(&self, event: &EventSpec) -> PathBuf {
        let filename = self
            .file_template
            .replace("{key}", &event.key.to_lowercase());
        Path::new(&self.output_dir).join(filename)
    }

    /// Configured events, narrowed to `keys` (case-insensitive) when any are given.
    pub fn selected_events(&self, keys: &[String]) -> Result<Vec<EventSpec>> {
        if keys.is_empty() {
            return Ok(self.events.clone());
        }

        let mut selected = Vec::with_capacity(keys.len());
        for key in keys {
            let event = self
                .events
                .iter()
                .find(|e| e.key.eq_ignore_ascii_case(key))
                .ok_or_else(|| EtlError::InvalidConfigValueError {
                    field: "event".to_string(),
                    value: key.clone(),
                    reason: format!(
                        "Unknown event. Known events: {}",
                        self.events
                            .iter()
                            .map(|e| e.key.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                })?;
            selected.push(event.clone());
        }
        Ok(selected)
    }

    pub fn pagination_options(&self) -> PaginationOptions {
        PaginationOptions {
            selectors: self.selectors.clone(),
            timings: self.timings.clone(),
            expand_details: self.expand_details,
            max_pages: self.max_pages,
        }
    }
}

impl Validate for ScrapeConfig {
    fn validate(&self) -> Result<()> {
        validate_url("url", &self.url)?;
        validate_path("output_dir", &self.output_dir)?;
        validate_non_empty_string("file_template", &self.file_template)?;
        if !self.file_template.contains("{key}") {
            return Err(EtlError::InvalidConfigValueError {
                field: "file_template".to_string(),
                value: self.file_template.clone(),
                reason: "Template must contain {key} so each event gets its own file".to_string(),
            });
        }
        validate_range("max_pages", self.max_pages, 1, 100_000)?;

        if self.events.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "events".to_string(),
            });
        }
        for (i, event) in self.events.iter().enumerate() {
            validate_non_empty_string(&format!("events[{}].key", i), &event.key)?;
            validate_non_empty_string(&format!("events[{}].display_name", i), &event.display_name)?;
        }

        if self.mapping.columns.is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "mapping.columns".to_string(),
            });
        }

        self.selectors.validate()?;

        tracing::debug!("✅ Scrape configuration validation passed");
        Ok(())
    }
}
