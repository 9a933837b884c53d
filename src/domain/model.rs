use crate::domain::ports::Locator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output column order of every results file.
pub const RESULT_COLUMNS: [&str; 30] = [
    "rank",
    "athlete_name",
    "country",
    "div_rank",
    "gender_rank",
    "overall_rank",
    "designation",
    "bib",
    "division",
    "points",
    "swim_time",
    "swim_time_detail",
    "swim_div_rank",
    "swim_gender_rank",
    "swim_overall_rank",
    "transition_1",
    "transition_1_detail",
    "bike_time",
    "bike_time_detail",
    "bike_div_rank",
    "bike_gender_rank",
    "bike_overall_rank",
    "transition_2",
    "transition_2_detail",
    "run_time",
    "run_time_detail",
    "run_div_rank",
    "run_gender_rank",
    "run_overall_rank",
    "finish_time",
];

/// Token the results grid renders in cells with no data.
pub const PLACEHOLDER: &str = "-";

/// Returns the trimmed value, or `None` for empty and placeholder cells.
pub fn normalize_value(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == PLACEHOLDER {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// One finisher's row on one page of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Position among the page's rendered rows, ghost rows included.
    pub row_index: usize,
    pub fields: BTreeMap<String, String>,
}

impl ResultRecord {
    pub fn new(row_index: usize) -> Self {
        Self {
            row_index,
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Stores a normalized value; empty and placeholder values are dropped.
    pub fn set(&mut self, field: &str, value: &str) {
        if let Some(value) = normalize_value(value) {
            self.fields.insert(field.to_string(), value);
        }
    }

    fn has_value(&self, field: &str) -> bool {
        self.get(field).is_some_and(|v| !v.is_empty())
    }

    /// Rows with neither a rank nor an athlete name are header or ghost rows.
    pub fn is_data_row(&self) -> bool {
        self.has_value("rank") || self.has_value("athlete_name")
    }

    /// Merges expanded-row detail. Values already set by the grid pass win.
    /// Returns the number of fields that were added.
    pub fn merge_detail(&mut self, detail: BTreeMap<String, String>) -> usize {
        let mut added = 0;
        for (key, value) in detail {
            if self.has_value(&key) {
                continue;
            }
            if let Some(value) = normalize_value(&value) {
                self.fields.insert(key, value);
                added += 1;
            }
        }
        added
    }
}

/// Maps grid column identifiers to output field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub columns: Vec<ColumnMapping>,
    /// Column whose avatar image annotation carries the country code.
    pub avatar_column: String,
    /// Avatar annotations that mean "no country".
    pub generic_avatars: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub column: String,
    pub field: String,
}

impl FieldMapping {
    pub fn field_for(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|m| m.column == column)
            .map(|m| m.field.as_str())
    }

    pub fn is_generic_avatar(&self, alt: &str) -> bool {
        self.generic_avatars.iter().any(|g| g == alt)
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        let columns = [
            ("wtc_finishrankoverall", "rank"),
            ("athlete", "athlete_name"),
            ("wtc_swimtimeformatted", "swim_time"),
            ("wtc_transition1timeformatted", "transition_1"),
            ("wtc_biketimeformatted", "bike_time"),
            ("wtc_transitiontime2formatted", "transition_2"),
            ("wtc_runtimeformatted", "run_time"),
            ("wtc_finishtimeformatted", "finish_time"),
        ]
        .into_iter()
        .map(|(column, field)| ColumnMapping {
            column: column.to_string(),
            field: field.to_string(),
        })
        .collect();

        Self {
            columns,
            avatar_column: "athlete".to_string(),
            generic_avatars: vec!["user-avatar".to_string(), "no-avatar".to_string()],
        }
    }
}

/// One results subset scraped into its own file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    pub key: String,
    pub display_name: String,
    /// Dropdown label to select before scraping; `None` keeps the default event.
    pub filter: Option<String>,
}

/// Progress of the pagination loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub page: u32,
    pub total_results: usize,
    pub next_control: Option<Locator>,
}

impl PageState {
    pub fn first() -> Self {
        Self {
            page: 1,
            total_results: 0,
            next_control: None,
        }
    }
}

/// Target label of an event switch and the value used to confirm the grid refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSelection {
    pub label: String,
    pub prior_first_athlete: Option<String>,
}
