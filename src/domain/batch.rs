use crate::utils::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Men,
    #[serde(rename = "F")]
    Women,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gender::Men => write!(f, "M"),
            Gender::Women => write!(f, "F"),
        }
    }
}

/// One yearly results table and the object it is exported to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub year: i32,
    pub gender: Gender,
    pub table: String,
    pub filename: String,
}

impl TableSpec {
    pub fn new(year: i32, gender: Gender, table: &str, filename: &str) -> Self {
        Self {
            year,
            gender,
            table: table.to_string(),
            filename: filename.to_string(),
        }
    }

    /// Entries for one process year, in configured order.
    pub fn for_year(tables: &[TableSpec], year: i32) -> Vec<&TableSpec> {
        tables.iter().filter(|t| t.year == year).collect()
    }
}

/// Full contents of a relational table; `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl TableSnapshot {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header plus one line per row; NULL becomes an empty field.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))?;
        }
        writer
            .into_inner()
            .map_err(|e| crate::utils::error::EtlError::IoError(e.into_error()))
    }
}

/// Run-time parameters supplied by whoever triggers a workflow run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConf {
    #[serde(default)]
    pub process_year: Option<serde_json::Value>,
    #[serde(default)]
    pub run_mode: Option<String>,
}

/// Identity of one workflow run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunContext {
    pub dag_id: String,
    pub run_id: String,
    pub execution_date: NaiveDate,
    pub conf: RunConf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunRequest {
    pub job_id: i64,
    pub idempotency_token: String,
    pub notebook_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    pub run_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunState {
    pub life_cycle_state: String,
    #[serde(default)]
    pub result_state: Option<String>,
    #[serde(default)]
    pub state_message: Option<String>,
}

impl JobRunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.life_cycle_state.as_str(),
            "TERMINATED" | "SKIPPED" | "INTERNAL_ERROR"
        )
    }

    pub fn is_success(&self) -> bool {
        self.life_cycle_state == "TERMINATED" && self.result_state.as_deref() == Some("SUCCESS")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_to_csv() {
        let snapshot = TableSnapshot {
            columns: vec!["rank".to_string(), "athlete_name".to_string(), "bib".to_string()],
            rows: vec![
                vec![Some("1".to_string()), Some("Doe, Jane".to_string()), None],
                vec![Some("2".to_string()), Some("Roe".to_string()), Some("55".to_string())],
            ],
        };

        let csv = String::from_utf8(snapshot.to_csv().unwrap()).unwrap();
        assert_eq!(csv, "rank,athlete_name,bib\n1,\"Doe, Jane\",\n2,Roe,55\n");
    }

    #[test]
    fn test_run_conf_accepts_number_or_string() {
        let conf: RunConf = serde_json::from_str(r#"{"process_year": 2024}"#).unwrap();
        assert_eq!(conf.process_year, Some(serde_json::json!(2024)));
        assert_eq!(conf.run_mode, None);

        let conf: RunConf =
            serde_json::from_str(r#"{"process_year": "2023", "run_mode": "full"}"#).unwrap();
        assert_eq!(conf.process_year, Some(serde_json::json!("2023")));
        assert_eq!(conf.run_mode.as_deref(), Some("full"));
    }

    #[test]
    fn test_job_state() {
        let ok = JobRunState {
            life_cycle_state: "TERMINATED".to_string(),
            result_state: Some("SUCCESS".to_string()),
            state_message: None,
        };
        assert!(ok.is_terminal() && ok.is_success());

        let running = JobRunState {
            life_cycle_state: "RUNNING".to_string(),
            result_state: None,
            state_message: None,
        };
        assert!(!running.is_terminal());
    }
}
