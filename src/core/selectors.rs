use crate::core::wait::PollPolicy;
use crate::utils::error::Result;
use crate::utils::validation::validate_css_selector;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// CSS selectors for the results grid. Defaults match the MUI data grid used
/// by the results site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSelectors {
    pub row: String,
    pub cell: String,
    pub avatar: String,
    pub detail_panel: String,
    pub info_box: String,
    pub info_label: String,
    pub segment_row: String,
    pub expand_button: String,
    pub collapse_button: String,
    pub combobox: String,
    pub year_combobox: String,
    pub option: String,
    pub first_athlete: String,
    pub body: String,
    /// Tried in order when looking for the next-page control.
    pub next_page: Vec<String>,
    /// Text that identifies the event dropdown among other comboboxes.
    pub event_markers: Vec<String>,
}

impl Default for GridSelectors {
    fn default() -> Self {
        Self {
            row: "div[role='row'][data-rowindex]".to_string(),
            cell: "div[role='gridcell']".to_string(),
            avatar: "img[alt]".to_string(),
            detail_panel: "div.MuiDataGrid-detailPanel".to_string(),
            info_box: "div[class*='css-1at62qq']".to_string(),
            info_label: "h6".to_string(),
            segment_row: "div[role='row'][data-id]".to_string(),
            expand_button: "button[aria-label='Expand']".to_string(),
            collapse_button: "button[aria-label='Collapse'], button[aria-expanded='true']"
                .to_string(),
            combobox: "[role='combobox']".to_string(),
            year_combobox: "[aria-label='Year'] [role='combobox']".to_string(),
            option: "[role='option']".to_string(),
            first_athlete: "div[data-rowindex='0'] div[data-field='athlete']".to_string(),
            body: "body".to_string(),
            next_page: vec![
                "button[aria-label='Go to next page']".to_string(),
                "button[aria-label*='next' i]".to_string(),
            ],
            event_markers: vec!["IRONMAN".to_string(), "Championship".to_string()],
        }
    }
}

impl GridSelectors {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("selectors.row", &self.row),
            ("selectors.cell", &self.cell),
            ("selectors.avatar", &self.avatar),
            ("selectors.detail_panel", &self.detail_panel),
            ("selectors.info_box", &self.info_box),
            ("selectors.info_label", &self.info_label),
            ("selectors.segment_row", &self.segment_row),
            ("selectors.expand_button", &self.expand_button),
            ("selectors.collapse_button", &self.collapse_button),
            ("selectors.combobox", &self.combobox),
            ("selectors.year_combobox", &self.year_combobox),
            ("selectors.option", &self.option),
            ("selectors.first_athlete", &self.first_athlete),
            ("selectors.body", &self.body),
        ];
        for (field, selector) in fields {
            validate_css_selector(field, selector)?;
        }
        for selector in &self.next_page {
            validate_css_selector("selectors.next_page", selector)?;
        }
        Ok(())
    }
}

/// Fixed settle delays and polling budgets, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    pub initial_load_ms: u64,
    pub post_select_ms: u64,
    pub dropdown_open_ms: u64,
    pub refresh_poll_interval_ms: u64,
    pub refresh_poll_attempts: u32,
    pub no_signal_settle_ms: u64,
    pub unconfirmed_settle_ms: u64,
    pub dismiss_ms: u64,
    pub scroll_settle_ms: u64,
    pub expand_settle_ms: u64,
    pub collapse_settle_ms: u64,
    pub next_scroll_ms: u64,
    pub next_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            initial_load_ms: 8000,
            post_select_ms: 3000,
            dropdown_open_ms: 2000,
            refresh_poll_interval_ms: 1000,
            refresh_poll_attempts: 15,
            no_signal_settle_ms: 2000,
            unconfirmed_settle_ms: 3000,
            dismiss_ms: 500,
            scroll_settle_ms: 300,
            expand_settle_ms: 1500,
            collapse_settle_ms: 300,
            next_scroll_ms: 500,
            next_settle_ms: 3000,
        }
    }
}

impl Timings {
    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    pub fn refresh_policy(&self) -> PollPolicy {
        PollPolicy::new(
            Self::ms(self.refresh_poll_interval_ms),
            self.refresh_poll_attempts,
        )
    }

    /// All delays zeroed; used by tests and dry runs against local fixtures.
    pub fn immediate() -> Self {
        Self {
            initial_load_ms: 0,
            post_select_ms: 0,
            dropdown_open_ms: 0,
            refresh_poll_interval_ms: 0,
            refresh_poll_attempts: 15,
            no_signal_settle_ms: 0,
            unconfirmed_settle_ms: 0,
            dismiss_ms: 0,
            scroll_settle_ms: 0,
            expand_settle_ms: 0,
            collapse_settle_ms: 0,
            next_scroll_ms: 0,
            next_settle_ms: 0,
        }
    }
}
