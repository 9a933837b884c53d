use crate::core::extract::{cell_text, compile, page_text};
use crate::core::selectors::{GridSelectors, Timings};
use crate::domain::model::normalize_value;
use crate::domain::ports::{BrowserSession, Clock, Locator};
use crate::utils::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeMap;

pub type DetailFields = BTreeMap<String, String>;

/// Summary labels in match order. "div rank" must be tried before "division".
const SUMMARY_LABELS: [(&str, &str); 7] = [
    ("div rank", "div_rank"),
    ("gender rank", "gender_rank"),
    ("overall rank", "overall_rank"),
    ("designation", "designation"),
    ("bib", "bib"),
    ("division", "division"),
    ("points", "points"),
];

const SEGMENTS: [&str; 3] = ["swim", "bike", "run"];

static TEXT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("div_rank", r"(\d+)\s*Div\s*Rank"),
        ("gender_rank", r"(\d+)\s*Gender\s*Rank"),
        ("overall_rank", r"(\d+)\s*Overall\s*Rank"),
        ("designation", r"(?i)(Finisher|DNF|DNS|DQ|DSQ)\s*Designation"),
        ("bib", r"(\d+)\s*Bib\b"),
        ("division", r"([FM](?:PRO|\d{2}-\d{2}))\s*Division"),
        ("points", r"(\d+)\s*Points"),
    ]
    .into_iter()
    .map(|(field, pattern)| {
        (
            field,
            Regex::new(pattern).expect("Failed to compile detail text pattern"),
        )
    })
    .collect()
});

fn insert_normalized(fields: &mut DetailFields, key: String, raw: &str) {
    if let Some(value) = normalize_value(raw) {
        fields.insert(key, value);
    }
}

/// Compiled selectors for the expanded detail panel.
#[derive(Debug, Clone)]
pub struct DetailParser {
    panel: Selector,
    info_box: Selector,
    info_label: Selector,
    segment_row: Selector,
    cell: Selector,
}

impl DetailParser {
    pub fn new(selectors: &GridSelectors) -> Result<Self> {
        Ok(Self {
            panel: compile("selectors.detail_panel", &selectors.detail_panel)?,
            info_box: compile("selectors.info_box", &selectors.info_box)?,
            info_label: compile("selectors.info_label", &selectors.info_label)?,
            segment_row: compile("selectors.segment_row", &selectors.segment_row)?,
            cell: compile("selectors.cell", &selectors.cell)?,
        })
    }

    /// Value/label pairs shown at the top of the detail panel.
    pub fn parse_panel_summary(&self, document: &Html) -> DetailFields {
        let mut fields = DetailFields::new();
        let Some(panel) = document.select(&self.panel).next() else {
            return fields;
        };

        for info_box in panel.select(&self.info_box) {
            let headings: Vec<_> = info_box.select(&self.info_label).collect();
            if headings.len() < 2 {
                continue;
            }
            let value = cell_text(headings[0]);
            let label = cell_text(headings[1]).to_lowercase();

            if let Some((_, field)) = SUMMARY_LABELS.iter().find(|(l, _)| label.contains(l)) {
                insert_normalized(&mut fields, field.to_string(), &value);
            }
        }

        fields
    }

    /// Per-segment sub-table. Transition rows only carry a time.
    pub fn parse_segment_table(&self, document: &Html) -> DetailFields {
        let mut fields = DetailFields::new();
        let Some(panel) = document.select(&self.panel).next() else {
            return fields;
        };

        for row in panel.select(&self.segment_row) {
            let segment = row.value().attr("data-id").unwrap_or_default().to_lowercase();
            let cells: Vec<String> = row.select(&self.cell).map(cell_text).collect();
            if cells.len() < 5 {
                continue;
            }

            if SEGMENTS.contains(&segment.as_str()) {
                insert_normalized(&mut fields, format!("{}_time_detail", segment), &cells[1]);
                insert_normalized(&mut fields, format!("{}_div_rank", segment), &cells[2]);
                insert_normalized(&mut fields, format!("{}_gender_rank", segment), &cells[3]);
                insert_normalized(&mut fields, format!("{}_overall_rank", segment), &cells[4]);
            } else if segment.contains("transition") {
                let key = segment.replace(' ', "_");
                insert_normalized(&mut fields, format!("{}_detail", key), &cells[1]);
            }
        }

        fields
    }

    /// Everything the expanded page shows about the row, plus whether the
    /// lower-confidence whole-page text scan had to fill in summary fields.
    pub fn parse_detail(&self, html: &str) -> (DetailFields, bool) {
        let document = Html::parse_document(html);

        let mut fields = self.parse_panel_summary(&document);
        let mut used_text_fallback = false;

        if !fields.contains_key("div_rank") {
            for (key, value) in parse_text_fallback(&page_text(&document)) {
                if !fields.contains_key(&key) {
                    fields.insert(key, value);
                    used_text_fallback = true;
                }
            }
        }

        fields.extend(self.parse_segment_table(&document));
        (fields, used_text_fallback)
    }
}

/// Scans free page text for "<value> <label>" pairs when the panel markup
/// could not be found where expected.
pub fn parse_text_fallback(text: &str) -> DetailFields {
    let mut fields = DetailFields::new();
    for (field, pattern) in TEXT_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(text) {
            insert_normalized(&mut fields, field.to_string(), &captures[1]);
        }
    }
    fields
}

/// Ways of opening a row's detail panel, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandTrigger {
    ExpandControl,
    RowClick,
    ForcedClick,
}

pub const EXPAND_STRATEGIES: [ExpandTrigger; 3] = [
    ExpandTrigger::ExpandControl,
    ExpandTrigger::RowClick,
    ExpandTrigger::ForcedClick,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDetail {
    pub fields: DetailFields,
    pub trigger: Option<ExpandTrigger>,
    pub used_text_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailOutcome {
    /// The page renders fewer rows than the requested index.
    RowMissing { index: usize, rendered: usize },
    /// Expansion was attempted but nothing could be parsed.
    NoDetail { trigger: Option<ExpandTrigger> },
    Found(RowDetail),
    Failed { reason: String },
}

impl DetailOutcome {
    pub fn fields(&self) -> Option<&DetailFields> {
        match self {
            DetailOutcome::Found(detail) => Some(&detail.fields),
            _ => None,
        }
    }

    pub fn into_fields(self) -> DetailFields {
        match self {
            DetailOutcome::Found(detail) => detail.fields,
            _ => DetailFields::new(),
        }
    }
}

/// Opens one row at a time, reads its detail panel and closes it again.
pub struct DetailExpander<'a, S: BrowserSession + ?Sized, C: Clock + ?Sized> {
    session: &'a S,
    clock: &'a C,
    selectors: &'a GridSelectors,
    timings: &'a Timings,
    parser: DetailParser,
}

impl<'a, S: BrowserSession + ?Sized, C: Clock + ?Sized> DetailExpander<'a, S, C> {
    pub fn new(
        session: &'a S,
        clock: &'a C,
        selectors: &'a GridSelectors,
        timings: &'a Timings,
    ) -> Result<Self> {
        Ok(Self {
            session,
            clock,
            selectors,
            timings,
            parser: DetailParser::new(selectors)?,
        })
    }

    /// Never fails: browser errors become `DetailOutcome::Failed`.
    pub async fn expand(&self, index: usize) -> DetailOutcome {
        match self.try_expand(index).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("Row {} expansion failed: {}", index, e);
                DetailOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn try_expand(&self, index: usize) -> Result<DetailOutcome> {
        self.session.scroll_to_top().await?;
        self.clock.sleep(Timings::ms(self.timings.scroll_settle_ms)).await;

        let rendered = self.session.count(&self.selectors.row).await?;
        if index >= rendered {
            return Ok(DetailOutcome::RowMissing { index, rendered });
        }

        let row = Locator::nth(&self.selectors.row, index);
        self.session.scroll_into_view(&row).await?;
        self.clock.sleep(Timings::ms(self.timings.scroll_settle_ms)).await;

        let trigger = self.trigger_expansion(&row).await;
        self.clock.sleep(Timings::ms(self.timings.expand_settle_ms)).await;

        let html = self.session.page_source().await?;
        let (fields, used_text_fallback) = self.parser.parse_detail(&html);

        self.collapse(&row).await;

        if fields.is_empty() {
            return Ok(DetailOutcome::NoDetail { trigger });
        }
        if used_text_fallback {
            tracing::debug!("Row {} summary read from page text", index);
        }
        Ok(DetailOutcome::Found(RowDetail {
            fields,
            trigger,
            used_text_fallback,
        }))
    }

    async fn trigger_expansion(&self, row: &Locator) -> Option<ExpandTrigger> {
        for strategy in EXPAND_STRATEGIES {
            let attempt = match strategy {
                ExpandTrigger::ExpandControl => {
                    self.session
                        .click(&row.within(&self.selectors.expand_button))
                        .await
                }
                ExpandTrigger::RowClick => self.session.click(row).await,
                ExpandTrigger::ForcedClick => self.session.force_click(row).await,
            };
            match attempt {
                Ok(()) => return Some(strategy),
                Err(e) => tracing::trace!("{:?} on {} did not register: {}", strategy, row, e),
            }
        }
        None
    }

    async fn collapse(&self, row: &Locator) {
        let collapse = row.within(&self.selectors.collapse_button);
        let closed = match self.session.click(&collapse).await {
            Ok(()) => true,
            Err(_) => self.session.click(row).await.is_ok(),
        };
        if closed {
            self.clock.sleep(Timings::ms(self.timings.collapse_settle_ms)).await;
        }
    }
}
