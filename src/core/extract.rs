use crate::core::selectors::GridSelectors;
use crate::domain::model::{FieldMapping, ResultRecord};
use crate::utils::error::{EtlError, Result};
use scraper::{ElementRef, Html, Selector};

/// Reads one record per rendered grid row out of a page snapshot.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    mapping: FieldMapping,
    row: Selector,
    cell: Selector,
    avatar: Selector,
}

impl FieldExtractor {
    pub fn new(mapping: FieldMapping, selectors: &GridSelectors) -> Result<Self> {
        Ok(Self {
            mapping,
            row: compile("selectors.row", &selectors.row)?,
            cell: compile("selectors.cell", &selectors.cell)?,
            avatar: compile("selectors.avatar", &selectors.avatar)?,
        })
    }

    /// Rows in document order. Header and ghost rows are dropped, so
    /// `row_index` keeps each record's position among all matched rows.
    pub fn extract_page(&self, html: &str) -> Vec<ResultRecord> {
        let document = Html::parse_document(html);

        document
            .select(&self.row)
            .enumerate()
            .filter_map(|(position, row)| {
                let record = self.extract_row(row, position);
                record.is_data_row().then_some(record)
            })
            .collect()
    }

    fn extract_row(&self, row: ElementRef<'_>, row_index: usize) -> ResultRecord {
        let mut record = ResultRecord::new(row_index);

        for cell in row.select(&self.cell) {
            let column = cell.value().attr("data-field").unwrap_or_default();

            if let Some(field) = self.mapping.field_for(column) {
                record.set(field, &cell_text(cell));
            }

            if column == self.mapping.avatar_column {
                if let Some(country) = self.country_from_avatar(cell) {
                    record.fields.insert("country".to_string(), country);
                }
            }
        }

        record
    }

    fn country_from_avatar(&self, cell: ElementRef<'_>) -> Option<String> {
        let alt = cell.select(&self.avatar).next()?.value().attr("alt")?.trim();
        if alt.is_empty() || self.mapping.is_generic_avatar(alt) {
            return None;
        }
        Some(alt.to_uppercase())
    }
}

pub(crate) fn compile(field: &str, selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| EtlError::InvalidConfigValueError {
        field: field.to_string(),
        value: selector.to_string(),
        reason: format!("Invalid CSS selector: {:?}", e),
    })
}

/// Text nodes stripped and concatenated, the way the grid shows a cell.
pub(crate) fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whole-document text with nodes separated by spaces.
pub(crate) fn page_text(document: &Html) -> String {
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
