use crate::domain::batch::TableSnapshot;
use crate::domain::ports::TableSource;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Reads whole tables from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgTableSource {
    pool: PgPool,
}

fn db_error(context: &str, e: sqlx::Error) -> EtlError {
    EtlError::DatabaseError {
        message: format!("{}: {}", context, e),
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One `row_to_json` object laid out in column order. Scalars keep their
/// JSON text; NULL stays `None`.
pub(crate) fn json_row_to_cells(columns: &[String], row: &Value) -> Vec<Option<String>> {
    columns
        .iter()
        .map(|column| match row.get(column) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        })
        .collect()
}

impl PgTableSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;
        Ok(Self::new(pool))
    }

    async fn columns(&self, table: &str) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT column_name::text FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error(&format!("Failed to read columns of {}", table), e))
    }
}

#[async_trait]
impl TableSource for PgTableSource {
    async fn fetch_table(&self, table: &str) -> Result<TableSnapshot> {
        let columns = self.columns(table).await?;
        if columns.is_empty() {
            return Err(EtlError::DatabaseError {
                message: format!("Table {} does not exist", table),
            });
        }

        let sql = format!("SELECT row_to_json(t)::text FROM {} t", quote_ident(table));
        tracing::debug!("Executing: {}", sql);

        let raw_rows = sqlx::query_scalar::<_, String>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error(&format!("Failed to read {}", table), e))?;

        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            let value: Value = serde_json::from_str(&raw)?;
            rows.push(json_row_to_cells(&columns, &value));
        }

        Ok(TableSnapshot { columns, rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("2024_men"), "\"2024_men\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn test_json_row_to_cells() {
        let columns = vec![
            "rank".to_string(),
            "athlete_name".to_string(),
            "points".to_string(),
            "bib".to_string(),
        ];
        let row = json!({"rank": 1, "athlete_name": "Lucy Charles-Barclay", "points": null});
        assert_eq!(
            json_row_to_cells(&columns, &row),
            vec![
                Some("1".to_string()),
                Some("Lucy Charles-Barclay".to_string()),
                None,
                None
            ]
        );
    }
}
