//! Baseline Item Repository
//!
//! Baseline rows are written only as a whole set per process, inside the
//! caller's transaction.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use cotiza_models::BaselineItem;

const BASELINE_COLUMNS: &str = "id, process_id, sheet_name, section_path, item_code, description, \
     unit, quantity, unit_price, total_price, reference_quotes, row_number, created_at";

/// Rows of one import share a timestamp, so order comes from the position
/// each row had in the imported set.
fn find_by_process_sql() -> String {
    format!(
        "SELECT {} FROM baseline_items WHERE process_id = $1 ORDER BY import_position",
        BASELINE_COLUMNS
    )
}

pub struct BaselineRepository {
    pool: PgPool,
}

impl BaselineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<BaselineItem>> {
        let row: Option<BaselineRow> = sqlx::query_as(&format!(
            "SELECT {} FROM baseline_items WHERE id = $1",
            BASELINE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch baseline item by ID")?;

        Ok(row.map(Into::into))
    }

    /// Baseline items of a process in import order
    pub async fn find_by_process(&self, process_id: Uuid) -> Result<Vec<BaselineItem>> {
        let rows: Vec<BaselineRow> = sqlx::query_as(&find_by_process_sql())
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch baseline items by process")?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Remove every baseline item of a process; linked quotation items keep
    /// their rows with the baseline reference cleared.
    pub async fn delete_by_process(conn: &mut PgConnection, process_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM baseline_items WHERE process_id = $1")
            .bind(process_id)
            .execute(conn)
            .await
            .context("Failed to delete baseline items")?;

        Ok(result.rows_affected())
    }

    /// Insert one row; `position` is its index in the imported set.
    pub async fn insert(conn: &mut PgConnection, item: &BaselineItem, position: usize) -> Result<()> {
        let reference_quotes = serde_json::to_value(&item.reference_quotes)?;
        let position = i32::try_from(position).context("Baseline import exceeds the position range")?;

        sqlx::query(
            r#"
            INSERT INTO baseline_items
                (id, process_id, sheet_name, section_path, item_code, description, unit,
                 quantity, unit_price, total_price, reference_quotes, row_number, import_position,
                 created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(item.id)
        .bind(item.process_id)
        .bind(&item.sheet_name)
        .bind(&item.section_path)
        .bind(&item.item_code)
        .bind(&item.description)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(&reference_quotes)
        .bind(item.row_number)
        .bind(position)
        .bind(item.created_at)
        .execute(conn)
        .await
        .with_context(|| format!("Failed to insert baseline item at row {}", item.row_number))?;

        Ok(())
    }
}

/// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct BaselineRow {
    id: Uuid,
    process_id: Uuid,
    sheet_name: String,
    section_path: Vec<String>,
    item_code: Option<String>,
    description: String,
    unit: Option<String>,
    quantity: Option<f64>,
    unit_price: Option<f64>,
    total_price: Option<f64>,
    reference_quotes: serde_json::Value,
    row_number: i32,
    created_at: DateTime<Utc>,
}

impl From<BaselineRow> for BaselineItem {
    fn from(row: BaselineRow) -> Self {
        Self {
            id: row.id,
            process_id: row.process_id,
            sheet_name: row.sheet_name,
            section_path: row.section_path,
            item_code: row.item_code,
            description: row.description,
            unit: row.unit,
            quantity: row.quantity,
            unit_price: row.unit_price,
            total_price: row.total_price,
            reference_quotes: serde_json::from_value(row.reference_quotes).unwrap_or_default(),
            row_number: row.row_number,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotiza_models::ReferenceQuote;

    #[test]
    fn test_row_conversion_reads_reference_quotes() {
        let row = BaselineRow {
            id: Uuid::new_v4(),
            process_id: Uuid::new_v4(),
            sheet_name: "Obra".into(),
            section_path: vec!["ESTRUCTURAS".into()],
            item_code: Some("01.01".into()),
            description: "Acero corrugado".into(),
            unit: Some("KG".into()),
            quantity: Some(120.0),
            unit_price: Some(4.5),
            total_price: None,
            reference_quotes: serde_json::json!([{ "provider": "Aceros SAC", "column": 5, "unit_price": 4.2 }]),
            row_number: 5,
            created_at: Utc::now(),
        };

        let item: BaselineItem = row.into();
        assert_eq!(
            item.reference_quotes,
            vec![ReferenceQuote { provider: "Aceros SAC".into(), column: 5, unit_price: 4.2 }]
        );
        assert_eq!(item.line_total(), Some(540.0));
    }

    #[test]
    fn test_process_rows_follow_import_position() {
        let sql = find_by_process_sql();
        assert!(sql.ends_with("ORDER BY import_position"));
        assert!(!sql.contains("created_at,"));
    }

    #[test]
    fn test_malformed_reference_quotes_read_as_empty() {
        let row = BaselineRow {
            id: Uuid::new_v4(),
            process_id: Uuid::new_v4(),
            sheet_name: "Obra".into(),
            section_path: Vec::new(),
            item_code: None,
            description: "Arena".into(),
            unit: None,
            quantity: None,
            unit_price: None,
            total_price: Some(10.0),
            reference_quotes: serde_json::json!({ "unexpected": true }),
            row_number: 2,
            created_at: Utc::now(),
        };

        let item: BaselineItem = row.into();
        assert!(item.reference_quotes.is_empty());
    }
}
