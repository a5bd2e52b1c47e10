//! Quotation Repository
//!
//! Quotations and their items. Item writes always happen inside a transaction
//! holding the quotation's advisory lock, so two imports of one quotation
//! never interleave.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use cotiza_models::{Quotation, QuotationItem, QuotationTotals};

const QUOTATION_COLUMNS: &str = "id, process_id, supplier_name, supplier_tax_id, currency, exchange_rate, \
     total_amount, total_amount_pen, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, quotation_id, baseline_item_id, material_id, item_code, description, \
     offered_description, brand, unit, normalized_unit, unit_converted, quantity, unit_price, \
     total_price, currency, normalized_price, match_score, source_sheet, source_row, is_manual, \
     created_at, updated_at";

pub struct QuotationRepository {
    pool: PgPool,
}

impl QuotationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Quotation>> {
        sqlx::query_as(&format!("SELECT {} FROM quotations WHERE id = $1", QUOTATION_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch quotation by ID")
    }

    pub async fn find_by_process(&self, process_id: Uuid) -> Result<Vec<Quotation>> {
        sqlx::query_as(&format!(
            "SELECT {} FROM quotations WHERE process_id = $1 ORDER BY created_at",
            QUOTATION_COLUMNS
        ))
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch quotations by process")
    }

    pub async fn find_items(&self, quotation_id: Uuid) -> Result<Vec<QuotationItem>> {
        sqlx::query_as(&format!(
            "SELECT {} FROM quotation_items WHERE quotation_id = $1 ORDER BY source_sheet, source_row, created_at",
            ITEM_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch quotation items")
    }

    /// Same as [`find_items`](Self::find_items), inside the caller's transaction.
    pub async fn find_items_in(conn: &mut PgConnection, quotation_id: Uuid) -> Result<Vec<QuotationItem>> {
        sqlx::query_as(&format!(
            "SELECT {} FROM quotation_items WHERE quotation_id = $1 ORDER BY source_sheet, source_row, created_at",
            ITEM_COLUMNS
        ))
        .bind(quotation_id)
        .fetch_all(conn)
        .await
        .context("Failed to fetch quotation items")
    }

    /// Serialize writers of one quotation until the transaction ends.
    pub async fn lock(conn: &mut PgConnection, quotation_id: Uuid) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(quotation_id)
            .execute(conn)
            .await
            .context("Failed to acquire quotation lock")?;
        Ok(())
    }

    /// Insert or update the quotation header, totals included.
    pub async fn upsert(conn: &mut PgConnection, quotation: &Quotation) -> Result<Quotation> {
        sqlx::query_as(&format!(
            r#"
            INSERT INTO quotations
                (id, process_id, supplier_name, supplier_tax_id, currency, exchange_rate,
                 total_amount, total_amount_pen, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE SET
                supplier_name = EXCLUDED.supplier_name,
                supplier_tax_id = EXCLUDED.supplier_tax_id,
                currency = EXCLUDED.currency,
                exchange_rate = EXCLUDED.exchange_rate,
                total_amount = EXCLUDED.total_amount,
                total_amount_pen = EXCLUDED.total_amount_pen,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            QUOTATION_COLUMNS
        ))
        .bind(quotation.id)
        .bind(quotation.process_id)
        .bind(&quotation.supplier_name)
        .bind(&quotation.supplier_tax_id)
        .bind(&quotation.currency)
        .bind(quotation.exchange_rate)
        .bind(quotation.total_amount)
        .bind(quotation.total_amount_pen)
        .bind(quotation.created_at)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .context("Failed to save quotation")
    }

    pub async fn update_totals(
        conn: &mut PgConnection,
        quotation_id: Uuid,
        totals: QuotationTotals,
    ) -> Result<Quotation> {
        sqlx::query_as(&format!(
            r#"
            UPDATE quotations SET
                total_amount = $2,
                total_amount_pen = $3,
                updated_at = $4
            WHERE id = $1
            RETURNING {}
            "#,
            QUOTATION_COLUMNS
        ))
        .bind(quotation_id)
        .bind(totals.total_amount)
        .bind(totals.total_amount_base)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .context("Failed to update quotation totals")
    }

    pub async fn delete_items(conn: &mut PgConnection, quotation_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM quotation_items WHERE quotation_id = $1")
            .bind(quotation_id)
            .execute(conn)
            .await
            .context("Failed to delete quotation items")?;

        Ok(result.rows_affected())
    }

    /// Insert an item, or overwrite the existing item with the same id.
    pub async fn upsert_item(conn: &mut PgConnection, item: &QuotationItem) -> Result<QuotationItem> {
        sqlx::query_as(&format!(
            r#"
            INSERT INTO quotation_items
                ({columns})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22)
            ON CONFLICT (id) DO UPDATE SET
                baseline_item_id = EXCLUDED.baseline_item_id,
                material_id = EXCLUDED.material_id,
                item_code = EXCLUDED.item_code,
                description = EXCLUDED.description,
                offered_description = EXCLUDED.offered_description,
                brand = EXCLUDED.brand,
                unit = EXCLUDED.unit,
                normalized_unit = EXCLUDED.normalized_unit,
                unit_converted = EXCLUDED.unit_converted,
                quantity = EXCLUDED.quantity,
                unit_price = EXCLUDED.unit_price,
                total_price = EXCLUDED.total_price,
                currency = EXCLUDED.currency,
                normalized_price = EXCLUDED.normalized_price,
                match_score = EXCLUDED.match_score,
                is_manual = EXCLUDED.is_manual,
                updated_at = EXCLUDED.updated_at
            RETURNING {columns}
            "#,
            columns = ITEM_COLUMNS
        ))
        .bind(item.id)
        .bind(item.quotation_id)
        .bind(item.baseline_item_id)
        .bind(item.material_id)
        .bind(&item.item_code)
        .bind(&item.description)
        .bind(&item.offered_description)
        .bind(&item.brand)
        .bind(&item.unit)
        .bind(&item.normalized_unit)
        .bind(item.unit_converted)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(&item.currency)
        .bind(item.normalized_price)
        .bind(item.match_score)
        .bind(&item.source_sheet)
        .bind(item.source_row)
        .bind(item.is_manual)
        .bind(item.created_at)
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .with_context(|| format!("Failed to save quotation item {}", item.id))
    }
}
