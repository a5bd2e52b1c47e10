//! Quotation Process Repository
//!
//! Uses runtime SQL queries (unchecked) to avoid requiring DATABASE_URL at compile time.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use cotiza_models::QuotationProcess;

pub struct ProcessRepository {
    pool: PgPool,
}

impl ProcessRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find process by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<QuotationProcess>> {
        sqlx::query_as(
            r#"
            SELECT id, name, base_currency, exchange_rate, target_margin_pct,
                   created_at, updated_at
            FROM quotation_processes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch quotation process by ID")
    }

    pub async fn find_all(&self) -> Result<Vec<QuotationProcess>> {
        sqlx::query_as(
            r#"
            SELECT id, name, base_currency, exchange_rate, target_margin_pct,
                   created_at, updated_at
            FROM quotation_processes
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch quotation processes")
    }

    /// Insert or update a process
    pub async fn save(&self, process: &QuotationProcess) -> Result<QuotationProcess> {
        sqlx::query_as(
            r#"
            INSERT INTO quotation_processes
                (id, name, base_currency, exchange_rate, target_margin_pct, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                base_currency = EXCLUDED.base_currency,
                exchange_rate = EXCLUDED.exchange_rate,
                target_margin_pct = EXCLUDED.target_margin_pct,
                updated_at = EXCLUDED.updated_at
            RETURNING id, name, base_currency, exchange_rate, target_margin_pct,
                      created_at, updated_at
            "#,
        )
        .bind(process.id)
        .bind(&process.name)
        .bind(&process.base_currency)
        .bind(process.exchange_rate)
        .bind(process.target_margin_pct)
        .bind(process.created_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .context("Failed to save quotation process")
    }

    /// Delete a process; baseline items and quotations cascade.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM quotation_processes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete quotation process")?;

        Ok(result.rows_affected() > 0)
    }
}
