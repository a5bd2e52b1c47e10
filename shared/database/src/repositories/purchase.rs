//! Purchase Order and Delivery Repository
//!
//! Fulfillment records are owned by the purchasing workflow; the engine only
//! reads them for progress reports.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use cotiza_models::{PurchaseDeliveryItem, PurchaseOrderLine};

pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_order_lines(&self, process_id: Uuid) -> Result<Vec<PurchaseOrderLine>> {
        sqlx::query_as(
            r#"
            SELECT id, process_id, baseline_item_id, quotation_item_id, description, unit,
                   quantity, unit_price, created_at
            FROM purchase_order_lines
            WHERE process_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch purchase order lines")
    }

    pub async fn find_delivery_items(&self, process_id: Uuid) -> Result<Vec<PurchaseDeliveryItem>> {
        sqlx::query_as(
            r#"
            SELECT id, process_id, order_line_id, baseline_item_id, description, unit,
                   quantity, received_at
            FROM purchase_delivery_items
            WHERE process_id = $1
            ORDER BY received_at
            "#,
        )
        .bind(process_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch purchase delivery items")
    }

    pub async fn create_order_line(&self, line: &PurchaseOrderLine) -> Result<PurchaseOrderLine> {
        sqlx::query_as(
            r#"
            INSERT INTO purchase_order_lines
                (id, process_id, baseline_item_id, quotation_item_id, description, unit,
                 quantity, unit_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, process_id, baseline_item_id, quotation_item_id, description, unit,
                      quantity, unit_price, created_at
            "#,
        )
        .bind(line.id)
        .bind(line.process_id)
        .bind(line.baseline_item_id)
        .bind(line.quotation_item_id)
        .bind(&line.description)
        .bind(&line.unit)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.created_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create purchase order line")
    }

    pub async fn create_delivery_item(&self, item: &PurchaseDeliveryItem) -> Result<PurchaseDeliveryItem> {
        sqlx::query_as(
            r#"
            INSERT INTO purchase_delivery_items
                (id, process_id, order_line_id, baseline_item_id, description, unit,
                 quantity, received_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, process_id, order_line_id, baseline_item_id, description, unit,
                      quantity, received_at
            "#,
        )
        .bind(item.id)
        .bind(item.process_id)
        .bind(item.order_line_id)
        .bind(item.baseline_item_id)
        .bind(&item.description)
        .bind(&item.unit)
        .bind(item.quantity)
        .bind(item.received_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create purchase delivery item")
    }
}
