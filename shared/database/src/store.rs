//! Persistence port of the quotation engine.
//!
//! Every mutation is atomic: baseline and quotation item sets are replaced
//! wholesale, and quotation totals are written in the same transaction as
//! the items they sum.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use cotiza_models::{
    BaselineItem, PurchaseDeliveryItem, PurchaseOrderLine, Quotation, QuotationItem,
    QuotationProcess, QuotationTotals,
};

use crate::repositories::{
    BaselineRepository, ProcessRepository, PurchaseRepository, QuotationRepository,
};

/// Recomputes a quotation's totals from its complete item list.
pub type TotalsFn = dyn Fn(&[QuotationItem]) -> QuotationTotals + Send + Sync;

#[async_trait]
pub trait QuotationStore: Send + Sync {
    async fn get_process(&self, id: Uuid) -> Result<Option<QuotationProcess>>;

    async fn save_process(&self, process: QuotationProcess) -> Result<QuotationProcess>;

    /// Remove a process with its baseline, quotations, items and purchase
    /// records. Returns false when the process does not exist.
    async fn delete_process(&self, id: Uuid) -> Result<bool>;

    async fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>>;

    async fn list_quotations(&self, process_id: Uuid) -> Result<Vec<Quotation>>;

    async fn list_baseline_items(&self, process_id: Uuid) -> Result<Vec<BaselineItem>>;

    async fn get_baseline_item(&self, id: Uuid) -> Result<Option<BaselineItem>>;

    /// Delete the process's baseline and insert `items` in one unit.
    async fn replace_baseline_items(
        &self,
        process_id: Uuid,
        items: Vec<BaselineItem>,
    ) -> Result<Vec<BaselineItem>>;

    async fn list_quotation_items(&self, quotation_id: Uuid) -> Result<Vec<QuotationItem>>;

    /// Save the quotation header and replace all of its items in one unit.
    /// Concurrent calls for the same quotation are serialized.
    async fn replace_quotation_items(
        &self,
        quotation: Quotation,
        items: Vec<QuotationItem>,
    ) -> Result<(Quotation, Vec<QuotationItem>)>;

    /// Insert or overwrite one item and rewrite the quotation totals from the
    /// full item list, in one unit.
    async fn save_quotation_item(
        &self,
        item: QuotationItem,
        totals: &TotalsFn,
    ) -> Result<(QuotationItem, Quotation)>;

    async fn list_order_lines(&self, process_id: Uuid) -> Result<Vec<PurchaseOrderLine>>;

    async fn list_delivery_items(&self, process_id: Uuid) -> Result<Vec<PurchaseDeliveryItem>>;
}

/// PostgreSQL implementation of the store
pub struct PgQuotationStore {
    pool: PgPool,
    processes: ProcessRepository,
    baseline: BaselineRepository,
    quotations: QuotationRepository,
    purchases: PurchaseRepository,
}

impl PgQuotationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processes: ProcessRepository::new(pool.clone()),
            baseline: BaselineRepository::new(pool.clone()),
            quotations: QuotationRepository::new(pool.clone()),
            purchases: PurchaseRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QuotationStore for PgQuotationStore {
    async fn get_process(&self, id: Uuid) -> Result<Option<QuotationProcess>> {
        self.processes.find_by_id(id).await
    }

    async fn save_process(&self, process: QuotationProcess) -> Result<QuotationProcess> {
        self.processes.save(&process).await
    }

    async fn delete_process(&self, id: Uuid) -> Result<bool> {
        self.processes.delete(id).await
    }

    async fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>> {
        self.quotations.find_by_id(id).await
    }

    async fn list_quotations(&self, process_id: Uuid) -> Result<Vec<Quotation>> {
        self.quotations.find_by_process(process_id).await
    }

    async fn list_baseline_items(&self, process_id: Uuid) -> Result<Vec<BaselineItem>> {
        self.baseline.find_by_process(process_id).await
    }

    async fn get_baseline_item(&self, id: Uuid) -> Result<Option<BaselineItem>> {
        self.baseline.find_by_id(id).await
    }

    async fn replace_baseline_items(
        &self,
        process_id: Uuid,
        items: Vec<BaselineItem>,
    ) -> Result<Vec<BaselineItem>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(process_id)
            .execute(&mut *tx)
            .await
            .context("Failed to acquire process lock")?;

        let removed = BaselineRepository::delete_by_process(&mut tx, process_id).await?;
        for (position, item) in items.iter().enumerate() {
            BaselineRepository::insert(&mut tx, item, position).await?;
        }

        tx.commit().await.context("Failed to commit baseline import")?;

        tracing::debug!(%process_id, removed, inserted = items.len(), "Baseline items replaced");
        Ok(items)
    }

    async fn list_quotation_items(&self, quotation_id: Uuid) -> Result<Vec<QuotationItem>> {
        self.quotations.find_items(quotation_id).await
    }

    async fn replace_quotation_items(
        &self,
        quotation: Quotation,
        items: Vec<QuotationItem>,
    ) -> Result<(Quotation, Vec<QuotationItem>)> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        QuotationRepository::lock(&mut tx, quotation.id).await?;
        let saved = QuotationRepository::upsert(&mut tx, &quotation).await?;
        let removed = QuotationRepository::delete_items(&mut tx, quotation.id).await?;

        let mut inserted = Vec::with_capacity(items.len());
        for item in &items {
            inserted.push(QuotationRepository::upsert_item(&mut tx, item).await?);
        }

        tx.commit().await.context("Failed to commit quotation import")?;

        tracing::debug!(
            quotation_id = %quotation.id,
            removed,
            inserted = inserted.len(),
            "Quotation items replaced"
        );
        Ok((saved, inserted))
    }

    async fn save_quotation_item(
        &self,
        item: QuotationItem,
        totals: &TotalsFn,
    ) -> Result<(QuotationItem, Quotation)> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        QuotationRepository::lock(&mut tx, item.quotation_id).await?;
        let saved = QuotationRepository::upsert_item(&mut tx, &item).await?;
        let all_items = QuotationRepository::find_items_in(&mut tx, item.quotation_id).await?;
        let quotation =
            QuotationRepository::update_totals(&mut tx, item.quotation_id, totals(&all_items)).await?;

        tx.commit().await.context("Failed to commit quotation item")?;
        Ok((saved, quotation))
    }

    async fn list_order_lines(&self, process_id: Uuid) -> Result<Vec<PurchaseOrderLine>> {
        self.purchases.find_order_lines(process_id).await
    }

    async fn list_delivery_items(&self, process_id: Uuid) -> Result<Vec<PurchaseDeliveryItem>> {
        self.purchases.find_delivery_items(process_id).await
    }
}
