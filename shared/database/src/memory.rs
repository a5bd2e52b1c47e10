//! In-memory store for tests and embedding.
//!
//! Mirrors the PostgreSQL cascade rules. Each mutation holds the write lock
//! for its whole duration, which makes it atomic.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use cotiza_models::{
    BaselineItem, PurchaseDeliveryItem, PurchaseOrderLine, Quotation, QuotationItem,
    QuotationProcess,
};

use crate::store::{QuotationStore, TotalsFn};

#[derive(Debug, Default)]
struct State {
    processes: HashMap<Uuid, QuotationProcess>,
    baseline: Vec<BaselineItem>,
    quotations: Vec<Quotation>,
    items: Vec<QuotationItem>,
    order_lines: Vec<PurchaseOrderLine>,
    deliveries: Vec<PurchaseDeliveryItem>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_order_line(&self, line: PurchaseOrderLine) {
        self.state.write().await.order_lines.push(line);
    }

    pub async fn add_delivery_item(&self, item: PurchaseDeliveryItem) {
        self.state.write().await.deliveries.push(item);
    }
}

#[async_trait]
impl QuotationStore for InMemoryStore {
    async fn get_process(&self, id: Uuid) -> Result<Option<QuotationProcess>> {
        Ok(self.state.read().await.processes.get(&id).cloned())
    }

    async fn save_process(&self, mut process: QuotationProcess) -> Result<QuotationProcess> {
        process.updated_at = Utc::now();
        self.state
            .write()
            .await
            .processes
            .insert(process.id, process.clone());
        Ok(process)
    }

    async fn delete_process(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        if state.processes.remove(&id).is_none() {
            return Ok(false);
        }
        let quotation_ids: HashSet<Uuid> = state
            .quotations
            .iter()
            .filter(|q| q.process_id == id)
            .map(|q| q.id)
            .collect();
        state.quotations.retain(|q| q.process_id != id);
        state.items.retain(|i| !quotation_ids.contains(&i.quotation_id));
        state.baseline.retain(|b| b.process_id != id);
        state.order_lines.retain(|l| l.process_id != id);
        state.deliveries.retain(|d| d.process_id != id);
        Ok(true)
    }

    async fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>> {
        Ok(self
            .state
            .read()
            .await
            .quotations
            .iter()
            .find(|q| q.id == id)
            .cloned())
    }

    async fn list_quotations(&self, process_id: Uuid) -> Result<Vec<Quotation>> {
        Ok(self
            .state
            .read()
            .await
            .quotations
            .iter()
            .filter(|q| q.process_id == process_id)
            .cloned()
            .collect())
    }

    async fn list_baseline_items(&self, process_id: Uuid) -> Result<Vec<BaselineItem>> {
        Ok(self
            .state
            .read()
            .await
            .baseline
            .iter()
            .filter(|b| b.process_id == process_id)
            .cloned()
            .collect())
    }

    async fn get_baseline_item(&self, id: Uuid) -> Result<Option<BaselineItem>> {
        Ok(self
            .state
            .read()
            .await
            .baseline
            .iter()
            .find(|b| b.id == id)
            .cloned())
    }

    async fn replace_baseline_items(
        &self,
        process_id: Uuid,
        items: Vec<BaselineItem>,
    ) -> Result<Vec<BaselineItem>> {
        let mut state = self.state.write().await;
        if !state.processes.contains_key(&process_id) {
            bail!("quotation process {} does not exist", process_id);
        }
        if let Some(stray) = items.iter().find(|i| i.process_id != process_id) {
            bail!("baseline item {} belongs to process {}", stray.id, stray.process_id);
        }

        let removed: HashSet<Uuid> = state
            .baseline
            .iter()
            .filter(|b| b.process_id == process_id)
            .map(|b| b.id)
            .collect();
        state.baseline.retain(|b| b.process_id != process_id);
        for item in state.items.iter_mut() {
            if item.baseline_item_id.map_or(false, |id| removed.contains(&id)) {
                item.baseline_item_id = None;
            }
        }
        state.baseline.extend(items.iter().cloned());
        Ok(items)
    }

    async fn list_quotation_items(&self, quotation_id: Uuid) -> Result<Vec<QuotationItem>> {
        Ok(self
            .state
            .read()
            .await
            .items
            .iter()
            .filter(|i| i.quotation_id == quotation_id)
            .cloned()
            .collect())
    }

    async fn replace_quotation_items(
        &self,
        mut quotation: Quotation,
        items: Vec<QuotationItem>,
    ) -> Result<(Quotation, Vec<QuotationItem>)> {
        let mut state = self.state.write().await;
        if !state.processes.contains_key(&quotation.process_id) {
            bail!("quotation process {} does not exist", quotation.process_id);
        }
        if let Some(stray) = items.iter().find(|i| i.quotation_id != quotation.id) {
            bail!("quotation item {} belongs to quotation {}", stray.id, stray.quotation_id);
        }

        quotation.updated_at = Utc::now();
        match state.quotations.iter_mut().find(|q| q.id == quotation.id) {
            Some(existing) => {
                quotation.created_at = existing.created_at;
                *existing = quotation.clone();
            }
            None => state.quotations.push(quotation.clone()),
        }

        state.items.retain(|i| i.quotation_id != quotation.id);
        state.items.extend(items.iter().cloned());
        Ok((quotation, items))
    }

    async fn save_quotation_item(
        &self,
        mut item: QuotationItem,
        totals: &TotalsFn,
    ) -> Result<(QuotationItem, Quotation)> {
        let mut state = self.state.write().await;
        if !state.quotations.iter().any(|q| q.id == item.quotation_id) {
            bail!("quotation {} does not exist", item.quotation_id);
        }

        item.updated_at = Utc::now();
        match state.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => {
                item.created_at = existing.created_at;
                *existing = item.clone();
            }
            None => state.items.push(item.clone()),
        }

        let all_items: Vec<QuotationItem> = state
            .items
            .iter()
            .filter(|i| i.quotation_id == item.quotation_id)
            .cloned()
            .collect();
        let computed = totals(&all_items);

        let quotation = state
            .quotations
            .iter_mut()
            .find(|q| q.id == item.quotation_id)
            .map(|q| {
                q.apply_totals(computed);
                q.clone()
            });
        match quotation {
            Some(quotation) => Ok((item, quotation)),
            None => bail!("quotation {} does not exist", item.quotation_id),
        }
    }

    async fn list_order_lines(&self, process_id: Uuid) -> Result<Vec<PurchaseOrderLine>> {
        Ok(self
            .state
            .read()
            .await
            .order_lines
            .iter()
            .filter(|l| l.process_id == process_id)
            .cloned()
            .collect())
    }

    async fn list_delivery_items(&self, process_id: Uuid) -> Result<Vec<PurchaseDeliveryItem>> {
        Ok(self
            .state
            .read()
            .await
            .deliveries
            .iter()
            .filter(|d| d.process_id == process_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotiza_models::QuotationTotals;

    async fn seeded() -> (InMemoryStore, QuotationProcess) {
        let store = InMemoryStore::new();
        let process = store
            .save_process(QuotationProcess::new("Obra Centro", "PEN"))
            .await
            .unwrap();
        (store, process)
    }

    fn item_for(quotation: &Quotation, description: &str) -> QuotationItem {
        QuotationItem {
            quotation_id: quotation.id,
            description: description.to_string(),
            total_price: Some(10.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_replace_quotation_items_is_wholesale() {
        let (store, process) = seeded().await;
        let quotation = Quotation::new(process.id, "Aceros SAC", "PEN");

        let first = vec![item_for(&quotation, "a"), item_for(&quotation, "b"), item_for(&quotation, "c")];
        store.replace_quotation_items(quotation.clone(), first).await.unwrap();

        let second = vec![item_for(&quotation, "d")];
        store.replace_quotation_items(quotation.clone(), second).await.unwrap();

        let items = store.list_quotation_items(quotation.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "d");
        assert_eq!(store.list_quotations(process.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_baseline_keeps_import_order_across_sheets() {
        let (store, process) = seeded().await;
        let items = vec![
            BaselineItem::new(process.id, "Sanitarias", "Tubería PVC"),
            BaselineItem::new(process.id, "Eléctricas", "Cable THW"),
            BaselineItem::new(process.id, "Sanitarias", "Codo PVC"),
        ];
        store.replace_baseline_items(process.id, items.clone()).await.unwrap();

        let listed: Vec<Uuid> = store
            .list_baseline_items(process.id)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(listed, items.iter().map(|b| b.id).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_baseline_replacement_unlinks_quotation_items() {
        let (store, process) = seeded().await;
        let baseline = BaselineItem::new(process.id, "Obra", "Cemento");
        store
            .replace_baseline_items(process.id, vec![baseline.clone()])
            .await
            .unwrap();

        let quotation = Quotation::new(process.id, "Aceros SAC", "PEN");
        let mut item = item_for(&quotation, "Cemento");
        item.baseline_item_id = Some(baseline.id);
        store.replace_quotation_items(quotation.clone(), vec![item]).await.unwrap();

        store.replace_baseline_items(process.id, Vec::new()).await.unwrap();

        let items = store.list_quotation_items(quotation.id).await.unwrap();
        assert_eq!(items[0].baseline_item_id, None);
        assert!(store.list_baseline_items(process.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_item_rewrites_totals() {
        let (store, process) = seeded().await;
        let quotation = Quotation::new(process.id, "Aceros SAC", "PEN");
        store
            .replace_quotation_items(quotation.clone(), vec![item_for(&quotation, "a")])
            .await
            .unwrap();

        let sum = |items: &[QuotationItem]| QuotationTotals {
            total_amount: items.iter().filter_map(|i| i.total_price).sum(),
            total_amount_base: items.iter().filter_map(|i| i.total_price).sum(),
            unconverted_items: 0,
        };
        let (_, updated) = store
            .save_quotation_item(item_for(&quotation, "b"), &sum)
            .await
            .unwrap();

        assert_eq!(updated.total_amount, 20.0);
        assert_eq!(updated.total_amount_pen, 20.0);
    }

    #[tokio::test]
    async fn test_mutations_require_existing_parents() {
        let store = InMemoryStore::new();
        let quotation = Quotation::new(Uuid::new_v4(), "Aceros SAC", "PEN");
        assert!(store.replace_quotation_items(quotation, Vec::new()).await.is_err());
        assert!(store.replace_baseline_items(Uuid::new_v4(), Vec::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_process_cascades() {
        let (store, process) = seeded().await;
        let quotation = Quotation::new(process.id, "Aceros SAC", "PEN");
        store
            .replace_quotation_items(quotation.clone(), vec![item_for(&quotation, "a")])
            .await
            .unwrap();

        assert!(store.delete_process(process.id).await.unwrap());
        assert!(!store.delete_process(process.id).await.unwrap());
        assert!(store.get_quotation(quotation.id).await.unwrap().is_none());
        assert!(store.list_quotation_items(quotation.id).await.unwrap().is_empty());
    }
}
