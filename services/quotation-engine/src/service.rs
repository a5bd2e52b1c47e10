//! Quotation Engine Service
//!
//! Orchestrates spreadsheet reading, matching, normalization and persistence
//! for one quotation process at a time.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use cotiza_database::QuotationStore;
use cotiza_models::{
    BaselineItem, ProcessSummary, PurchaseProgressRow, Quotation, QuotationItem, QuotationProcess,
    QuotationTotals,
};
use cotiza_utils::spreadsheet::{BaselineReader, SheetDiagnostics, SupplierReader};
use cotiza_utils::{
    canonical_currency, validate_currency_code, validate_exchange_rate, validate_model, AppConfig,
    CotizaError, CotizaResult, ImportConfig, MatchingConfig,
};

use crate::aggregator::{compute_totals, normalize_offer, process_summary, purchase_progress};
use crate::cache::SummaryCache;
use crate::index::BaselineIndex;
use crate::matcher::match_baseline;

/// Process-level inputs to a supplier import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessContext {
    pub process_id: Uuid,
    /// Overrides the process's stored rate for this import.
    pub exchange_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplierContext {
    /// Re-importing into an existing quotation replaces its items.
    pub quotation_id: Option<Uuid>,
    pub supplier_name: String,
    pub supplier_tax_id: Option<String>,
    /// Blank means the process base currency.
    pub currency: String,
    pub exchange_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManualItemInput {
    pub baseline_item_id: Uuid,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub quantity: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub quotation: Quotation,
    pub items: Vec<QuotationItem>,
    pub matched_count: usize,
    pub unmatched_count: usize,
    pub totals: QuotationTotals,
    pub diagnostics: Vec<SheetDiagnostics>,
    pub warnings: Vec<String>,
}

pub struct QuotationEngine<S: QuotationStore> {
    store: Arc<S>,
    matching: MatchingConfig,
    import: ImportConfig,
    cache: SummaryCache,
}

impl<S: QuotationStore> QuotationEngine<S> {
    pub fn new(store: Arc<S>, config: &AppConfig) -> Self {
        Self {
            store,
            matching: config.matching,
            import: config.import,
            cache: SummaryCache::new(Duration::from_secs(config.reports.summary_cache_ttl_seconds)),
        }
    }

    pub fn with_cache(mut self, cache: SummaryCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub async fn create_process(&self, process: QuotationProcess) -> CotizaResult<QuotationProcess> {
        validate_model(&process)?;
        validate_currency_code(&process.base_currency)?;
        Ok(self.store.save_process(process).await?)
    }

    /// Remove a process and everything recorded under it.
    #[instrument(skip(self))]
    pub async fn delete_process(&self, process_id: Uuid) -> CotizaResult<()> {
        if !self.store.delete_process(process_id).await? {
            return Err(CotizaError::not_found(format!("quotation process {}", process_id)));
        }
        self.cache.invalidate(process_id).await;
        info!("Quotation process deleted");
        Ok(())
    }

    async fn require_process(&self, process_id: Uuid) -> CotizaResult<QuotationProcess> {
        self.store
            .get_process(process_id)
            .await?
            .ok_or_else(|| CotizaError::not_found(format!("quotation process {}", process_id)))
    }

    /// Parse a baseline workbook and replace the process's baseline with it.
    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn import_baseline(
        &self,
        process_id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> CotizaResult<Vec<BaselineItem>> {
        self.require_process(process_id).await?;

        let parsed = BaselineReader::new(self.import).read_bytes(filename, data)?;
        for warning in &parsed.warnings {
            debug!("{}", warning);
        }

        let items: Vec<BaselineItem> = parsed
            .rows
            .into_iter()
            .map(|row| row.into_baseline_item(process_id))
            .collect();
        for item in &items {
            validate_model(item)?;
        }

        let saved = self.store.replace_baseline_items(process_id, items).await?;
        self.cache.invalidate(process_id).await;

        info!(
            "Imported {} baseline items from {} sheet(s)",
            saved.len(),
            parsed.sheets.iter().filter(|s| s.header_row.is_some()).count()
        );
        Ok(saved)
    }

    /// Parse a supplier quote, match every row to the baseline and replace
    /// the quotation's items.
    #[instrument(skip(self, data, process_ctx, supplier_ctx), fields(process_id = %process_ctx.process_id, supplier = %supplier_ctx.supplier_name))]
    pub async fn import_supplier_quote(
        &self,
        filename: &str,
        data: &[u8],
        process_ctx: &ProcessContext,
        supplier_ctx: &SupplierContext,
    ) -> CotizaResult<ImportOutcome> {
        let process = self.require_process(process_ctx.process_id).await?;

        let currency = canonical_currency(&supplier_ctx.currency).unwrap_or_else(|| process.base_currency.clone());
        validate_currency_code(&currency)?;
        validate_exchange_rate(supplier_ctx.exchange_rate)?;
        validate_exchange_rate(process_ctx.exchange_rate)?;

        let mut quotation = match supplier_ctx.quotation_id {
            Some(id) => {
                let existing = self
                    .store
                    .get_quotation(id)
                    .await?
                    .ok_or_else(|| CotizaError::not_found(format!("quotation {}", id)))?;
                if existing.process_id != process.id {
                    return Err(CotizaError::referential(format!(
                        "quotation {} belongs to process {}",
                        id, existing.process_id
                    )));
                }
                existing
            }
            None => Quotation::new(process.id, supplier_ctx.supplier_name.clone(), currency.clone()),
        };
        quotation.supplier_name = supplier_ctx.supplier_name.clone();
        quotation.supplier_tax_id = supplier_ctx.supplier_tax_id.clone();
        quotation.currency = currency.clone();
        quotation.exchange_rate = supplier_ctx
            .exchange_rate
            .or(process_ctx.exchange_rate)
            .or(process.exchange_rate);
        validate_model(&quotation)?;

        let mut reader = SupplierReader::new(self.import);
        if !supplier_ctx.supplier_name.trim().is_empty() {
            reader = reader.with_supplier_name(supplier_ctx.supplier_name.clone());
        }
        let parsed = reader.read_bytes(filename, data)?;

        let baseline = self.store.list_baseline_items(process.id).await?;
        let index = BaselineIndex::build(&baseline);

        let mut items = Vec::with_capacity(parsed.rows.len());
        let mut matched_count = 0;
        for row in &parsed.rows {
            let result = match_baseline(&index, row, &self.matching);
            let baseline_unit = result
                .baseline_id
                .and_then(|id| index.get(id))
                .and_then(|entry| entry.unit.as_deref());
            let price = normalize_offer(
                row.unit_price,
                row.unit.as_deref(),
                baseline_unit,
                &currency,
                &process.base_currency,
                quotation.exchange_rate,
            );
            matched_count += usize::from(result.is_match());

            items.push(QuotationItem {
                quotation_id: quotation.id,
                baseline_item_id: result.baseline_id,
                item_code: row.item_code.clone(),
                description: row.description.clone(),
                offered_description: row.offered_description.clone(),
                brand: row.brand.clone(),
                unit: row.unit.clone(),
                normalized_unit: price.normalized_unit,
                unit_converted: price.unit_converted,
                quantity: row.quantity,
                unit_price: row.unit_price,
                total_price: row.total_price,
                currency: currency.clone(),
                normalized_price: price.normalized_price,
                match_score: result.score.clamp(0.0, 1.0),
                source_sheet: Some(row.sheet_name.clone()),
                source_row: i32::try_from(row.row_number).ok(),
                ..Default::default()
            });
        }

        let totals = compute_totals(&items, &currency, &process.base_currency, quotation.exchange_rate);
        if totals.unconverted_items > 0 {
            warn!(
                "{} item(s) of {} could not be converted from {} to {}",
                totals.unconverted_items, quotation.supplier_name, currency, process.base_currency
            );
        }
        quotation.apply_totals(totals);

        let (quotation, items) = self.store.replace_quotation_items(quotation, items).await?;
        self.cache.invalidate(process.id).await;

        let unmatched_count = items.len() - matched_count;
        info!(
            quotation_id = %quotation.id,
            "Imported {} rows: {} matched, {} unmatched, total {:.2} {} ({:.2} {})",
            items.len(),
            matched_count,
            unmatched_count,
            totals.total_amount,
            currency,
            totals.total_amount_base,
            process.base_currency
        );

        Ok(ImportOutcome {
            quotation,
            items,
            matched_count,
            unmatched_count,
            totals,
            diagnostics: parsed.sheets,
            warnings: parsed.warnings,
        })
    }

    /// Set the price of one baseline row on a quotation and recompute the
    /// quotation's totals from all of its items.
    #[instrument(skip(self, input), fields(baseline_item_id = %input.baseline_item_id))]
    pub async fn upsert_manual_item(
        &self,
        quotation_id: Uuid,
        input: ManualItemInput,
    ) -> CotizaResult<QuotationItem> {
        if input.unit_price.is_none() && input.total_price.is_none() {
            return Err(CotizaError::validation("unit_price", "A unit price or a total price is required"));
        }
        for (field, value) in [
            ("unit_price", input.unit_price),
            ("total_price", input.total_price),
            ("quantity", input.quantity),
        ] {
            if value.is_some_and(|v| !v.is_finite() || v < 0.0) {
                return Err(CotizaError::validation(field, "Must be a non-negative number"));
            }
        }

        let quotation = self
            .store
            .get_quotation(quotation_id)
            .await?
            .ok_or_else(|| CotizaError::not_found(format!("quotation {}", quotation_id)))?;
        let baseline = self
            .store
            .get_baseline_item(input.baseline_item_id)
            .await?
            .ok_or_else(|| CotizaError::not_found(format!("baseline item {}", input.baseline_item_id)))?;
        if baseline.process_id != quotation.process_id {
            return Err(CotizaError::referential(format!(
                "baseline item {} belongs to process {}, quotation {} to process {}",
                baseline.id, baseline.process_id, quotation.id, quotation.process_id
            )));
        }
        let process = self.require_process(quotation.process_id).await?;

        let existing = self
            .store
            .list_quotation_items(quotation_id)
            .await?
            .into_iter()
            .find(|item| item.baseline_item_id == Some(baseline.id));

        let mut item = existing.unwrap_or_else(|| QuotationItem {
            quotation_id,
            baseline_item_id: Some(baseline.id),
            item_code: baseline.item_code.clone(),
            description: baseline.description.clone(),
            unit: baseline.unit.clone(),
            quantity: baseline.quantity,
            currency: quotation.currency.clone(),
            source_sheet: Some(baseline.sheet_name.clone()),
            ..Default::default()
        });

        if input.quantity.is_some() {
            item.quantity = input.quantity;
        }
        item.unit_price = input.unit_price;
        item.total_price = input.total_price;
        if item.unit_price.is_none() {
            item.unit_price = match (item.total_price, item.quantity) {
                (Some(total), Some(q)) if q > 0.0 => Some(total / q),
                _ => None,
            };
        }
        if item.total_price.is_none() {
            item.total_price = match (item.unit_price, item.quantity) {
                (Some(price), Some(q)) => Some(price * q),
                _ => None,
            };
        }

        let price = normalize_offer(
            item.unit_price,
            item.unit.as_deref(),
            baseline.unit.as_deref(),
            &quotation.currency,
            &process.base_currency,
            quotation.exchange_rate,
        );
        item.normalized_price = price.normalized_price;
        item.normalized_unit = price.normalized_unit;
        item.unit_converted = price.unit_converted;
        item.match_score = 1.0;
        item.is_manual = true;
        item.updated_at = chrono::Utc::now();
        validate_model(&item)?;

        let currency = quotation.currency.clone();
        let base_currency = process.base_currency.clone();
        let rate = quotation.exchange_rate;
        let totals = move |items: &[QuotationItem]| compute_totals(items, &currency, &base_currency, rate);

        let (item, quotation) = self.store.save_quotation_item(item, &totals).await?;
        self.cache.invalidate(quotation.process_id).await;

        info!(
            quotation_id = %quotation.id,
            "Manual price saved, quotation total now {:.2} ({:.2} {})",
            quotation.total_amount,
            quotation.total_amount_pen,
            process.base_currency
        );
        Ok(item)
    }

    /// Rankings, per-item comparison and section totals for a process.
    #[instrument(skip(self))]
    pub async fn get_process_summary(&self, process_id: Uuid) -> CotizaResult<ProcessSummary> {
        if let Some(summary) = self.cache.get(process_id).await {
            debug!("Serving cached summary");
            return Ok(summary);
        }

        let generation = self.cache.generation(process_id).await;
        let process = self.require_process(process_id).await?;
        let baseline = self.store.list_baseline_items(process_id).await?;
        let mut quotes = Vec::new();
        for quotation in self.store.list_quotations(process_id).await? {
            let items = self.store.list_quotation_items(quotation.id).await?;
            quotes.push((quotation, items));
        }

        let summary = process_summary(&process, &baseline, &quotes);
        if !self.cache.insert(process_id, generation, summary.clone()).await {
            debug!("Summary not cached");
        }
        Ok(summary)
    }

    #[instrument(skip(self))]
    pub async fn get_purchase_progress(&self, process_id: Uuid) -> CotizaResult<Vec<PurchaseProgressRow>> {
        self.require_process(process_id).await?;
        let baseline = self.store.list_baseline_items(process_id).await?;
        let order_lines = self.store.list_order_lines(process_id).await?;
        let deliveries = self.store.list_delivery_items(process_id).await?;

        let rows = purchase_progress(&baseline, &order_lines, &deliveries);
        let unconverted: usize = rows.iter().map(|r| r.unconverted_lines).sum();
        if unconverted > 0 {
            warn!("{} purchase line(s) left out, unit not convertible", unconverted);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cotiza_database::InMemoryStore;

    const BASELINE: &str = "\
ITEM;DESCRIPCION;UND;CANT;P.U.
;ESTRUCTURAS;;;
01;Cemento portland tipo I;BLS;10;25
02;Fierro corrugado 1/2 pulgada;VAR;20;40
";

    async fn engine_with_baseline() -> (QuotationEngine<InMemoryStore>, QuotationProcess) {
        let engine = QuotationEngine::new(Arc::new(InMemoryStore::new()), &AppConfig::default());
        let process = engine
            .create_process(QuotationProcess::new("Obra Norte", "PEN").with_exchange_rate(3.7))
            .await
            .unwrap();
        engine
            .import_baseline(process.id, "presupuesto.csv", BASELINE.as_bytes())
            .await
            .unwrap();
        (engine, process)
    }

    #[tokio::test]
    async fn test_import_baseline_requires_process() {
        let engine = QuotationEngine::new(Arc::new(InMemoryStore::new()), &AppConfig::default());
        let err = engine
            .import_baseline(Uuid::new_v4(), "presupuesto.csv", BASELINE.as_bytes())
            .await
            .unwrap_err();
        assert!(matches!(err, CotizaError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_usd_quote_is_normalized_to_base_currency() {
        let (engine, process) = engine_with_baseline().await;
        let quote = "ITEM;DESCRIPCION;UND;CANT;PRECIO UNITARIO\n01;Cemento portland tipo I;BLS;10;5\n";

        let outcome = engine
            .import_supplier_quote(
                "cotizacion.csv",
                quote.as_bytes(),
                &ProcessContext { process_id: process.id, exchange_rate: None },
                &SupplierContext {
                    supplier_name: "Aceros Lima".to_string(),
                    currency: "US$".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.matched_count, 1);
        assert_eq!(outcome.quotation.currency, "USD");
        assert_eq!(outcome.quotation.exchange_rate, Some(3.7));
        assert_eq!(outcome.totals.total_amount, 50.0);
        assert!((outcome.totals.total_amount_base - 185.0).abs() < 1e-9);
        assert!((outcome.items[0].normalized_price.unwrap() - 18.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_manual_item_requires_a_price() {
        let (engine, _) = engine_with_baseline().await;
        let err = engine
            .upsert_manual_item(Uuid::new_v4(), ManualItemInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CotizaError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_summary_is_cached_until_next_import() {
        let (engine, process) = engine_with_baseline().await;
        let engine = engine.with_cache(SummaryCache::new(Duration::from_secs(300)));

        let first = engine.get_process_summary(process.id).await.unwrap();
        assert!(first.rankings.is_empty());

        engine
            .import_supplier_quote(
                "cotizacion.csv",
                "ITEM;DESCRIPCION;UND;CANT;P.U.\n01;Cemento portland tipo I;BLS;10;24\n".as_bytes(),
                &ProcessContext { process_id: process.id, exchange_rate: None },
                &SupplierContext { supplier_name: "Ferretería Sur".to_string(), ..Default::default() },
            )
            .await
            .unwrap();

        let second = engine.get_process_summary(process.id).await.unwrap();
        assert_eq!(second.rankings.len(), 1);
        assert_eq!(second.rankings[0].normalized_total, 240.0);
    }

    #[tokio::test]
    async fn test_delete_process_drops_everything_it_owns() {
        let (engine, process) = engine_with_baseline().await;
        engine.get_process_summary(process.id).await.unwrap();

        engine.delete_process(process.id).await.unwrap();

        assert!(engine.store().list_baseline_items(process.id).await.unwrap().is_empty());
        let err = engine.get_process_summary(process.id).await.unwrap_err();
        assert!(matches!(err, CotizaError::NotFound { .. }));
        let err = engine.delete_process(process.id).await.unwrap_err();
        assert!(matches!(err, CotizaError::NotFound { .. }));
    }
}
