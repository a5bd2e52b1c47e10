//! Price normalization, quotation totals and process-level reports.
//!
//! Everything here is a pure function over already-loaded records so the
//! same arithmetic serves bulk imports, manual edits and report queries.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cotiza_models::{
    BaselineItem, MaterialComparison, MaterialOffer, ProcessSummary, PurchaseDeliveryItem,
    PurchaseOrderLine, PurchaseProgressRow, Quotation, QuotationItem, QuotationProcess,
    QuotationRanking, QuotationTotals, SectionQuotationTotal, SectionSummary,
};
use cotiza_utils::{canonical_unit, convert_currency, convert_quantity, convert_unit_price, normalize_text, unit_key};

/// A supplier unit price expressed per baseline unit in the base currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPrice {
    /// `None` when the currency could not be converted.
    pub normalized_price: Option<f64>,
    pub normalized_unit: Option<String>,
    pub unit_converted: bool,
}

pub fn normalize_offer(
    unit_price: Option<f64>,
    supplier_unit: Option<&str>,
    baseline_unit: Option<&str>,
    currency: &str,
    base_currency: &str,
    exchange_rate: Option<f64>,
) -> NormalizedPrice {
    let Some(price) = unit_price else {
        return NormalizedPrice {
            normalized_price: None,
            normalized_unit: supplier_unit.map(str::to_string),
            unit_converted: false,
        };
    };

    let conversion = convert_unit_price(price, supplier_unit, baseline_unit);
    let normalized_unit = if conversion.converted {
        baseline_unit
    } else {
        supplier_unit
    };

    NormalizedPrice {
        normalized_price: convert_currency(conversion.value, currency, base_currency, exchange_rate),
        normalized_unit: normalized_unit.map(str::to_string),
        unit_converted: conversion.converted,
    }
}

/// Sum every item's line total in the quote currency and in the base currency.
pub fn compute_totals(
    items: &[QuotationItem],
    currency: &str,
    base_currency: &str,
    exchange_rate: Option<f64>,
) -> QuotationTotals {
    let mut totals = QuotationTotals::default();

    for total in items.iter().filter_map(QuotationItem::line_total) {
        totals.total_amount += total;
        match convert_currency(total, currency, base_currency, exchange_rate) {
            Some(base) => totals.total_amount_base += base,
            None => totals.unconverted_items += 1,
        }
    }

    totals
}

fn baseline_total(baseline: &[BaselineItem]) -> f64 {
    baseline.iter().filter_map(BaselineItem::line_total).sum()
}

/// Rank quotations by normalized total. Quotations without items sort last
/// and never win.
pub fn rankings(
    process: &QuotationProcess,
    baseline: &[BaselineItem],
    quotes: &[(Quotation, Vec<QuotationItem>)],
) -> Vec<QuotationRanking> {
    let reference = baseline_total(baseline);
    let baseline_ids: HashSet<Uuid> = baseline.iter().map(|b| b.id).collect();

    let mut ranked: Vec<QuotationRanking> = quotes
        .iter()
        .map(|(quotation, items)| {
            let matched: HashSet<Uuid> = items
                .iter()
                .filter_map(|i| i.baseline_item_id)
                .filter(|id| baseline_ids.contains(id))
                .collect();
            let normalized_total = quotation.total_amount_pen;
            let coverage = if baseline.is_empty() {
                0.0
            } else {
                matched.len() as f64 / baseline.len() as f64
            };
            let (variance_pct, projected_margin_pct) = if reference > 0.0 {
                (
                    Some((normalized_total - reference) / reference),
                    Some((reference - normalized_total) / reference),
                )
            } else {
                (None, None)
            };
            let meets_target_margin = match (projected_margin_pct, process.target_margin_pct) {
                (Some(margin), Some(target)) => Some(margin >= target),
                _ => None,
            };

            QuotationRanking {
                quotation_id: quotation.id,
                supplier_name: quotation.supplier_name.clone(),
                rank: 0,
                is_winner: false,
                currency: quotation.currency.clone(),
                total_amount: quotation.total_amount,
                normalized_total,
                item_count: items.len(),
                matched_items: matched.len(),
                coverage,
                variance: normalized_total - reference,
                variance_pct,
                projected_margin_pct,
                meets_target_margin,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        (a.item_count == 0)
            .cmp(&(b.item_count == 0))
            .then(a.normalized_total.total_cmp(&b.normalized_total))
            .then_with(|| a.supplier_name.cmp(&b.supplier_name))
    });
    for (rank, entry) in ranked.iter_mut().enumerate() {
        entry.rank = rank;
        entry.is_winner = rank == 0 && entry.item_count > 0;
    }

    ranked
}

/// Per baseline item, every matched offer cheapest first.
pub fn material_comparison(
    baseline: &[BaselineItem],
    quotes: &[(Quotation, Vec<QuotationItem>)],
) -> Vec<MaterialComparison> {
    let mut offers: HashMap<Uuid, Vec<MaterialOffer>> = HashMap::new();
    for (quotation, items) in quotes {
        for item in items {
            let Some(baseline_id) = item.baseline_item_id else {
                continue;
            };
            offers.entry(baseline_id).or_default().push(MaterialOffer {
                quotation_id: quotation.id,
                quotation_item_id: item.id,
                supplier_name: quotation.supplier_name.clone(),
                currency: item.currency.clone(),
                unit_price: item.unit_price,
                normalized_price: item.normalized_price,
                match_score: item.match_score,
                is_best: false,
            });
        }
    }

    baseline
        .iter()
        .map(|row| {
            let mut row_offers = offers.remove(&row.id).unwrap_or_default();
            row_offers.sort_by(|a, b| match (a.normalized_price, b.normalized_price) {
                (Some(x), Some(y)) => x.total_cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });

            let mut best_quotation_id = None;
            if let Some(best) = row_offers.first_mut().filter(|o| o.normalized_price.is_some()) {
                best.is_best = true;
                best_quotation_id = Some(best.quotation_id);
            }

            MaterialComparison {
                baseline_item_id: row.id,
                sheet_name: row.sheet_name.clone(),
                section_path: row.section_path.clone(),
                item_code: row.item_code.clone(),
                description: row.description.clone(),
                unit: row.unit.clone(),
                quantity: row.quantity,
                baseline_unit_price: row.unit_price,
                offers: row_offers,
                best_quotation_id,
            }
        })
        .collect()
}

/// Baseline and quotation totals per `(sheet, top-level section)`, in the
/// order sections first appear. Offers are priced at the baseline quantity.
pub fn section_summaries(
    baseline: &[BaselineItem],
    quotes: &[(Quotation, Vec<QuotationItem>)],
) -> Vec<SectionSummary> {
    let mut order: Vec<(String, Option<String>)> = Vec::new();
    let mut members: HashMap<(String, Option<String>), Vec<&BaselineItem>> = HashMap::new();
    for row in baseline {
        let key = (row.sheet_name.clone(), row.top_section().map(str::to_string));
        if !members.contains_key(&key) {
            order.push(key.clone());
        }
        members.entry(key).or_default().push(row);
    }

    order
        .into_iter()
        .map(|key| {
            let rows = members.remove(&key).unwrap_or_default();
            let by_id: HashMap<Uuid, &BaselineItem> = rows.iter().map(|r| (r.id, *r)).collect();

            let quotation_totals = quotes
                .iter()
                .map(|(quotation, items)| {
                    let mut matched_items = 0;
                    let mut normalized_total = 0.0;
                    for item in items {
                        let Some(row) = item.baseline_item_id.and_then(|id| by_id.get(&id)) else {
                            continue;
                        };
                        matched_items += 1;
                        if let (Some(price), Some(quantity)) =
                            (item.normalized_price, row.quantity.or(item.quantity))
                        {
                            normalized_total += price * quantity;
                        }
                    }
                    SectionQuotationTotal {
                        quotation_id: quotation.id,
                        supplier_name: quotation.supplier_name.clone(),
                        matched_items,
                        normalized_total,
                    }
                })
                .collect();

            SectionSummary {
                sheet_name: key.0,
                section: key.1,
                item_count: rows.len(),
                baseline_total: rows.iter().filter_map(|r| r.line_total()).sum(),
                quotation_totals,
            }
        })
        .collect()
}

pub fn process_summary(
    process: &QuotationProcess,
    baseline: &[BaselineItem],
    quotes: &[(Quotation, Vec<QuotationItem>)],
) -> ProcessSummary {
    ProcessSummary {
        process_id: process.id,
        base_currency: process.base_currency.clone(),
        baseline_total: baseline_total(baseline),
        baseline_item_count: baseline.len(),
        rankings: rankings(process, baseline, quotes),
        material_comparison: material_comparison(baseline, quotes),
        section_summaries: section_summaries(baseline, quotes),
    }
}

fn group_unit_key(unit: Option<&str>) -> String {
    match unit {
        Some(u) => canonical_unit(u).map(str::to_string).unwrap_or_else(|| unit_key(u)),
        None => String::new(),
    }
}

struct ProgressGroup {
    row: PurchaseProgressRow,
    description_key: String,
}

impl ProgressGroup {
    /// Quantity in the group's unit; `None` when the unit is unrelated.
    fn in_group_unit(&self, quantity: f64, unit: Option<&str>) -> Option<f64> {
        if group_unit_key(unit) == group_unit_key(self.row.unit.as_deref()) {
            return Some(quantity);
        }
        let conversion = convert_quantity(quantity, unit, self.row.unit.as_deref());
        conversion.converted.then_some(conversion.value)
    }
}

struct ProgressGroups {
    groups: Vec<ProgressGroup>,
    by_key: HashMap<(String, String), usize>,
    by_baseline: HashMap<Uuid, usize>,
}

impl ProgressGroups {
    fn find(&self, baseline_id: Option<Uuid>, description: &str, unit: Option<&str>) -> Option<usize> {
        if let Some(&group) = baseline_id.and_then(|id| self.by_baseline.get(&id)) {
            return Some(group);
        }
        let description_key = normalize_text(description);
        self.by_key
            .get(&(description_key.clone(), group_unit_key(unit)))
            .copied()
            .or_else(|| self.groups.iter().position(|g| g.description_key == description_key))
    }
}

/// Required, ordered and received quantities per physical item.
pub fn purchase_progress(
    baseline: &[BaselineItem],
    order_lines: &[PurchaseOrderLine],
    deliveries: &[PurchaseDeliveryItem],
) -> Vec<PurchaseProgressRow> {
    let mut index = ProgressGroups {
        groups: Vec::new(),
        by_key: HashMap::new(),
        by_baseline: HashMap::new(),
    };

    for row in baseline {
        let description_key = normalize_text(&row.description);
        let key = (description_key.clone(), group_unit_key(row.unit.as_deref()));
        let position = *index.by_key.entry(key).or_insert_with(|| {
            index.groups.push(ProgressGroup {
                row: PurchaseProgressRow {
                    description: row.description.clone(),
                    unit: row.unit.clone(),
                    baseline_item_ids: Vec::new(),
                    required_quantity: 0.0,
                    ordered_quantity: 0.0,
                    received_quantity: 0.0,
                    order_pct: 0.0,
                    receive_pct: 0.0,
                    pending_order: 0.0,
                    pending_receive: 0.0,
                    unconverted_lines: 0,
                },
                description_key,
            });
            index.groups.len() - 1
        });
        index.by_baseline.insert(row.id, position);

        let group = &mut index.groups[position];
        group.row.baseline_item_ids.push(row.id);
        group.row.required_quantity += row.quantity.unwrap_or(0.0);
    }

    let mut line_groups: HashMap<Uuid, usize> = HashMap::new();
    for line in order_lines {
        let Some(position) = index.find(line.baseline_item_id, &line.description, line.unit.as_deref()) else {
            continue;
        };
        line_groups.insert(line.id, position);
        let group = &mut index.groups[position];
        match group.in_group_unit(line.quantity, line.unit.as_deref()) {
            Some(quantity) => group.row.ordered_quantity += quantity,
            None => group.row.unconverted_lines += 1,
        }
    }

    for delivery in deliveries {
        let position = delivery
            .baseline_item_id
            .and_then(|id| index.by_baseline.get(&id).copied())
            .or_else(|| delivery.order_line_id.and_then(|id| line_groups.get(&id).copied()))
            .or_else(|| index.find(None, &delivery.description, delivery.unit.as_deref()));
        let Some(position) = position else {
            continue;
        };
        let group = &mut index.groups[position];
        match group.in_group_unit(delivery.quantity, delivery.unit.as_deref()) {
            Some(quantity) => group.row.received_quantity += quantity,
            None => group.row.unconverted_lines += 1,
        }
    }

    index
        .groups
        .into_iter()
        .map(|group| {
            let mut row = group.row;
            row.order_pct = completion(row.ordered_quantity, row.required_quantity);
            row.receive_pct = completion(row.received_quantity, row.ordered_quantity);
            row.pending_order = (row.required_quantity - row.ordered_quantity).max(0.0);
            row.pending_receive = (row.ordered_quantity - row.received_quantity).max(0.0);
            row
        })
        .collect()
}

fn completion(done: f64, expected: f64) -> f64 {
    if expected > 0.0 {
        (done / expected).min(1.0)
    } else {
        0.0
    }
}
