//! Report shapes produced by the aggregator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Process-level comparison of every quotation against the baseline.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessSummary {
    pub process_id: Uuid,
    pub base_currency: String,
    pub baseline_total: f64,
    pub baseline_item_count: usize,
    pub rankings: Vec<QuotationRanking>,
    pub material_comparison: Vec<MaterialComparison>,
    pub section_summaries: Vec<SectionSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotationRanking {
    pub quotation_id: Uuid,
    pub supplier_name: String,
    /// 0 is the winner.
    pub rank: usize,
    pub is_winner: bool,
    pub currency: String,
    pub total_amount: f64,
    pub normalized_total: f64,
    pub item_count: usize,
    pub matched_items: usize,
    pub coverage: f64,
    /// normalized total − baseline total, in the base currency.
    pub variance: f64,
    pub variance_pct: Option<f64>,
    pub projected_margin_pct: Option<f64>,
    pub meets_target_margin: Option<bool>,
}

/// All matched offers for one baseline item, cheapest first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialComparison {
    pub baseline_item_id: Uuid,
    pub sheet_name: String,
    pub section_path: Vec<String>,
    pub item_code: Option<String>,
    pub description: String,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub baseline_unit_price: Option<f64>,
    pub offers: Vec<MaterialOffer>,
    pub best_quotation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialOffer {
    pub quotation_id: Uuid,
    pub quotation_item_id: Uuid,
    pub supplier_name: String,
    pub currency: String,
    pub unit_price: Option<f64>,
    pub normalized_price: Option<f64>,
    pub match_score: f64,
    pub is_best: bool,
}

/// Baseline and per-quotation totals for one top-level section of a sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionSummary {
    pub sheet_name: String,
    pub section: Option<String>,
    pub item_count: usize,
    pub baseline_total: f64,
    pub quotation_totals: Vec<SectionQuotationTotal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SectionQuotationTotal {
    pub quotation_id: Uuid,
    pub supplier_name: String,
    pub matched_items: usize,
    pub normalized_total: f64,
}

/// Fulfillment progress of one physical item across baseline rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseProgressRow {
    pub description: String,
    pub unit: Option<String>,
    pub baseline_item_ids: Vec<Uuid>,
    pub required_quantity: f64,
    pub ordered_quantity: f64,
    pub received_quantity: f64,
    pub order_pct: f64,
    pub receive_pct: f64,
    pub pending_order: f64,
    pub pending_receive: f64,
    /// Order/delivery lines left out of the sums because their unit does not convert.
    pub unconverted_lines: usize,
}
