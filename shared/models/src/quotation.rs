//! Supplier quotation models.
//!
//! Quotation items are recreated wholesale on every re-import of a quotation,
//! and the quotation totals always equal the sum over its current items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// One supplier's offer within a process.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq)]
pub struct Quotation {
    pub id: Uuid,
    pub process_id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Supplier name must be between 1 and 200 characters"))]
    pub supplier_name: String,
    pub supplier_tax_id: Option<String>,
    #[validate(length(min = 3, max = 3, message = "Currency must be a 3-letter code"))]
    pub currency: String,
    #[validate(range(min = 0.0, message = "Exchange rate must be positive"))]
    pub exchange_rate: Option<f64>,
    /// Sum of item totals, in the quotation currency.
    pub total_amount: f64,
    /// Sum of item totals, in the process base currency.
    pub total_amount_pen: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Quotation {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id: Uuid::nil(),
            supplier_name: String::new(),
            supplier_tax_id: None,
            currency: crate::DEFAULT_BASE_CURRENCY.to_string(),
            exchange_rate: None,
            total_amount: 0.0,
            total_amount_pen: 0.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl Quotation {
    pub fn new(process_id: Uuid, supplier_name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            process_id,
            supplier_name: supplier_name.into(),
            currency: currency.into(),
            ..Default::default()
        }
    }

    pub fn apply_totals(&mut self, totals: QuotationTotals) {
        self.total_amount = totals.total_amount;
        self.total_amount_pen = totals.total_amount_base;
        self.updated_at = Utc::now();
    }
}

/// One priced line of a supplier quotation, matched or not.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq)]
pub struct QuotationItem {
    pub id: Uuid,
    pub quotation_id: Uuid,
    /// `None` means the line did not match any baseline item.
    pub baseline_item_id: Option<Uuid>,
    pub material_id: Option<Uuid>,
    pub item_code: Option<String>,
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,
    pub offered_description: Option<String>,
    pub brand: Option<String>,
    /// Unit as written by the supplier.
    pub unit: Option<String>,
    /// Unit the normalized price refers to (the baseline unit when conversion applied).
    pub normalized_unit: Option<String>,
    pub unit_converted: bool,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub currency: String,
    /// Unit price in the process base currency and baseline unit.
    pub normalized_price: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0, message = "Match score must be between 0 and 1"))]
    pub match_score: f64,
    pub source_sheet: Option<String>,
    pub source_row: Option<i32>,
    pub is_manual: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for QuotationItem {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            quotation_id: Uuid::nil(),
            baseline_item_id: None,
            material_id: None,
            item_code: None,
            description: String::new(),
            offered_description: None,
            brand: None,
            unit: None,
            normalized_unit: None,
            unit_converted: false,
            quantity: None,
            unit_price: None,
            total_price: None,
            currency: crate::DEFAULT_BASE_CURRENCY.to_string(),
            normalized_price: None,
            match_score: 0.0,
            source_sheet: None,
            source_row: None,
            is_manual: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl QuotationItem {
    pub fn is_matched(&self) -> bool {
        self.baseline_item_id.is_some()
    }

    /// Line total in the quotation currency, derived from quantity × unit price when absent.
    pub fn line_total(&self) -> Option<f64> {
        self.total_price.or_else(|| match (self.quantity, self.unit_price) {
            (Some(q), Some(p)) => Some(q * p),
            _ => None,
        })
    }
}

/// Quotation totals in the quote currency and the process base currency.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct QuotationTotals {
    pub total_amount: f64,
    pub total_amount_base: f64,
    /// Items whose total could not be converted into the base currency.
    pub unconverted_items: usize,
}
