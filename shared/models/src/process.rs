//! Procurement process models.
//!
//! A quotation process owns the buyer's baseline budget and every supplier
//! quotation compared against it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Currency every process falls back to when none is configured.
pub const DEFAULT_BASE_CURRENCY: &str = "PEN";

/// A procurement process: one baseline budget, many supplier quotations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq)]
pub struct QuotationProcess {
    pub id: Uuid,
    #[validate(length(min = 1, max = 200, message = "Process name must be between 1 and 200 characters"))]
    pub name: String,
    #[validate(length(min = 3, max = 3, message = "Base currency must be a 3-letter code"))]
    pub base_currency: String,
    #[validate(range(min = 0.0, message = "Exchange rate must be positive"))]
    pub exchange_rate: Option<f64>,
    #[validate(range(min = 0.0, max = 1.0, message = "Target margin must be a fraction between 0 and 1"))]
    pub target_margin_pct: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for QuotationProcess {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            base_currency: DEFAULT_BASE_CURRENCY.to_string(),
            exchange_rate: None,
            target_margin_pct: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}

impl QuotationProcess {
    pub fn new(name: impl Into<String>, base_currency: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_currency: base_currency.into(),
            ..Default::default()
        }
    }

    pub fn with_exchange_rate(mut self, rate: f64) -> Self {
        self.exchange_rate = Some(rate);
        self
    }

    pub fn with_target_margin(mut self, margin: f64) -> Self {
        self.target_margin_pct = Some(margin);
        self
    }
}
