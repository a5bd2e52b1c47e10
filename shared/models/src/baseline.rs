//! Baseline budget models.
//!
//! Baseline items are the lines of the buyer's reference budget. They are
//! created once per baseline import and are never rewritten afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Deepest section breadcrumb kept above a baseline row.
pub const MAX_SECTION_DEPTH: usize = 4;

/// A line of the buyer's reference budget.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BaselineItem {
    pub id: Uuid,
    pub process_id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub sheet_name: String,
    #[validate(custom = "validate_section_path")]
    pub section_path: Vec<String>,
    #[validate(length(max = 100))]
    pub item_code: Option<String>,
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    /// Prices other providers quoted for this line inside the baseline workbook.
    pub reference_quotes: Vec<ReferenceQuote>,
    pub row_number: i32,
    pub created_at: DateTime<Utc>,
}

/// A provider price printed next to a baseline line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReferenceQuote {
    pub provider: String,
    pub column: i32,
    pub unit_price: f64,
}

fn validate_section_path(path: &[String]) -> Result<(), ValidationError> {
    if path.len() > MAX_SECTION_DEPTH {
        return Err(ValidationError::new("section_path_too_deep"));
    }
    Ok(())
}

impl Default for BaselineItem {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id: Uuid::nil(),
            sheet_name: String::new(),
            section_path: Vec::new(),
            item_code: None,
            description: String::new(),
            unit: None,
            quantity: None,
            unit_price: None,
            total_price: None,
            reference_quotes: Vec::new(),
            row_number: 0,
            created_at: Utc::now(),
        }
    }
}

impl BaselineItem {
    pub fn new(process_id: Uuid, sheet_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            process_id,
            sheet_name: sheet_name.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Total price, derived from quantity × unit price when the sheet had none.
    pub fn line_total(&self) -> Option<f64> {
        self.total_price.or_else(|| match (self.quantity, self.unit_price) {
            (Some(q), Some(p)) => Some(q * p),
            _ => None,
        })
    }

    /// Top-level section label, if the row sits under any section.
    pub fn top_section(&self) -> Option<&str> {
        self.section_path.first().map(String::as_str)
    }
}
