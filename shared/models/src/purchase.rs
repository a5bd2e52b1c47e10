//! Purchase fulfillment records.
//!
//! Order and delivery lines are owned by the surrounding purchasing workflow;
//! this crate only reads them to compute fulfillment progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq)]
pub struct PurchaseOrderLine {
    pub id: Uuid,
    pub process_id: Uuid,
    pub baseline_item_id: Option<Uuid>,
    pub quotation_item_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub description: String,
    pub unit: Option<String>,
    #[validate(range(min = 0.0, message = "Ordered quantity must not be negative"))]
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Default for PurchaseOrderLine {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id: Uuid::nil(),
            baseline_item_id: None,
            quotation_item_id: None,
            description: String::new(),
            unit: None,
            quantity: 0.0,
            unit_price: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, Validate, PartialEq)]
pub struct PurchaseDeliveryItem {
    pub id: Uuid,
    pub process_id: Uuid,
    pub order_line_id: Option<Uuid>,
    pub baseline_item_id: Option<Uuid>,
    #[validate(length(min = 1))]
    pub description: String,
    pub unit: Option<String>,
    #[validate(range(min = 0.0, message = "Received quantity must not be negative"))]
    pub quantity: f64,
    pub received_at: DateTime<Utc>,
}

impl Default for PurchaseDeliveryItem {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            process_id: Uuid::nil(),
            order_line_id: None,
            baseline_item_id: None,
            description: String::new(),
            unit: None,
            quantity: 0.0,
            received_at: Utc::now(),
        }
    }
}
