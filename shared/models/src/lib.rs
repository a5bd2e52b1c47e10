//! # Cotiza Core Domain Models
//!
//! Persisted records of the procurement quotation engine and the report
//! shapes produced from them.
//!
//! ## Key Models
//!
//! - **QuotationProcess**: owns a baseline budget and the supplier quotations compared against it
//! - **BaselineItem**: one line of the buyer's reference budget, with its section breadcrumb
//! - **Quotation** / **QuotationItem**: a supplier offer and its priced lines, matched or not
//! - **PurchaseOrderLine** / **PurchaseDeliveryItem**: fulfillment records read for progress reports
//!
//! ## Validation
//!
//! Persisted models derive `validator::Validate`: non-empty descriptions,
//! 3-letter currency codes, non-negative rates and match scores in [0, 1].

pub mod process;
pub mod baseline;
pub mod quotation;
pub mod purchase;
pub mod report;


pub use process::*;
pub use baseline::*;
pub use quotation::*;
pub use purchase::*;
pub use report::*;
