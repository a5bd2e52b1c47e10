//! # Cotiza Quotation Engine
//!
//! Matches supplier quotation lines to a buyer's baseline budget, normalizes
//! units and currencies, and aggregates offers into rankings and
//! purchase-fulfillment progress.
//!
//! ## Pipeline
//!
//! 1. [`QuotationEngine::import_baseline`] reads the budget workbook and replaces the process baseline
//! 2. [`QuotationEngine::import_supplier_quote`] reads a quote, matches each row through a [`BaselineIndex`]
//!    and stores the normalized items with recomputed totals
//! 3. [`QuotationEngine::get_process_summary`] and [`QuotationEngine::get_purchase_progress`] report on the result

pub mod aggregator;
pub mod cache;
pub mod index;
pub mod matcher;
pub mod service;

pub use aggregator::{
    compute_totals, material_comparison, normalize_offer, process_summary, purchase_progress,
    rankings, section_summaries, NormalizedPrice,
};
pub use cache::{Clock, SummaryCache, SystemClock};
pub use index::{BaselineIndex, IndexEntry};
pub use matcher::{match_baseline, MatchResult};
pub use service::{ImportOutcome, ManualItemInput, ProcessContext, QuotationEngine, SupplierContext};
