//! Repository module for database CRUD operations
//!
//! Typed repositories for the quotation engine tables. Reads go through the
//! pool; writes that must be atomic take a connection so callers can run them
//! inside one transaction.

pub mod process;
pub mod baseline;
pub mod quotation;
pub mod purchase;

pub use process::ProcessRepository;
pub use baseline::BaselineRepository;
pub use quotation::QuotationRepository;
pub use purchase::PurchaseRepository;
