//! Spreadsheet Reading Module
//!
//! Loads XLSX, XLS and CSV workbooks and extracts line items from hand-built
//! budget and quotation layouts: headers split over two rows, duplicate
//! total columns and per-sheet section hierarchies.

pub mod baseline;
pub mod cells;
pub mod headers;
pub mod supplier;
pub mod workbook;

use serde::{Deserialize, Serialize};

pub use baseline::{BaselineReader, ParsedBaseline, ParsedBaselineRow};
pub use cells::parse_number_text;
pub use headers::{resolve_columns, resolve_supplier_prices, ColumnMap, HintTables};
pub use supplier::{ParsedSupplierQuote, SupplierQuoteRow, SupplierReader};
pub use workbook::{Cell, Sheet, Workbook, WorkbookFormat};

/// What a reader made of one worksheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetDiagnostics {
    pub sheet_name: String,
    /// 1-based row of the detected header.
    pub header_row: Option<usize>,
    pub columns: Option<ColumnMap>,
    pub rows_extracted: usize,
    pub skipped_reason: Option<String>,
}

impl SheetDiagnostics {
    fn skipped(sheet_name: &str, reason: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            skipped_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}
