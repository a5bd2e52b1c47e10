//! Supplier Quote Reader
//!
//! Extracts priced lines from a supplier's quotation workbook. Every sheet is
//! tried; a sheet without a header is skipped and only a workbook with no
//! header at all is an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::headers::{
    has_description_and_price, header_labels, is_header_continuation, is_summary_label,
    label_has_any, mentions_usd, resolve_columns, resolve_supplier_prices, ColumnMap, HintTables,
};
use super::workbook::{Cell, Sheet, Workbook};
use super::SheetDiagnostics;
use crate::config::ImportConfig;
use crate::error::{CotizaError, CotizaResult};
use crate::text::{clean_label, has_letters, normalize_code, normalize_text};

/// One priced line of a supplier quote. Not persisted as such.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SupplierQuoteRow {
    pub sheet_name: String,
    /// 1-based row in the sheet.
    pub row_number: usize,
    pub item_code: Option<String>,
    pub description: String,
    pub offered_description: Option<String>,
    pub brand: Option<String>,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedSupplierQuote {
    pub rows: Vec<SupplierQuoteRow>,
    pub sheets: Vec<SheetDiagnostics>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
struct HeaderMatch {
    row: usize,
    data_start: usize,
    columns: ColumnMap,
}

/// Supplier workbook reader
pub struct SupplierReader {
    config: ImportConfig,
    hints: HintTables,
    supplier_name: Option<String>,
}

impl Default for SupplierReader {
    fn default() -> Self {
        Self::new(ImportConfig::default())
    }
}

impl SupplierReader {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            hints: HintTables::default(),
            supplier_name: None,
        }
    }

    /// Look for a price column carrying this supplier's name.
    pub fn with_supplier_name(mut self, name: impl Into<String>) -> Self {
        self.supplier_name = Some(name.into());
        self
    }

    pub fn with_hints(mut self, hints: HintTables) -> Self {
        self.hints = hints;
        self
    }

    pub fn read_bytes(&self, filename: &str, data: &[u8]) -> CotizaResult<ParsedSupplierQuote> {
        let workbook = Workbook::from_bytes(filename, data)?;
        self.read(&workbook)
    }

    pub fn read(&self, workbook: &Workbook) -> CotizaResult<ParsedSupplierQuote> {
        let mut parsed = ParsedSupplierQuote::default();
        let mut headers_found = 0;

        for sheet in &workbook.sheets {
            let Some(header) = self.find_header(sheet) else {
                tracing::debug!(sheet = %sheet.name, "No quotation header found, sheet skipped");
                parsed
                    .sheets
                    .push(SheetDiagnostics::skipped(&sheet.name, "no header found"));
                continue;
            };
            headers_found += 1;

            tracing::debug!(
                sheet = %sheet.name,
                header_row = header.row + 1,
                columns = ?header.columns,
                "Quotation header detected"
            );

            let rows = self.read_rows(sheet, &header);
            if rows.is_empty() {
                parsed
                    .warnings
                    .push(format!("{}: header found but no priced rows", sheet.name));
            }
            parsed.sheets.push(SheetDiagnostics {
                sheet_name: sheet.name.clone(),
                header_row: Some(header.row + 1),
                columns: Some(header.columns.clone()),
                rows_extracted: rows.len(),
                skipped_reason: None,
            });
            parsed.rows.extend(rows);
        }

        if headers_found == 0 {
            return Err(CotizaError::parse(
                "no worksheet contains a recognizable quotation header",
            ));
        }

        Ok(parsed)
    }

    /// Slide over the first rows one position at a time.
    fn find_header(&self, sheet: &Sheet) -> Option<HeaderMatch> {
        let limit = sheet.row_count().min(self.config.supplier_header_scan_rows);
        let supplier_column = self.find_supplier_column(sheet);
        (0..limit).find_map(|r| self.header_at(sheet, r, supplier_column))
    }

    fn header_at(&self, sheet: &Sheet, r: usize, supplier_column: Option<usize>) -> Option<HeaderMatch> {
        let upper = sheet.row(r);
        let lower = sheet.row(r + 1);
        let continued = is_header_continuation(lower, &self.hints)
            && !has_description_and_price(&header_labels(lower, None), &self.hints);
        let data_start = if continued { r + 2 } else { r + 1 };

        let labels = if continued {
            header_labels(upper, Some(lower))
        } else {
            header_labels(upper, None)
        };
        if !has_description_and_price(&labels, &self.hints) {
            return None;
        }

        let mut columns = resolve_columns(&labels, &self.hints);
        let excluded = [
            columns.description,
            columns.item,
            columns.unit,
            columns.quantity,
            columns.offered_description,
            columns.brand,
        ];
        let (unit_price, total_price) =
            resolve_supplier_prices(&labels, &self.hints, supplier_column, &excluded);
        columns.unit_price = unit_price;
        columns.total_price = total_price;

        if columns.unit_price.is_none() && columns.total_price.is_none() {
            return None;
        }

        Some(HeaderMatch {
            row: r,
            data_start,
            columns,
        })
    }

    /// Column whose cells name the supplier most often near the top of the sheet,
    /// moved one right when it is a USD price followed by a SOLES column.
    fn find_supplier_column(&self, sheet: &Sheet) -> Option<usize> {
        let needle = normalize_text(self.supplier_name.as_deref()?);
        if needle.is_empty() {
            return None;
        }

        let limit = sheet.row_count().min(self.config.supplier_name_scan_rows);
        let mut hits: BTreeMap<usize, usize> = BTreeMap::new();
        let mut first_row: BTreeMap<usize, usize> = BTreeMap::new();
        for r in 0..limit {
            for (c, cell) in sheet.row(r).iter().enumerate() {
                if normalize_text(&cell.text()).contains(&needle) {
                    *hits.entry(c).or_default() += 1;
                    first_row.entry(c).or_insert(r);
                }
            }
        }

        let mut best: Option<(usize, usize)> = None;
        for (&c, &count) in &hits {
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((c, count));
            }
        }
        let (column, _) = best?;
        let start = first_row.get(&column).copied().unwrap_or(0);
        Some(self.apply_soles_shift(sheet, column, start))
    }

    fn apply_soles_shift(&self, sheet: &Sheet, column: usize, start: usize) -> usize {
        let end = sheet.row_count().min(start + self.config.soles_shift_scan_rows);
        let label = |r: usize, c: usize| normalize_text(&sheet.cell(r, c).text());

        for r in start..end {
            if !label_has_any(&label(r, column + 1), &["SOLES"]) {
                continue;
            }
            let usd_here = mentions_usd(&label(r, column));
            let usd_above = r > 0 && mentions_usd(&label(r - 1, column));
            if usd_here || usd_above {
                tracing::debug!(sheet = %sheet.name, column, "Supplier price column shifted to SOLES");
                return column + 1;
            }
        }
        column
    }

    fn read_rows(&self, sheet: &Sheet, header: &HeaderMatch) -> Vec<SupplierQuoteRow> {
        let columns = &header.columns;
        let text_at = |r: usize, col: Option<usize>| -> String {
            col.map(|c| clean_label(&sheet.cell(r, c).text()))
                .unwrap_or_default()
        };
        let number_at =
            |r: usize, col: Option<usize>| -> Option<f64> { col.and_then(|c| sheet.cell(r, c).number()) };
        let non_empty = |s: String| (!s.is_empty()).then_some(s);

        let mut rows = Vec::new();
        for r in header.data_start..sheet.row_count() {
            if sheet.row(r).iter().all(Cell::is_blank) {
                continue;
            }

            let item_code = normalize_code(&text_at(r, columns.item));
            if item_code.as_deref() == Some("ITEM") {
                continue;
            }

            let offered_description = non_empty(text_at(r, columns.offered_description));
            let description = self.row_description(sheet, r, columns, offered_description.as_deref());
            if description.is_empty() || is_summary_label(&normalize_text(&description)) {
                continue;
            }

            let quantity = number_at(r, columns.quantity);
            let unit_price = number_at(r, columns.unit_price);
            let total_price = number_at(r, columns.total_price);

            let priced = |v: Option<f64>| v.map_or(false, |v| v.is_finite() && v != 0.0);
            if !priced(unit_price) && !priced(total_price) {
                continue;
            }

            let unit_price = unit_price.or_else(|| match (total_price, quantity) {
                (Some(t), Some(q)) if q > 0.0 => Some(t / q),
                _ => None,
            });
            let total_price = total_price.or_else(|| match (quantity, unit_price) {
                (Some(q), Some(p)) => Some(q * p),
                _ => None,
            });

            rows.push(SupplierQuoteRow {
                sheet_name: sheet.name.clone(),
                row_number: r + 1,
                item_code,
                description,
                offered_description,
                brand: non_empty(text_at(r, columns.brand)),
                unit: non_empty(text_at(r, columns.unit)),
                quantity,
                unit_price,
                total_price,
            });
        }

        rows
    }

    /// Primary description, else the offered description, else the cell to its right.
    fn row_description(
        &self,
        sheet: &Sheet,
        r: usize,
        columns: &ColumnMap,
        offered: Option<&str>,
    ) -> String {
        let Some(col) = columns.description else {
            return offered.unwrap_or_default().to_string();
        };

        let primary = clean_label(&sheet.cell(r, col).text());
        if has_letters(&primary) {
            return primary;
        }
        if let Some(offered) = offered.filter(|o| has_letters(o)) {
            return offered.to_string();
        }

        let right = clean_label(&sheet.cell(r, col + 1).text());
        let right_is_other_field = [
            columns.unit,
            columns.quantity,
            columns.unit_price,
            columns.total_price,
            columns.brand,
        ]
        .contains(&Some(col + 1));
        if has_letters(&right) && !right_is_other_field {
            right
        } else {
            String::new()
        }
    }
}
