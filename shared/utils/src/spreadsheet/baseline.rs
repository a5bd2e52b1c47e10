//! Baseline Budget Reader
//!
//! Extracts budget lines from the buyer's reference workbook. Each sheet is
//! scanned for a header, then rows are classified in order as provider-name
//! rows, section rows, summary rows and data rows.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use uuid::Uuid;

use cotiza_models::{BaselineItem, ReferenceQuote};

use super::headers::{
    has_description_and_item, header_labels, is_header_continuation, is_summary_label,
    resolve_columns, ColumnMap, HintTables,
};
use super::workbook::{Cell, Sheet, Workbook};
use super::SheetDiagnostics;
use crate::config::ImportConfig;
use crate::error::{CotizaError, CotizaResult};
use crate::text::{clean_label, has_letters, normalize_code, normalize_text};

/// One budget line as read from the workbook, before it is tied to a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedBaselineRow {
    pub sheet_name: String,
    pub section_path: Vec<String>,
    pub item_code: Option<String>,
    pub description: String,
    pub unit: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total_price: Option<f64>,
    pub reference_quotes: Vec<ReferenceQuote>,
    /// 1-based row in the sheet.
    pub row_number: usize,
}

impl ParsedBaselineRow {
    pub fn into_baseline_item(self, process_id: Uuid) -> BaselineItem {
        BaselineItem {
            sheet_name: self.sheet_name,
            section_path: self.section_path,
            item_code: self.item_code,
            unit: self.unit,
            quantity: self.quantity,
            unit_price: self.unit_price,
            total_price: self.total_price,
            reference_quotes: self.reference_quotes,
            row_number: i32::try_from(self.row_number).unwrap_or(i32::MAX),
            ..BaselineItem::new(process_id, String::new(), self.description)
        }
    }
}

/// Result of reading a baseline workbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedBaseline {
    pub rows: Vec<ParsedBaselineRow>,
    pub sheets: Vec<SheetDiagnostics>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
struct HeaderMatch {
    row: usize,
    data_start: usize,
    columns: ColumnMap,
}

fn fp_sheet_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^FP[- ]").expect("static regex"))
}

/// Summary, payroll-form and overhead sheets carry no budget lines.
pub fn is_non_budget_sheet(name: &str) -> bool {
    let name = name.trim().to_uppercase();
    name.contains("RESUMEN")
        || ["RES-", "RES ", "RES_"].iter().any(|p| name.starts_with(p))
        || fp_sheet_regex().is_match(&name)
        || name == "RG"
        || name.starts_with("GG")
}

/// A row that only names the providers above the quote columns: text under at
/// least one provider column and no number anywhere.
pub fn is_provider_name_row(row: &[Cell], provider_columns: &[usize]) -> bool {
    if provider_columns.is_empty() || row.iter().any(|c| c.number().is_some()) {
        return false;
    }
    provider_columns
        .iter()
        .any(|&c| row.get(c).map_or(false, |cell| !cell.is_blank()))
}

/// Section breadcrumb of the rows being read.
#[derive(Debug, Default)]
struct SectionStack {
    labels: Vec<String>,
    max_depth: usize,
}

impl SectionStack {
    fn new(max_depth: usize) -> Self {
        Self {
            labels: Vec::new(),
            max_depth: max_depth.max(1),
        }
    }

    /// Return to an ancestor with the same label, or descend into a new one.
    fn enter(&mut self, label: &str) {
        let key = normalize_text(label);
        if let Some(pos) = self.labels.iter().position(|l| normalize_text(l) == key) {
            self.labels.truncate(pos + 1);
            return;
        }
        self.labels.push(label.to_string());
        if self.labels.len() > self.max_depth {
            self.labels.remove(0);
        }
    }

    fn path(&self) -> Vec<String> {
        self.labels.clone()
    }
}

/// Baseline workbook reader
pub struct BaselineReader {
    config: ImportConfig,
    hints: HintTables,
}

impl Default for BaselineReader {
    fn default() -> Self {
        Self::new(ImportConfig::default())
    }
}

impl BaselineReader {
    pub fn new(config: ImportConfig) -> Self {
        Self {
            config,
            hints: HintTables::default(),
        }
    }

    pub fn with_hints(mut self, hints: HintTables) -> Self {
        self.hints = hints;
        self
    }

    pub fn read_bytes(&self, filename: &str, data: &[u8]) -> CotizaResult<ParsedBaseline> {
        let workbook = Workbook::from_bytes(filename, data)?;
        self.read(&workbook)
    }

    /// Read every budget sheet; fails when no sheet has a recognizable header.
    pub fn read(&self, workbook: &Workbook) -> CotizaResult<ParsedBaseline> {
        let mut parsed = ParsedBaseline::default();
        let mut headers_found = 0;

        for sheet in &workbook.sheets {
            if is_non_budget_sheet(&sheet.name) {
                tracing::debug!(sheet = %sheet.name, "Skipping non-budget sheet");
                parsed
                    .sheets
                    .push(SheetDiagnostics::skipped(&sheet.name, "non-budget sheet name"));
                continue;
            }

            let Some(header) = self.find_header(sheet) else {
                tracing::debug!(sheet = %sheet.name, "No budget header found");
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
                "Budget header detected"
            );

            let rows = self.read_rows(sheet, &header, &mut parsed.warnings);
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
                "no worksheet contains a recognizable budget header",
            ));
        }

        Ok(parsed)
    }

    fn find_header(&self, sheet: &Sheet) -> Option<HeaderMatch> {
        let limit = sheet.row_count().min(self.config.baseline_header_scan_rows);
        (0..limit).find_map(|r| self.header_at(sheet, r))
    }

    /// Try the two-row label first, then the single row, before giving up on `r`.
    fn header_at(&self, sheet: &Sheet, r: usize) -> Option<HeaderMatch> {
        let upper = sheet.row(r);
        let lower = sheet.row(r + 1);
        let continued = is_header_continuation(lower, &self.hints)
            && !has_description_and_item(&header_labels(lower, None), &self.hints);
        let data_start = if continued { r + 2 } else { r + 1 };

        let mut attempts = Vec::with_capacity(2);
        if continued {
            attempts.push(header_labels(upper, Some(lower)));
        }
        attempts.push(header_labels(upper, None));

        attempts.into_iter().find_map(|labels| {
            if !has_description_and_item(&labels, &self.hints) {
                return None;
            }
            let columns = resolve_columns(&labels, &self.hints);
            columns.quantity.is_some().then_some(HeaderMatch {
                row: r,
                data_start,
                columns,
            })
        })
    }

    fn read_rows(
        &self,
        sheet: &Sheet,
        header: &HeaderMatch,
        warnings: &mut Vec<String>,
    ) -> Vec<ParsedBaselineRow> {
        let columns = &header.columns;
        let mut sections = SectionStack::new(self.config.max_section_depth);
        let mut provider_names: HashMap<usize, String> = HashMap::new();
        let mut rows = Vec::new();

        let text_at = |r: usize, col: Option<usize>| -> String {
            col.map(|c| clean_label(&sheet.cell(r, c).text()))
                .unwrap_or_default()
        };
        let number_at =
            |r: usize, col: Option<usize>| -> Option<f64> { col.and_then(|c| sheet.cell(r, c).number()) };

        for r in header.data_start..sheet.row_count() {
            let row = sheet.row(r);
            if row.iter().all(Cell::is_blank) {
                continue;
            }

            if is_provider_name_row(row, &columns.provider_quotes) {
                for &c in &columns.provider_quotes {
                    let name = clean_label(&sheet.cell(r, c).text());
                    if !name.is_empty() {
                        provider_names.insert(c, name);
                    }
                }
                continue;
            }

            let description = text_at(r, columns.description);
            let quantity = number_at(r, columns.quantity);
            let unit_price = number_at(r, columns.unit_price);
            let total_price = number_at(r, columns.total_price);
            let has_numbers = quantity.is_some() || unit_price.is_some() || total_price.is_some();
            let normalized = normalize_text(&description);

            if !has_numbers && has_letters(&description) && !is_summary_label(&normalized) {
                sections.enter(&description);
                continue;
            }

            if is_summary_label(&normalized) {
                continue;
            }

            if !has_numbers {
                continue;
            }

            if description.is_empty() {
                warnings.push(format!(
                    "{} row {}: numeric values without a description, skipped",
                    sheet.name,
                    r + 1
                ));
                continue;
            }

            let total_price = total_price.or_else(|| match (quantity, unit_price) {
                (Some(q), Some(p)) => Some(q * p),
                _ => None,
            });

            let reference_quotes = columns
                .provider_quotes
                .iter()
                .filter_map(|&c| {
                    let unit_price = sheet.cell(r, c).number()?;
                    let provider = provider_names
                        .get(&c)
                        .cloned()
                        .unwrap_or_else(|| clean_label(&sheet.cell(header.row, c).text()));
                    Some(ReferenceQuote {
                        provider,
                        column: i32::try_from(c).unwrap_or(i32::MAX),
                        unit_price,
                    })
                })
                .collect();

            let unit = text_at(r, columns.unit);
            rows.push(ParsedBaselineRow {
                sheet_name: sheet.name.clone(),
                section_path: sections.path(),
                item_code: normalize_code(&text_at(r, columns.item)),
                description,
                unit: (!unit.is_empty()).then_some(unit),
                quantity,
                unit_price,
                total_price,
                reference_quotes,
                row_number: r + 1,
            });
        }

        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(sheets: Vec<Sheet>) -> CotizaResult<ParsedBaseline> {
        BaselineReader::default().read(&Workbook::new(sheets))
    }

    #[test]
    fn test_total_derived_from_quantity_and_price() {
        let sheet = Sheet::from_strings(
            "Presupuesto",
            &[
                &["ITEM", "DESCRIPCION", "UND", "CANT", "P.U."],
                &["01", "Cemento", "BLS", "10", "25"],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.description, "Cemento");
        assert_eq!(row.item_code.as_deref(), Some("01"));
        assert_eq!(row.unit.as_deref(), Some("BLS"));
        assert_eq!(row.total_price, Some(250.0));
        assert_eq!(row.row_number, 2);
    }

    #[test]
    fn test_abbreviated_unit_price_header_keeps_prices() {
        let sheet = Sheet::from_strings(
            "Presupuesto",
            &[
                &["ITEM", "DESCRIPCION", "CANT", "P.UNIT"],
                &["1", "Arena gruesa", "5", "60"],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.unit, None);
        assert_eq!(row.unit_price, Some(60.0));
        assert_eq!(row.total_price, Some(300.0));
    }

    #[test]
    fn test_two_row_header_sections_and_summaries() {
        let sheet = Sheet::from_strings(
            "Estructuras",
            &[
                &["ITEM", "DESCRIPCION", "UND", "METRADO", "METRADO", "PRECIO UNITARIO", "PARCIAL"],
                &["", "", "", "CONTRACTUAL", "ESTUDIO DEFINITIVO", "", ""],
                &["01", "ESTRUCTURAS", "", "", "", "", ""],
                &["01.01", "CONCRETO", "", "", "", "", ""],
                &["01.01.01", "Acero corrugado", "KG", "100", "120", "4.5", ""],
                &["", "SUB TOTAL ESTRUCTURAS", "", "", "", "", "540"],
                &["", "", "", "", "", "", ""],
                &["", "ESTRUCTURAS", "", "", "", "", ""],
                &["01.02", "Encofrado", "M2", "", "30", "20", "600"],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();

        assert_eq!(parsed.rows.len(), 2);
        let acero = &parsed.rows[0];
        assert_eq!(acero.quantity, Some(120.0));
        assert_eq!(acero.total_price, Some(540.0));
        assert_eq!(acero.section_path, vec!["ESTRUCTURAS".to_string(), "CONCRETO".to_string()]);

        let encofrado = &parsed.rows[1];
        assert_eq!(encofrado.section_path, vec!["ESTRUCTURAS".to_string()]);
        assert_eq!(encofrado.total_price, Some(600.0));

        let diagnostics = &parsed.sheets[0];
        assert_eq!(diagnostics.header_row, Some(1));
        assert_eq!(diagnostics.rows_extracted, 2);
    }

    #[test]
    fn test_section_depth_evicts_oldest() {
        let mut stack = SectionStack::new(2);
        stack.enter("A");
        stack.enter("B");
        stack.enter("C");
        assert_eq!(stack.path(), vec!["B".to_string(), "C".to_string()]);
        stack.enter("b");
        assert_eq!(stack.path(), vec!["B".to_string()]);
    }

    #[test]
    fn test_provider_rows_label_reference_quotes() {
        let sheet = Sheet::from_strings(
            "Fierro",
            &[
                &["ITEM", "DESCRIPCION", "UND", "CANT", "P.U.", "COTIZACION 1", "COTIZACION 2"],
                &["", "", "", "", "", "Aceros SAC", "Ferreteria Lima"],
                &["01", "Fierro 1/2", "VAR", "50", "30", "29.5", "31"],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        let quotes = &parsed.rows[0].reference_quotes;
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].provider, "Aceros SAC");
        assert_eq!(quotes[0].column, 5);
        assert_eq!(quotes[0].unit_price, 29.5);
        assert_eq!(quotes[1].provider, "Ferreteria Lima");
    }

    #[test]
    fn test_provider_name_row_predicate() {
        let names = vec![Cell::Empty, Cell::Text("Aceros SAC".into())];
        let priced = vec![Cell::Number(3.0), Cell::Text("Aceros SAC".into())];
        assert!(is_provider_name_row(&names, &[1]));
        assert!(!is_provider_name_row(&priced, &[1]));
        assert!(!is_provider_name_row(&names, &[]));
    }

    #[test]
    fn test_header_found_mid_sheet() {
        let sheet = Sheet::from_strings(
            "Obra",
            &[
                &["PRESUPUESTO DE OBRA", ""],
                &["Cliente: Municipalidad", ""],
                &["DESCRIPCION", "CANT"],
                &["ITEM", "DESCRIPCION", "CANT", "P.U."],
                &["1", "Arena gruesa", "5", "60"],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();
        assert_eq!(parsed.sheets[0].header_row, Some(4));
        assert_eq!(parsed.rows[0].total_price, Some(300.0));
    }

    #[test]
    fn test_single_row_retry_when_combined_loses_quantity() {
        let sheet = Sheet::from_strings(
            "Obra",
            &[
                &["ITEM", "DESCRIPCION", "UND", "CANT"],
                &["", "", "", "PRECIO DE VENTA"],
                &["1", "Arena gruesa", "M3", "5"],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();
        let columns = parsed.sheets[0].columns.clone().unwrap();
        assert_eq!(columns.quantity, Some(3));
        assert_eq!(parsed.rows[0].quantity, Some(5.0));
    }

    #[test]
    fn test_non_budget_sheets_are_skipped() {
        assert!(is_non_budget_sheet("Resumen General"));
        assert!(is_non_budget_sheet("RES-01"));
        assert!(is_non_budget_sheet("FP 2"));
        assert!(is_non_budget_sheet("rg"));
        assert!(is_non_budget_sheet("GG Obra"));
        assert!(!is_non_budget_sheet("FPX"));
        assert!(!is_non_budget_sheet("Estructuras"));

        let resumen = Sheet::from_strings(
            "RESUMEN",
            &[&["ITEM", "DESCRIPCION", "CANT"], &["1", "Total obra", "1"]],
        );
        let obra = Sheet::from_strings(
            "Obra",
            &[&["ITEM", "DESCRIPCION", "CANT"], &["1", "Arena", "3"]],
        );
        let parsed = read(vec![resumen, obra]).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].sheet_name, "Obra");
        assert!(parsed.sheets[0].skipped_reason.is_some());
    }

    #[test]
    fn test_rows_without_numbers_or_description_are_dropped() {
        let sheet = Sheet::from_strings(
            "Obra",
            &[
                &["ITEM", "DESCRIPCION", "CANT", "P.U."],
                &["1", "", "3", "4"],
                &["2", "-", "", ""],
            ],
        );
        let parsed = read(vec![sheet]).unwrap();
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
    }

    #[test]
    fn test_no_header_is_a_parse_error() {
        let sheet = Sheet::from_strings("Notas", &[&["hola", "mundo"], &["1", "2"]]);
        assert!(matches!(read(vec![sheet]), Err(CotizaError::Parse { .. })));
        assert!(matches!(read(vec![]), Err(CotizaError::Parse { .. })));
    }

    #[test]
    fn test_into_baseline_item() {
        let sheet = Sheet::from_strings(
            "Obra",
            &[&["ITEM", "DESCRIPCION", "CANT", "P.U."], &["3.0", "Arena", "3", "4"]],
        );
        let parsed = read(vec![sheet]).unwrap();
        let process_id = Uuid::new_v4();
        let item = parsed.rows[0].clone().into_baseline_item(process_id);
        assert_eq!(item.process_id, process_id);
        assert_eq!(item.sheet_name, "Obra");
        assert_eq!(item.item_code.as_deref(), Some("3"));
        assert_eq!(item.line_total(), Some(12.0));
        assert_eq!(item.row_number, 2);
    }
}
