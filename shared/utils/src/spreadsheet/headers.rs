//! Header hint tables and column resolution.
//!
//! Column picking is a pure function of the normalized header labels so it can
//! be tested without walking a sheet. Labels of two-row headers are joined as
//! `UPPER::LOWER`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use super::workbook::Cell;
use crate::text::normalize_text;

/// Separator between the two rows of a combined header label.
pub const LABEL_JOIN: &str = "::";

/// Keyword families recognized in header labels (normalized text, whole words).
#[derive(Debug, Clone, PartialEq)]
pub struct HintTables {
    pub item: Vec<&'static str>,
    pub description: Vec<&'static str>,
    pub unit: Vec<&'static str>,
    pub quantity: Vec<&'static str>,
    pub unit_price: Vec<&'static str>,
    pub total_price: Vec<&'static str>,
    pub offered_description: Vec<&'static str>,
    pub brand: Vec<&'static str>,
    /// Words that only qualify another header row (`ESTUDIO DEFINITIVO`, `SOLES`).
    pub qualifiers: Vec<&'static str>,
}

impl Default for HintTables {
    fn default() -> Self {
        Self {
            item: vec!["ITEM", "ITEMS", "COD", "CODIGO", "PARTIDA", "NRO"],
            description: vec![
                "DESCRIPCION",
                "DESCRIPCIONES",
                "DESCRIPTION",
                "DETALLE",
                "CONCEPTO",
                "DENOMINACION",
                "MATERIAL",
                "MATERIALES",
                "PRODUCTO",
            ],
            unit: vec!["UND", "UNID", "UNIDAD", "UNIDADES", "UM", "U M", "UNIT", "MEDIDA"],
            quantity: vec!["CANT", "CANTIDAD", "CANTIDADES", "METRADO", "METRADOS", "QTY"],
            unit_price: vec![
                "PU",
                "P U",
                "UNITARIO",
                "PRECIO",
                "COSTO",
                "PRECIO UNITARIO",
                "COSTO UNITARIO",
                "VALOR UNITARIO",
                "P UNIT",
                "UNIT PRICE",
            ],
            total_price: vec!["TOTAL", "PARCIAL", "IMPORTE", "MONTO", "SUBTOTAL", "VALOR TOTAL"],
            offered_description: vec!["OFERTADO", "OFERTADA", "OFERTA", "PROPUESTO", "PROPUESTA"],
            brand: vec!["MARCA", "MARCAS", "FABRICANTE", "BRAND"],
            qualifiers: vec![
                "ESTUDIO",
                "DEFINITIVO",
                "CONTRACTUAL",
                "SOLES",
                "USD",
                "DOLARES",
                "REFERENCIAL",
                "PROVEEDOR",
            ],
        }
    }
}

fn provider_quote_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(COTIZ|PRECIO\s+DE\s+VENTA)").expect("static regex"))
}

/// Whole-word (or whole-phrase) containment on a normalized label.
pub fn label_has(label: &str, keyword: &str) -> bool {
    if label.is_empty() {
        return false;
    }
    let padded = format!(" {} ", label.replace(LABEL_JOIN, " "));
    padded.contains(&format!(" {} ", keyword))
}

pub fn label_has_any(label: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| label_has(label, k))
}

pub fn is_provider_quote_label(label: &str) -> bool {
    provider_quote_regex().is_match(label)
}

pub fn mentions_usd(label: &str) -> bool {
    label_has_any(label, &["USD", "US", "DOLAR", "DOLARES"])
}

pub fn mentions_soles(label: &str) -> bool {
    label_has_any(label, &["SOLES", "SOL", "PEN", "S"])
}

/// Columns resolved from a header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub item: Option<usize>,
    pub description: Option<usize>,
    pub unit: Option<usize>,
    pub quantity: Option<usize>,
    pub unit_price: Option<usize>,
    pub total_price: Option<usize>,
    pub offered_description: Option<usize>,
    pub brand: Option<usize>,
    pub provider_quotes: Vec<usize>,
}

/// Normalized labels of one header row, optionally joined with the row below.
pub fn header_labels(upper: &[Cell], lower: Option<&[Cell]>) -> Vec<String> {
    let width = upper.len().max(lower.map_or(0, <[Cell]>::len));
    (0..width)
        .map(|c| {
            let top = upper.get(c).map(|cell| normalize_text(&cell.text())).unwrap_or_default();
            let bottom = lower
                .and_then(|row| row.get(c))
                .map(|cell| normalize_text(&cell.text()))
                .unwrap_or_default();
            match (top.is_empty(), bottom.is_empty()) {
                (false, false) => format!("{}{}{}", top, LABEL_JOIN, bottom),
                (false, true) => top,
                (true, false) => bottom,
                (true, true) => String::new(),
            }
        })
        .collect()
}

/// A row continues the header above it when it holds no numbers and at least
/// one cell reads like a numeric-column header or a qualifier.
///
/// Description and item words are left out so a section row such as
/// `MATERIALES` right under the header is not swallowed.
pub fn is_header_continuation(row: &[Cell], hints: &HintTables) -> bool {
    if row.iter().any(|c| c.number().is_some()) {
        return false;
    }
    row.iter().any(|cell| {
        let label = normalize_text(&cell.text());
        is_continuation_word(&label, hints)
    })
}

fn is_continuation_word(label: &str, hints: &HintTables) -> bool {
    [
        &hints.unit,
        &hints.quantity,
        &hints.unit_price,
        &hints.total_price,
        &hints.qualifiers,
    ]
    .iter()
    .any(|family| label_has_any(label, family))
        || is_provider_quote_label(label)
}

/// Subtotal and total lines, matched on a normalized description.
pub fn is_summary_label(normalized: &str) -> bool {
    normalized == "TOTAL"
        || normalized.starts_with("SUB TOTAL")
        || normalized.starts_with("SUBTOTAL")
        || normalized.starts_with("TOTAL ")
        || ["TOTAL SUMINISTRO", "TOTAL ESTUDIO", "TOTAL PROVEEDOR", "TOTAL PROVEDOR"]
            .iter()
            .any(|phrase| normalized.contains(phrase))
}

fn columns_matching(labels: &[String], keywords: &[&str]) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .filter(|(_, label)| label_has_any(label, keywords))
        .map(|(c, _)| c)
        .collect()
}

/// Preference among competing quantity/total columns: the definitive study
/// beats the contractual figures; quantity labels mentioning TOTAL are demoted.
pub fn preference_score(label: &str, is_quantity: bool) -> i32 {
    let mut score = 0;
    if label.contains("ESTUDIO DEFINITIVO") {
        score += 10;
    } else if label.contains("ESTUDIO") {
        score += 6;
    }
    if label.contains("CONTRACTUAL") {
        score += 3;
    }
    if is_quantity && label_has(label, "TOTAL") {
        score -= 8;
    }
    score
}

/// Highest-scoring candidate; ties go to the rightmost column.
fn pick_rightmost_best(candidates: &[usize], score: impl Fn(usize) -> i32) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for &c in candidates {
        let s = score(c);
        if best.map_or(true, |(_, b)| s >= b) {
            best = Some((c, s));
        }
    }
    best.map(|(c, _)| c)
}

/// Highest-scoring candidate; ties go to the leftmost column.
fn pick_leftmost_best(candidates: &[usize], score: impl Fn(usize) -> i32) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;
    for &c in candidates {
        let s = score(c);
        if best.map_or(true, |(_, b)| s > b) {
            best = Some((c, s));
        }
    }
    best.map(|(c, _)| c)
}

/// True when some label reads as a description and a different one as an item column.
pub fn has_description_and_item(labels: &[String], hints: &HintTables) -> bool {
    let descriptions = columns_matching(labels, &hints.description);
    let items = columns_matching(labels, &hints.item);
    descriptions
        .iter()
        .any(|d| items.iter().any(|i| i != d))
}

/// True when some label reads as a description and another as a price column.
pub fn has_description_and_price(labels: &[String], hints: &HintTables) -> bool {
    let descriptions = columns_matching(labels, &hints.description);
    let prices: Vec<usize> = columns_matching(labels, &hints.unit_price)
        .into_iter()
        .chain(columns_matching(labels, &hints.total_price))
        .collect();
    descriptions
        .iter()
        .any(|d| prices.iter().any(|p| p != d))
}

/// Resolve every column of a header from its labels alone.
pub fn resolve_columns(labels: &[String], hints: &HintTables) -> ColumnMap {
    let provider_quotes: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, l)| is_provider_quote_label(l))
        .map(|(c, _)| c)
        .collect();
    let is_provider = |c: &usize| provider_quotes.contains(c);

    let offered_candidates = columns_matching(labels, &hints.offered_description);
    let description_candidates = columns_matching(labels, &hints.description);
    let description = description_candidates
        .iter()
        .copied()
        .find(|c| !offered_candidates.contains(c))
        .or_else(|| description_candidates.first().copied());
    let offered_description = offered_candidates
        .iter()
        .copied()
        .find(|c| Some(*c) != description);

    let taken = |c: &usize, used: &[Option<usize>]| used.contains(&Some(*c));

    let item = columns_matching(labels, &hints.item)
        .into_iter()
        .find(|c| !taken(c, &[description, offered_description]));

    // `P UNIT` and `UNIT PRICE` carry the unit word but hold prices
    let unit = columns_matching(labels, &hints.unit).into_iter().find(|c| {
        let label = &labels[*c];
        !taken(c, &[description, item])
            && !label_has_any(label, &hints.quantity)
            && !label_has_any(label, &hints.unit_price)
            && !label_has_any(label, &hints.total_price)
    });

    let quantity_candidates: Vec<usize> = columns_matching(labels, &hints.quantity)
        .into_iter()
        .filter(|c| !taken(c, &[description, item, unit]) && !is_provider(c))
        .collect();
    let quantity = pick_rightmost_best(&quantity_candidates, |c| preference_score(&labels[c], true));

    let unit_price_candidates: Vec<usize> = columns_matching(labels, &hints.unit_price)
        .into_iter()
        .filter(|c| {
            !taken(c, &[description, item, unit, quantity])
                && !is_provider(c)
                && !label_has_any(&labels[*c], &hints.quantity)
        })
        .collect();
    let unit_price = pick_rightmost_best(&unit_price_candidates, |c| {
        let label = &labels[c];
        let mut score = preference_score(label, false);
        if label_has_any(label, &["UNITARIO", "UNIT", "PU", "P U"]) {
            score += 4;
        }
        if label_has_any(label, &["TOTAL", "PARCIAL", "IMPORTE", "MONTO"]) {
            score -= 8;
        }
        score
    })
    .filter(|c| !label_has_any(&labels[*c], &hints.total_price) || label_has_any(&labels[*c], &["UNITARIO", "UNIT", "PU", "P U"]));

    let total_candidates: Vec<usize> = columns_matching(labels, &hints.total_price)
        .into_iter()
        .filter(|c| {
            !taken(c, &[description, item, unit, quantity, unit_price])
                && !is_provider(c)
                && !label_has_any(&labels[*c], &hints.quantity)
        })
        .collect();
    let total_price = pick_rightmost_best(&total_candidates, |c| preference_score(&labels[c], false));

    let brand = columns_matching(labels, &hints.brand)
        .into_iter()
        .find(|c| !taken(c, &[description, item, offered_description]));

    ColumnMap {
        item,
        description,
        unit,
        quantity,
        unit_price,
        total_price,
        offered_description,
        brand,
        provider_quotes,
    }
}

/// Unit and total price columns of a supplier header.
///
/// A detected supplier column wins for the unit price. Otherwise price wording
/// and a SOLES mention are rewarded and TOTAL wording penalized. The total
/// prefers columns at or after the unit price, SOLES over USD.
pub fn resolve_supplier_prices(
    labels: &[String],
    hints: &HintTables,
    supplier_column: Option<usize>,
    excluded: &[Option<usize>],
) -> (Option<usize>, Option<usize>) {
    let is_excluded = |c: &usize| excluded.contains(&Some(*c));

    let unit_price = supplier_column.filter(|c| !is_excluded(c)).or_else(|| {
        let candidates: Vec<usize> = columns_matching(labels, &hints.unit_price)
            .into_iter()
            .filter(|c| !is_excluded(c))
            .collect();
        pick_leftmost_best(&candidates, |c| {
            let label = &labels[c];
            let mut score = 0;
            if label_has_any(label, &["PRECIO", "COSTO", "VALOR"]) {
                score += 3;
            }
            if label_has_any(label, &["UNITARIO", "UNIT", "PU", "P U"]) {
                score += 3;
            }
            if mentions_soles(label) {
                score += 2;
            }
            if label_has_any(label, &["TOTAL", "PARCIAL", "IMPORTE", "MONTO"]) {
                score -= 5;
            }
            score
        })
    });

    let candidates: Vec<usize> = columns_matching(labels, &hints.total_price)
        .into_iter()
        .filter(|c| Some(*c) != unit_price && !is_excluded(c))
        .collect();
    let total_price = pick_leftmost_best(&candidates, |c| {
        let label = &labels[c];
        let mut score = 0;
        if unit_price.map_or(false, |up| c >= up) {
            score += 4;
        }
        if mentions_soles(label) {
            score += 2;
        }
        if mentions_usd(label) {
            score -= 3;
        }
        score
    });

    (unit_price, total_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_label_has_whole_words() {
        assert!(label_has("PRECIO UNITARIO", "PRECIO"));
        assert!(label_has("METRADO::ESTUDIO DEFINITIVO", "ESTUDIO"));
        assert!(!label_has("CANTIDAD", "CANT"));
        assert!(!label_has("", "ITEM"));
    }

    #[test]
    fn test_resolve_simple_header() {
        let hints = HintTables::default();
        let map = resolve_columns(
            &labels(&["ITEM", "DESCRIPCION", "UND", "CANTIDAD", "PRECIO UNITARIO", "PARCIAL"]),
            &hints,
        );
        assert_eq!(map.item, Some(0));
        assert_eq!(map.description, Some(1));
        assert_eq!(map.unit, Some(2));
        assert_eq!(map.quantity, Some(3));
        assert_eq!(map.unit_price, Some(4));
        assert_eq!(map.total_price, Some(5));
        assert!(map.provider_quotes.is_empty());
    }

    #[test]
    fn test_price_headers_never_become_the_unit_column() {
        let hints = HintTables::default();
        let map = resolve_columns(&labels(&["ITEM", "DESCRIPCION", "CANT", "P UNIT"]), &hints);
        assert_eq!(map.unit, None);
        assert_eq!(map.quantity, Some(2));
        assert_eq!(map.unit_price, Some(3));

        let map = resolve_columns(&labels(&["ITEM", "DESCRIPTION", "QTY", "UNIT PRICE"]), &hints);
        assert_eq!(map.unit, None);
        assert_eq!(map.unit_price, Some(3));

        let map = resolve_columns(
            &labels(&["ITEM", "DESCRIPCION", "UNIT", "CANT", "COSTO UNIT", "TOTAL"]),
            &hints,
        );
        assert_eq!(map.unit, Some(2));
        assert_eq!(map.unit_price, Some(4));
        assert_eq!(map.total_price, Some(5));
    }

    #[test]
    fn test_quantity_prefers_definitive_study() {
        let hints = HintTables::default();
        let map = resolve_columns(
            &labels(&[
                "ITEM",
                "DESCRIPCION",
                "METRADO::CONTRACTUAL",
                "METRADO::ESTUDIO DEFINITIVO",
                "METRADO::TOTAL",
                "P U",
            ]),
            &hints,
        );
        assert_eq!(map.quantity, Some(3));
        assert_eq!(map.unit_price, Some(5));
    }

    #[test]
    fn test_quantity_total_penalty_and_rightmost_tie() {
        let hints = HintTables::default();
        let map = resolve_columns(
            &labels(&["ITEM", "DESCRIPCION", "CANTIDAD TOTAL", "CANT", "CANT"]),
            &hints,
        );
        assert_eq!(map.quantity, Some(4));
    }

    #[test]
    fn test_total_prefers_study_column() {
        let hints = HintTables::default();
        let map = resolve_columns(
            &labels(&["ITEM", "DESCRIPCION", "CANT", "TOTAL::ESTUDIO", "TOTAL::CONTRACTUAL"]),
            &hints,
        );
        assert_eq!(map.total_price, Some(3));
    }

    #[test]
    fn test_provider_quote_columns() {
        let hints = HintTables::default();
        let map = resolve_columns(
            &labels(&["ITEM", "DESCRIPCION", "CANT", "COTIZACION 1", "PRECIO DE VENTA", "TOTAL"]),
            &hints,
        );
        assert_eq!(map.provider_quotes, vec![3, 4]);
        assert_eq!(map.unit_price, None);
        assert_eq!(map.total_price, Some(5));
    }

    #[test]
    fn test_header_predicates() {
        let hints = HintTables::default();
        assert!(has_description_and_item(&labels(&["ITEM", "DESCRIPCION"]), &hints));
        assert!(!has_description_and_item(&labels(&["DESCRIPCION", "CANT"]), &hints));
        assert!(has_description_and_price(&labels(&["DESCRIPCION", "P U"]), &hints));
        assert!(!has_description_and_price(&labels(&["DESCRIPCION", "CANT"]), &hints));
    }

    #[test]
    fn test_supplier_prices_from_scores() {
        let hints = HintTables::default();
        let l = labels(&["DESCRIPCION", "CANT", "PRECIO UNITARIO::USD", "PRECIO UNITARIO::SOLES", "TOTAL::USD", "TOTAL::SOLES"]);
        let (up, total) = resolve_supplier_prices(&l, &hints, None, &[Some(0), Some(1)]);
        assert_eq!(up, Some(3));
        assert_eq!(total, Some(5));
    }

    #[test]
    fn test_supplier_column_wins_unit_price() {
        let hints = HintTables::default();
        let l = labels(&["DESCRIPCION", "CANT", "P U", "ACEROS SAC", "TOTAL"]);
        let (up, total) = resolve_supplier_prices(&l, &hints, Some(3), &[Some(0), Some(1)]);
        assert_eq!(up, Some(3));
        assert_eq!(total, Some(4));

        // a letterhead hit over the description column is ignored
        let (up, _) = resolve_supplier_prices(&l, &hints, Some(0), &[Some(0), Some(1)]);
        assert_eq!(up, Some(2));
    }

    #[test]
    fn test_header_continuation() {
        let hints = HintTables::default();
        let qualifiers = vec![Cell::Empty, Cell::Text("Estudio Definitivo".into())];
        let section = vec![Cell::Empty, Cell::Text("MATERIALES".into())];
        let data = vec![Cell::Text("P.U.".into()), Cell::Number(3.0)];
        assert!(is_header_continuation(&qualifiers, &hints));
        assert!(!is_header_continuation(&section, &hints));
        assert!(!is_header_continuation(&data, &hints));
    }

    #[test]
    fn test_summary_labels() {
        assert!(is_summary_label("TOTAL"));
        assert!(is_summary_label("SUB TOTAL ESTRUCTURAS"));
        assert!(is_summary_label("TOTAL GENERAL"));
        assert!(is_summary_label("MONTO TOTAL PROVEDOR"));
        assert!(!is_summary_label("TOTALIZADOR DE AGUA"));
        assert!(!is_summary_label("CEMENTO PORTLAND"));
    }

    #[test]
    fn test_header_labels_combine_two_rows() {
        let upper = vec![Cell::Text("Metrado".into()), Cell::Text("Descripción".into())];
        let lower = vec![Cell::Text("Estudio Definitivo".into())];
        let l = header_labels(&upper, Some(&lower));
        assert_eq!(l, vec!["METRADO::ESTUDIO DEFINITIVO".to_string(), "DESCRIPCION".to_string()]);
    }
}
