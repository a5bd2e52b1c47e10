//! Unit and currency conversion.
//!
//! Conversions never guess: an unknown unit, a dimension mismatch or a
//! missing exchange rate leaves the value as it was and says so.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Count,
    Length,
    Area,
}

/// Canonical units with their dimension and multiplier to the dimension base
/// (unit for counts, millimetre for lengths, square metre for areas).
const CANONICAL_UNITS: &[(&str, Dimension, f64)] = &[
    ("UND", Dimension::Count, 1.0),
    ("MM", Dimension::Length, 1.0),
    ("CM", Dimension::Length, 10.0),
    ("M", Dimension::Length, 1000.0),
    ("KM", Dimension::Length, 1_000_000.0),
    ("IN", Dimension::Length, 25.4),
    ("FT", Dimension::Length, 304.8),
    ("M2", Dimension::Area, 1.0),
];

const UNIT_ALIASES: &[(&str, &str)] = &[
    ("U", "UND"),
    ("UN", "UND"),
    ("UNID", "UND"),
    ("UNIDAD", "UND"),
    ("UNIDADES", "UND"),
    ("UNIT", "UND"),
    ("UNITS", "UND"),
    ("EA", "UND"),
    ("EACH", "UND"),
    ("PZA", "UND"),
    ("PZAS", "UND"),
    ("PIEZA", "UND"),
    ("PIEZAS", "UND"),
    ("NIU", "UND"),
    ("MILIMETRO", "MM"),
    ("MILIMETROS", "MM"),
    ("CENTIMETRO", "CM"),
    ("CENTIMETROS", "CM"),
    ("MT", "M"),
    ("MTS", "M"),
    ("ML", "M"),
    ("MTR", "M"),
    ("METRO", "M"),
    ("METROS", "M"),
    ("METROLINEAL", "M"),
    ("KILOMETRO", "KM"),
    ("KILOMETROS", "KM"),
    ("PULG", "IN"),
    ("PULGADA", "IN"),
    ("PULGADAS", "IN"),
    ("INCH", "IN"),
    ("INCHES", "IN"),
    ("PIE", "FT"),
    ("PIES", "FT"),
    ("FEET", "FT"),
    ("FOOT", "FT"),
    ("MT2", "M2"),
    ("MTS2", "M2"),
    ("METROCUADRADO", "M2"),
    ("METROSCUADRADOS", "M2"),
    ("SQM", "M2"),
];

/// Free-text unit folded for lookup: uppercase, compatibility-decomposed
/// (so `m²` becomes `M2`), letters and digits only.
pub fn unit_key(unit: &str) -> String {
    unit.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Canonical unit for a free-text unit, if recognized.
pub fn canonical_unit(unit: &str) -> Option<&'static str> {
    let key = unit_key(unit);
    if key.is_empty() {
        return None;
    }
    if let Some((name, _, _)) = CANONICAL_UNITS.iter().find(|(name, _, _)| *name == key) {
        return Some(name);
    }
    UNIT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, canonical)| *canonical)
}

fn lookup(unit: &str) -> Option<(Dimension, f64)> {
    let canonical = canonical_unit(unit)?;
    CANONICAL_UNITS
        .iter()
        .find(|(name, _, _)| *name == canonical)
        .map(|(_, dimension, multiplier)| (*dimension, *multiplier))
}

/// Result of a unit conversion. `converted == false` means `value` is the
/// untouched input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConversion {
    pub value: f64,
    pub converted: bool,
}

impl UnitConversion {
    fn unchanged(value: f64) -> Self {
        Self { value, converted: false }
    }
}

fn multipliers(from: Option<&str>, to: Option<&str>) -> Option<(f64, f64)> {
    let (from_dim, from_mult) = lookup(from?)?;
    let (to_dim, to_mult) = lookup(to?)?;
    (from_dim == to_dim).then_some((from_mult, to_mult))
}

/// Express a quantity measured in `from` in `to` units.
pub fn convert_quantity(value: f64, from: Option<&str>, to: Option<&str>) -> UnitConversion {
    match multipliers(from, to) {
        Some((from_mult, to_mult)) => UnitConversion {
            value: value * from_mult / to_mult,
            converted: true,
        },
        None => UnitConversion::unchanged(value),
    }
}

/// Express a price per `from` unit as a price per `to` unit.
pub fn convert_unit_price(value: f64, from: Option<&str>, to: Option<&str>) -> UnitConversion {
    match multipliers(from, to) {
        Some((from_mult, to_mult)) => UnitConversion {
            value: value * to_mult / from_mult,
            converted: true,
        },
        None => UnitConversion::unchanged(value),
    }
}

/// Canonical currency code for free-text currency labels.
pub fn canonical_currency(currency: &str) -> Option<String> {
    let key: String = currency
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_uppercase)
        .filter(|c| !c.is_whitespace() && *c != '.')
        .collect();

    match key.as_str() {
        "" => None,
        "USD" | "US$" | "$" | "DOLAR" | "DOLARES" => Some("USD".to_string()),
        "PEN" | "S/" | "SOL" | "SOLES" | "NUEVOSSOLES" => Some("PEN".to_string()),
        other => Some(other.to_string()),
    }
}

/// Convert `value` from one currency to another.
///
/// Identity when the currencies match or `from` is blank; `None` when a rate
/// is needed and missing or non-positive. USD↔PEN use `rate` as PEN per USD.
/// Any other pair is multiplied by `rate` as a best-effort fallback.
pub fn convert_currency(value: f64, from: &str, to: &str, rate: Option<f64>) -> Option<f64> {
    let Some(from) = canonical_currency(from) else {
        return Some(value);
    };
    let to = canonical_currency(to).unwrap_or_default();
    if from == to {
        return Some(value);
    }

    let rate = rate.filter(|r| r.is_finite() && *r > 0.0)?;
    match (from.as_str(), to.as_str()) {
        ("USD", "PEN") => Some(value * rate),
        ("PEN", "USD") => Some(value / rate),
        _ => Some(value * rate),
    }
}
