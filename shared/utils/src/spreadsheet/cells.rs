//! Numeric coercion of hand-typed spreadsheet cells.

use regex::Regex;
use std::sync::OnceLock;

/// Currency markers stripped before parsing, longest first.
const CURRENCY_MARKERS: &[&str] = &["US$", "S/.", "S/", "USD", "PEN", "$", "€"];

fn grouping_regex(separator: char) -> &'static Regex {
    static COMMA: OnceLock<Regex> = OnceLock::new();
    static DOT: OnceLock<Regex> = OnceLock::new();
    match separator {
        ',' => COMMA.get_or_init(|| Regex::new(r"^-?[1-9]\d{0,2}(,\d{3})+$").expect("static regex")),
        _ => DOT.get_or_init(|| Regex::new(r"^-?[1-9]\d{0,2}(\.\d{3})+$").expect("static regex")),
    }
}

/// Parse a money or quantity string such as `S/ 1,250.50`, `1.250,50` or `(300)`.
///
/// A comma is read as the decimal point only when the digits do not form
/// thousands groups; text with anything but digits, separators and currency
/// markers is not a number.
pub fn parse_number_text(raw: &str) -> Option<f64> {
    let mut s = raw.trim().to_uppercase();
    for marker in CURRENCY_MARKERS {
        s = s.replace(marker, "");
    }
    s.retain(|c| !c.is_whitespace());

    let negative = s.starts_with('(') && s.ends_with(')');
    if negative {
        s = s[1..s.len() - 1].to_string();
    }

    if s.is_empty()
        || !s.chars().any(|c| c.is_ascii_digit())
        || !s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
    {
        return None;
    }

    let has_comma = s.contains(',');
    let has_dot = s.contains('.');
    let normalized = match (has_comma, has_dot) {
        (true, true) => {
            // the separator appearing last is the decimal point
            let last_comma = s.rfind(',').unwrap_or(0);
            let last_dot = s.rfind('.').unwrap_or(0);
            if last_comma > last_dot {
                s.replace('.', "").replace(',', ".")
            } else {
                s.replace(',', "")
            }
        }
        (true, false) if grouping_regex(',').is_match(&s) => s.replace(',', ""),
        (true, false) => s.replace(',', "."),
        (false, true) if s.matches('.').count() > 1 && grouping_regex('.').is_match(&s) => s.replace('.', ""),
        _ => s,
    };

    let value: f64 = normalized.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_number_text("10"), Some(10.0));
        assert_eq!(parse_number_text(" 2.5 "), Some(2.5));
        assert_eq!(parse_number_text("-4"), Some(-4.0));
        assert_eq!(parse_number_text("(300)"), Some(-300.0));
    }

    #[test]
    fn test_currency_markers() {
        assert_eq!(parse_number_text("S/ 1,250.50"), Some(1250.5));
        assert_eq!(parse_number_text("S/. 80"), Some(80.0));
        assert_eq!(parse_number_text("US$ 12.40"), Some(12.4));
        assert_eq!(parse_number_text("$1,000,000"), Some(1_000_000.0));
    }

    #[test]
    fn test_comma_decimal_only_without_grouping() {
        assert_eq!(parse_number_text("12,5"), Some(12.5));
        assert_eq!(parse_number_text("0,500"), Some(0.5));
        assert_eq!(parse_number_text("1,234"), Some(1234.0));
        assert_eq!(parse_number_text("1.234,56"), Some(1234.56));
        assert_eq!(parse_number_text("1.234.567"), Some(1_234_567.0));
    }

    #[test]
    fn test_non_numbers() {
        assert_eq!(parse_number_text(""), None);
        assert_eq!(parse_number_text("-"), None);
        assert_eq!(parse_number_text("COTIZACION 1"), None);
        assert_eq!(parse_number_text("10 bolsas"), None);
        assert_eq!(parse_number_text("12%"), None);
    }
}
