//! Text normalization for description matching.
//!
//! Budget and quote descriptions are free text typed by hand: mixed case,
//! accents, punctuation, inch marks. Everything is folded to `[A-Z0-9 ]`
//! before comparison.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Set of description tokens.
pub type TokenSet = HashSet<String>;

/// Uppercase, strip accents, replace anything outside `[A-Z0-9 ]` with a
/// space, collapse whitespace. Idempotent.
pub fn normalize_text(s: &str) -> String {
    let folded: String = s
        .to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_ascii_uppercase() || c.is_ascii_digit() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized words longer than two characters.
pub fn tokenize(s: &str) -> Vec<String> {
    normalize_text(s)
        .split(' ')
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

pub fn token_set(s: &str) -> TokenSet {
    tokenize(s).into_iter().collect()
}

fn trailing_zero_group() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\.0+)+$").expect("static regex"))
}

/// Canonical item code: uppercase, only `[A-Z0-9.]`, without a trailing
/// `.0` group left behind by numeric spreadsheet cells.
pub fn normalize_code(code: &str) -> Option<String> {
    let cleaned: String = code
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '.')
        .collect();
    let cleaned = trailing_zero_group().replace(&cleaned, "").into_owned();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Jaccard similarity and raw intersection size of two token sets.
///
/// An empty side scores `(0.0, 0)`, including two empty sets: a description
/// with no usable tokens is no evidence of a match.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> (f64, usize) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 0);
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    (intersection as f64 / union as f64, intersection)
}

/// True when the text carries at least one letter.
pub fn has_letters(s: &str) -> bool {
    s.chars().any(char::is_alphabetic)
}

/// Whitespace-collapsed, trimmed copy of a label, original casing kept.
pub fn clean_label(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_text_folds_accents_and_punctuation() {
        assert_eq!(normalize_text("Tubería  PVC 2\" (pulg.)"), "TUBERIA PVC 2 PULG");
        assert_eq!(normalize_text("  Señalización  "), "SENALIZACION");
        assert_eq!(normalize_text("Ø 1/2\""), "1 2");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        assert_eq!(tokenize("PVC 2 in tubo"), vec!["PVC".to_string(), "TUBO".to_string()]);
        assert!(tokenize("a de 12").is_empty());
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("0012.0"), Some("0012".to_string()));
        assert_eq!(normalize_code("01.02.00"), Some("01.02".to_string()));
        assert_eq!(normalize_code(" a-12 "), Some("A12".to_string()));
        assert_eq!(normalize_code("1.10"), Some("1.10".to_string()));
        assert_eq!(normalize_code("3.0.0"), Some("3".to_string()));
        assert_eq!(normalize_code(""), None);
        assert_eq!(normalize_code("--"), None);
    }

    #[test]
    fn test_jaccard_identical_sets() {
        let a = token_set("cemento portland tipo");
        let (score, overlap) = jaccard(&a, &a);
        assert_eq!(score, 1.0);
        assert_eq!(overlap, a.len());
    }

    #[test]
    fn test_jaccard_empty_sets() {
        let a = token_set("cemento");
        assert_eq!(jaccard(&a, &TokenSet::new()), (0.0, 0));
    }

    #[test]
    fn test_jaccard_two_empty_sets_score_zero() {
        // "de la" tokenizes to nothing
        let blank = token_set("de la");
        assert!(blank.is_empty());
        assert_eq!(jaccard(&blank, &blank), (0.0, 0));
        assert_eq!(jaccard(&TokenSet::new(), &TokenSet::new()), (0.0, 0));
    }

    proptest! {
        #[test]
        fn prop_normalize_text_is_idempotent(s in "\\PC{0,40}") {
            let once = normalize_text(&s);
            prop_assert_eq!(normalize_text(&once), once.clone());
        }

        #[test]
        fn prop_normalize_text_alphabet(s in "\\PC{0,40}") {
            let out = normalize_text(&s);
            prop_assert!(out.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' '));
            prop_assert!(!out.starts_with(' ') && !out.ends_with(' ') && !out.contains("  "));
        }

        #[test]
        fn prop_jaccard_is_symmetric(a in "[a-z ]{0,30}", b in "[a-z ]{0,30}") {
            let (sa, sb) = (token_set(&a), token_set(&b));
            prop_assert_eq!(jaccard(&sa, &sb), jaccard(&sb, &sa));
            let (score, _) = jaccard(&sa, &sb);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn prop_normalize_code_is_idempotent(s in "[0-9A-Za-z.]{0,12}") {
            if let Some(code) = normalize_code(&s) {
                prop_assert_eq!(normalize_code(&code), Some(code.clone()));
            }
        }
    }
}
