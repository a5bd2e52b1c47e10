//! Supplier row to baseline item matching.
//!
//! Item codes are reused and renumbered across supplier templates, so a code
//! hit only counts when the descriptions also overlap strongly. Pure text
//! matches need both a score floor and a minimum number of shared tokens.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cotiza_utils::spreadsheet::SupplierQuoteRow;
use cotiza_utils::{jaccard, normalize_code, token_set, MatchingConfig, TokenSet};

use crate::index::{sheet_key, BaselineIndex, IndexEntry};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub baseline_id: Option<Uuid>,
    /// Jaccard score of the best candidate, 1.0 for a validated code hit.
    pub score: f64,
}

impl MatchResult {
    pub fn unmatched(score: f64) -> Self {
        Self {
            baseline_id: None,
            score,
        }
    }

    pub fn is_match(&self) -> bool {
        self.baseline_id.is_some()
    }
}

fn strong_overlap(a: &TokenSet, b: &TokenSet, config: &MatchingConfig) -> bool {
    let (score, intersection) = jaccard(a, b);
    intersection >= config.strong_overlap_min_intersection || score >= config.strong_overlap_min_jaccard
}

/// Resolve a supplier row to a baseline item, or to none.
pub fn match_baseline(index: &BaselineIndex, row: &SupplierQuoteRow, config: &MatchingConfig) -> MatchResult {
    let candidates = index.candidates(&row.sheet_name);
    let text = match &row.offered_description {
        Some(offered) => format!("{} {}", row.description, offered),
        None => row.description.clone(),
    };
    let tokens = token_set(&text);

    if let Some(code) = row.item_code.as_deref().and_then(normalize_code) {
        if let Some(hit) = code_match(index, &candidates, &code, &row.sheet_name, &tokens, config) {
            return MatchResult {
                baseline_id: Some(hit.baseline_id),
                score: 1.0,
            };
        }
    }

    let mut best: Option<(&IndexEntry, f64, usize)> = None;
    for &entry in &candidates {
        let (score, intersection) = jaccard(&tokens, &entry.tokens);
        let better = match best {
            None => true,
            Some((_, best_score, best_intersection)) => {
                score > best_score || (score == best_score && intersection > best_intersection)
            }
        };
        if better {
            best = Some((entry, score, intersection));
        }
    }

    match best {
        Some((entry, score, intersection))
            if (intersection >= config.min_intersection || score >= config.high_confidence_score)
                && score >= config.min_score =>
        {
            MatchResult {
                baseline_id: Some(entry.baseline_id),
                score,
            }
        }
        Some((_, score, _)) => MatchResult::unmatched(score),
        None => MatchResult::unmatched(0.0),
    }
}

fn code_match<'a>(
    index: &'a BaselineIndex,
    candidates: &[&'a IndexEntry],
    code: &str,
    sheet_name: &str,
    tokens: &TokenSet,
    config: &MatchingConfig,
) -> Option<&'a IndexEntry> {
    let hit = index.by_code(code)?;
    let sheet_matches = sheet_name.trim().is_empty() || hit.sheet_key == sheet_key(sheet_name);
    if sheet_matches && strong_overlap(tokens, &hit.tokens, config) {
        return Some(hit);
    }

    candidates
        .iter()
        .copied()
        .find(|entry| entry.code.as_deref() == Some(code) && strong_overlap(tokens, &entry.tokens, config))
}
