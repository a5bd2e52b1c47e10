//! Baseline lookup structures, built once per process and shared by every
//! supplier row matched against it.

use std::collections::HashMap;
use uuid::Uuid;

use cotiza_models::BaselineItem;
use cotiza_utils::{normalize_code, normalize_text, token_set, TokenSet};

/// Sheet names compare case-insensitively.
pub fn sheet_key(sheet_name: &str) -> String {
    sheet_name.trim().to_uppercase()
}

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub baseline_id: Uuid,
    pub sheet_key: String,
    pub code: Option<String>,
    pub tokens: TokenSet,
    pub normalized_description: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BaselineIndex {
    entries: Vec<IndexEntry>,
    by_id: HashMap<Uuid, usize>,
    by_code: HashMap<String, usize>,
    by_sheet: HashMap<String, Vec<usize>>,
}

impl BaselineIndex {
    pub fn build(items: &[BaselineItem]) -> Self {
        let mut index = Self::default();

        for item in items {
            let position = index.entries.len();
            let entry = IndexEntry {
                baseline_id: item.id,
                sheet_key: sheet_key(&item.sheet_name),
                code: item.item_code.as_deref().and_then(normalize_code),
                tokens: token_set(&item.description),
                normalized_description: normalize_text(&item.description),
                unit: item.unit.clone(),
            };

            if let Some(code) = &entry.code {
                // last write wins
                index.by_code.insert(code.clone(), position);
            }
            index
                .by_sheet
                .entry(entry.sheet_key.clone())
                .or_default()
                .push(position);
            index.by_id.insert(entry.baseline_id, position);
            index.entries.push(entry);
        }

        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, baseline_id: Uuid) -> Option<&IndexEntry> {
        self.by_id.get(&baseline_id).map(|&i| &self.entries[i])
    }

    pub fn by_code(&self, code: &str) -> Option<&IndexEntry> {
        self.by_code.get(code).map(|&i| &self.entries[i])
    }

    pub fn sheet_entries(&self, sheet_name: &str) -> Vec<&IndexEntry> {
        self.by_sheet
            .get(&sheet_key(sheet_name))
            .map(|positions| positions.iter().map(|&i| &self.entries[i]).collect())
            .unwrap_or_default()
    }

    /// Entries of the row's sheet; every entry only when that sheet has none.
    pub fn candidates(&self, sheet_name: &str) -> Vec<&IndexEntry> {
        let in_sheet = self.sheet_entries(sheet_name);
        if in_sheet.is_empty() {
            self.entries.iter().collect()
        } else {
            in_sheet
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sheet: &str, code: Option<&str>, description: &str) -> BaselineItem {
        BaselineItem {
            item_code: code.map(str::to_string),
            ..BaselineItem::new(Uuid::new_v4(), sheet, description)
        }
    }

    #[test]
    fn test_code_collision_keeps_last() {
        let first = item("Obra", Some("1.01"), "Cemento");
        let second = item("Obra", Some("1.01.0"), "Arena");
        let index = BaselineIndex::build(&[first, second.clone()]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.by_code("1.01").map(|e| e.baseline_id), Some(second.id));
    }

    #[test]
    fn test_sheet_buckets_are_case_insensitive() {
        let index = BaselineIndex::build(&[item("Obra", None, "Cemento portland"), item("Eléctricas", None, "Cable")]);

        assert_eq!(index.sheet_entries("OBRA").len(), 1);
        assert_eq!(index.candidates(" obra ").len(), 1);
        assert_eq!(index.candidates("Sanitarias").len(), 2);
        let entry = &index.sheet_entries("obra")[0];
        assert!(entry.tokens.contains("PORTLAND"));
        assert_eq!(entry.normalized_description, "CEMENTO PORTLAND");
    }
}
