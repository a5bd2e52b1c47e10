//! Property tests for matching, normalization and the totals invariant.

use std::sync::Arc;

use proptest::prelude::*;
use uuid::Uuid;

use cotiza_database::{InMemoryStore, QuotationStore};
use cotiza_models::{BaselineItem, QuotationItem, QuotationProcess};
use cotiza_quotation_engine::{
    compute_totals, match_baseline, normalize_offer, BaselineIndex, ProcessContext, QuotationEngine,
    SupplierContext,
};
use cotiza_utils::spreadsheet::SupplierQuoteRow;
use cotiza_utils::{AppConfig, MatchingConfig};

fn word() -> impl Strategy<Value = String> {
    "[A-Z]{3,8}"
}

mod matching {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_scores_stay_in_unit_range(
            baseline in prop::collection::vec(prop::collection::vec(word(), 1..5), 1..6),
            description in prop::collection::vec(word(), 0..6),
            code in proptest::option::of("[0-9]{1,2}"),
        ) {
            let process_id = Uuid::new_v4();
            let items: Vec<BaselineItem> = baseline
                .iter()
                .enumerate()
                .map(|(i, words)| BaselineItem {
                    item_code: Some(i.to_string()),
                    ..BaselineItem::new(process_id, "Obra", words.join(" "))
                })
                .collect();
            let index = BaselineIndex::build(&items);
            let row = SupplierQuoteRow {
                sheet_name: "Obra".to_string(),
                item_code: code,
                description: description.join(" "),
                unit_price: Some(1.0),
                ..Default::default()
            };

            let result = match_baseline(&index, &row, &MatchingConfig::default());
            prop_assert!((0.0..=1.0).contains(&result.score));
            if result.is_match() {
                prop_assert!(result.score >= 0.35);
            }
        }

        #[test]
        fn prop_identical_description_matches_itself(words in prop::collection::hash_set(word(), 2..6)) {
            let description = words.into_iter().collect::<Vec<_>>().join(" ");
            let item = BaselineItem::new(Uuid::new_v4(), "Obra", description.clone());
            let index = BaselineIndex::build(std::slice::from_ref(&item));
            let row = SupplierQuoteRow {
                sheet_name: "Obra".to_string(),
                description,
                unit_price: Some(1.0),
                ..Default::default()
            };

            let result = match_baseline(&index, &row, &MatchingConfig::default());
            prop_assert_eq!(result.baseline_id, Some(item.id));
            prop_assert_eq!(result.score, 1.0);
        }
    }
}

mod sheets {
    use super::*;

    const SHEETS: [&str; 3] = ["Sanitarias", "Eléctricas", "Estructuras"];

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_match_stays_on_row_sheet_when_it_has_entries(
            baseline in prop::collection::vec(
                (0..SHEETS.len(), prop::collection::vec(word(), 2..5), proptest::option::of("[0-9]{1}")),
                1..8,
            ),
            row_sheet in 0..SHEETS.len(),
            source in any::<prop::sample::Index>(),
            extra in prop::collection::vec(word(), 0..2),
            code in proptest::option::of("[0-9]{1}"),
        ) {
            let process_id = Uuid::new_v4();
            let items: Vec<BaselineItem> = baseline
                .iter()
                .map(|(sheet, words, item_code)| BaselineItem {
                    item_code: item_code.clone(),
                    ..BaselineItem::new(process_id, SHEETS[*sheet], words.join(" "))
                })
                .collect();
            let index = BaselineIndex::build(&items);

            // copy some entry's wording, whatever sheet it sits on
            let (_, words, _) = &baseline[source.index(baseline.len())];
            let mut description = words.clone();
            description.extend(extra);
            let row = SupplierQuoteRow {
                sheet_name: SHEETS[row_sheet].to_uppercase(),
                item_code: code,
                description: description.join(" "),
                unit_price: Some(1.0),
                ..Default::default()
            };

            let result = match_baseline(&index, &row, &MatchingConfig::default());
            let sheet_has_entries = items.iter().any(|item| item.sheet_name == SHEETS[row_sheet]);
            if let (Some(id), true) = (result.baseline_id, sheet_has_entries) {
                let matched = items.iter().find(|item| item.id == id);
                prop_assert_eq!(matched.map(|item| item.sheet_name.as_str()), Some(SHEETS[row_sheet]));
            }
        }
    }
}

mod normalization {
    use super::*;

    proptest! {
        #[test]
        fn prop_pen_offer_in_same_unit_is_unchanged(price in 0.01f64..100_000.0) {
            let normalized = normalize_offer(Some(price), Some("UND"), Some("und"), "PEN", "PEN", None);
            prop_assert_eq!(normalized.normalized_price, Some(price));
            prop_assert!(normalized.unit_converted);
        }

        #[test]
        fn prop_usd_totals_scale_by_rate(
            totals in prop::collection::vec(0.0f64..10_000.0, 0..20),
            rate in 0.5f64..10.0,
        ) {
            let items: Vec<QuotationItem> = totals
                .iter()
                .map(|t| QuotationItem { total_price: Some(*t), ..Default::default() })
                .collect();
            let result = compute_totals(&items, "USD", "PEN", Some(rate));
            prop_assert_eq!(result.unconverted_items, 0);
            prop_assert!((result.total_amount_base - result.total_amount * rate).abs() < 1e-6 * (1.0 + result.total_amount_base));
        }
    }
}

mod totals_invariant {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_quotation_total_equals_item_sum(
            lines in prop::collection::vec((1u32..500, 1u32..100_000), 1..12),
        ) {
            tokio_test::block_on(async {
                let engine = QuotationEngine::new(Arc::new(InMemoryStore::new()), &AppConfig::default());
                let process = engine
                    .create_process(QuotationProcess::new("Obra", "PEN"))
                    .await
                    .unwrap();

                let mut csv = String::from("ITEM;DESCRIPCION;UND;CANT;PRECIO UNITARIO\n");
                for (i, (quantity, cents)) in lines.iter().enumerate() {
                    csv.push_str(&format!("{};Material numero {};UND;{};{}.{:02}\n", i + 1, i + 1, quantity, cents / 100, cents % 100));
                }

                let outcome = engine
                    .import_supplier_quote(
                        "cotizacion.csv",
                        csv.as_bytes(),
                        &ProcessContext { process_id: process.id, exchange_rate: None },
                        &SupplierContext { supplier_name: "Proveedor".to_string(), ..Default::default() },
                    )
                    .await
                    .unwrap();

                let items = engine.store().list_quotation_items(outcome.quotation.id).await.unwrap();
                let stored = engine.store().get_quotation(outcome.quotation.id).await.unwrap().unwrap();
                let sum: f64 = items.iter().filter_map(QuotationItem::line_total).sum();

                assert_eq!(items.len(), lines.len());
                assert!((stored.total_amount - sum).abs() < 1e-6);
                assert!((stored.total_amount_pen - sum).abs() < 1e-6);
            });
        }
    }
}
