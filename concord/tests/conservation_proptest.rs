//! Every annotation is counted exactly once per side.
//!
//! For random reference and hypothesis span sets, the tag table must
//! satisfy per label:
//!
//! - `match + missing + refclash = reftotal` = reference annotations;
//! - `match + spurious + hypclash = hyptotal` = hypothesis annotations.

use concord::{CancelToken, Flavor, Scorer, ScorerConfig, SummaryKind};
use concord_core::{AnnotationType, Document, TypeCatalog};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;

const TEXT: &str = "aa bb cc dd ee ff gg hh";
const LABELS: [&str; 2] = ["PERSON", "ORG"];

fn catalog() -> Arc<TypeCatalog> {
    Arc::new(
        TypeCatalog::new()
            .with_type(AnnotationType::spanned("PERSON"))
            .with_type(AnnotationType::spanned("ORG")),
    )
}

/// `(label index, start, end)` triples inside `TEXT`.
fn spans() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    let len = TEXT.len();
    prop::collection::vec(
        (0..LABELS.len(), 0..len - 1, 1usize..6)
            .prop_map(move |(l, s, n)| (l, s, (s + n).min(len))),
        0..6,
    )
}

fn document(anns: &[(usize, usize, usize)]) -> Document {
    let mut doc = Document::new(TEXT);
    for &(l, s, e) in anns {
        doc.add_spanned(LABELS[l], s, e).unwrap();
    }
    doc
}

fn per_label(anns: &[(usize, usize, usize)]) -> BTreeMap<&'static str, f64> {
    let mut counts = BTreeMap::new();
    for &(l, _, _) in anns {
        *counts.entry(LABELS[l]).or_insert(0.0) += 1.0;
    }
    counts
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tag_counts_are_conserved(refs in spans(), hyps in spans()) {
        let (r, h) = (document(&refs), document(&hyps));
        let mut scorer = Scorer::new(catalog(), ScorerConfig::default()).unwrap();
        scorer.add_document_pairs(&[("doc", &r, &h)]).unwrap();
        scorer.finish(&CancelToken::new()).unwrap();

        let summary = scorer.summary(SummaryKind::Tag).unwrap().global_summary().unwrap();
        let (header, rows) = summary.render_rows(Flavor::Literal);
        let col = |name: &str| header.iter().position(|h| h == name).unwrap();
        let (ref_counts, hyp_counts) = (per_label(&refs), per_label(&hyps));

        for label in LABELS {
            let Some(row) = rows.iter().find(|row| row[col("tag")] == label) else {
                prop_assert!(!ref_counts.contains_key(label) && !hyp_counts.contains_key(label));
                continue;
            };
            let v = |name: &str| -> f64 { row[col(name)].parse().unwrap() };
            let ref_total = ref_counts.get(label).copied().unwrap_or(0.0);
            let hyp_total = hyp_counts.get(label).copied().unwrap_or(0.0);
            prop_assert_eq!(v("match") + v("missing") + v("refclash"), v("reftotal"));
            prop_assert_eq!(v("match") + v("spurious") + v("hypclash"), v("hyptotal"));
            prop_assert_eq!(v("reftotal"), ref_total);
            prop_assert_eq!(v("hyptotal"), hyp_total);
        }
    }
}
