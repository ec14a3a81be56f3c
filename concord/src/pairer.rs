//! Annotation pairing for one reference/hypothesis document pair.
//!
//! # Pipeline
//!
//! 1. Reduce the documents' processable regions (zones, optionally cut
//!    down to gold segments) to one region list.
//! 2. Stratify the content labels.
//! 3. Per stratum, collect candidates under their effective labels, drop
//!    those outside the regions, group by overlap and match each group.
//!    Spanned labels go first, spanless second.
//! 4. Re-pair the spanned results at token granularity.
//!
//! # Example
//!
//! ```rust
//! use concord::{Pairer, SimilarityEngine, MethodRegistry, GoldRestriction};
//! use concord_core::{AnnotationType, Document, TypeCatalog};
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(TypeCatalog::new().with_type(AnnotationType::spanned("PERSON")));
//! let engine = SimilarityEngine::compile(catalog, None, &MethodRegistry::new()).unwrap();
//! let pairer = Pairer::new(engine);
//!
//! let mut r = Document::new("John met Mary.");
//! r.add_spanned("PERSON", 0, 4).unwrap();
//! let h = r.clone();
//! let result = pairer.pair(&r, &h, GoldRestriction::default()).unwrap();
//! assert!(result.pairs[0].is_match());
//! ```

use crate::error::{Error, Result};
use crate::grouper::{label_groups, overlap_groups, OverlapGroup};
use crate::matcher::match_group;
use crate::record::{AnnKey, DocPair, PairRecord, Side, TokenPairRecord};
use crate::region::{filter_by_regions, intersect, reduce_regions};
use crate::similarity::{Candidate, Comparison, SimilarityEngine};
use crate::strata::{stratify, Stratum};
use concord_core::{Annotation, Document, Span};
use std::collections::{BTreeMap, BTreeSet};

/// Which documents are restricted to their gold segments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GoldRestriction {
    /// Restrict the reference.
    pub reference: bool,
    /// Restrict the hypothesis.
    pub hypothesis: bool,
}

/// Everything pairing produced for one document pair.
#[derive(Debug, Clone, Default)]
pub struct DocumentPairing {
    /// Phrase-level pairs, stratum by stratum.
    pub pairs: Vec<PairRecord>,
    /// Token-level pairs of the spanned strata.
    pub token_pairs: Vec<TokenPairRecord>,
    /// Regions the comparison was restricted to.
    pub regions: Vec<Span>,
    /// Whether `regions` differs from the reference's processable regions.
    pub filtered: bool,
}

/// Pairs reference and hypothesis annotations.
#[derive(Debug)]
pub struct Pairer {
    engine: SimilarityEngine,
    equivalence_classes: BTreeMap<String, String>,
    labels_to_ignore: BTreeSet<String>,
    skip_tokens: bool,
}

impl Pairer {
    /// Pairer over a compiled similarity engine.
    #[must_use]
    pub fn new(engine: SimilarityEngine) -> Self {
        Self {
            engine,
            equivalence_classes: BTreeMap::new(),
            labels_to_ignore: BTreeSet::new(),
            skip_tokens: false,
        }
    }

    /// Map labels onto shared class labels before scoring.
    #[must_use]
    pub fn with_equivalence_classes(mut self, classes: BTreeMap<String, String>) -> Self {
        self.equivalence_classes = classes;
        self.reconcile();
        self
    }

    /// Drop these labels entirely.
    #[must_use]
    pub fn with_labels_to_ignore<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels_to_ignore = labels.into_iter().map(Into::into).collect();
        self.reconcile();
        self
    }

    /// Skip token-level re-pairing.
    #[must_use]
    pub fn with_skip_tokens(mut self, skip: bool) -> Self {
        self.skip_tokens = skip;
        self
    }

    fn reconcile(&mut self) {
        let ignored = &self.labels_to_ignore;
        self.equivalence_classes.retain(|label, class| {
            if ignored.contains(label) {
                log::warn!(
                    "label '{}' is both ignored and mapped to equivalence class '{}'; ignoring it",
                    label,
                    class
                );
                false
            } else {
                true
            }
        });
    }

    /// The similarity engine.
    #[must_use]
    pub fn engine(&self) -> &SimilarityEngine {
        &self.engine
    }

    /// Scoring label of an annotation, or `None` when it is ignored.
    #[must_use]
    pub fn label_for(&self, ann: &Annotation) -> Option<String> {
        let effective = self.engine.catalog().effective_label(ann);
        let label = self
            .equivalence_classes
            .get(effective)
            .map_or(effective, String::as_str);
        if self.labels_to_ignore.contains(label) || self.labels_to_ignore.contains(effective) {
            None
        } else {
            Some(label.to_string())
        }
    }

    /// Pair a slice of documents. Exactly two are supported; the first is
    /// the reference.
    pub fn pair_all(&self, docs: &[&Document], gold: GoldRestriction) -> Result<DocumentPairing> {
        match docs {
            [reference, hypothesis] => self.pair(reference, hypothesis, gold),
            _ => Err(Error::pairing(format!(
                "pairing supports exactly two documents, got {}",
                docs.len()
            ))),
        }
    }

    /// Pair a reference document with a hypothesis document.
    pub fn pair(
        &self,
        reference: &Document,
        hypothesis: &Document,
        gold: GoldRestriction,
    ) -> Result<DocumentPairing> {
        if reference.signal() != hypothesis.signal() {
            return Err(Error::pairing("document signals don't match"));
        }
        let catalog = self.engine.catalog();
        reference.validate(catalog)?;
        hypothesis.validate(catalog)?;

        let unfiltered = reference.processable_regions();
        let maximal = match (unfiltered.first(), unfiltered.last()) {
            (Some(first), Some(last)) => Span::new(first.start, last.end),
            _ => Span::new(0, reference.char_len()),
        };
        let per_doc: Vec<Vec<Span>> = [(reference, gold.reference), (hypothesis, gold.hypothesis)]
            .into_iter()
            .map(|(doc, restrict)| {
                let own = doc.processable_regions();
                match (restrict, doc.gold_regions()) {
                    (true, Some(gold)) => intersect(&own, &gold),
                    _ => own,
                }
            })
            .collect();
        let reduced = reduce_regions(&per_doc, &unfiltered);
        let filtered = reduced.is_some();
        let regions = reduced.unwrap_or(unfiltered);

        let strata: Vec<Stratum> = match self.engine.profile_strata() {
            Some(strata) => strata.to_vec(),
            None => {
                let found: BTreeSet<&str> = reference
                    .labels()
                    .into_iter()
                    .chain(hypothesis.labels())
                    .collect();
                let found: Vec<&str> = found.into_iter().collect();
                stratify(catalog, None, &found)?
            }
        };

        let mut cmp = self.engine.comparison(DocPair::new(reference, hypothesis));
        let mut out = DocumentPairing {
            regions,
            filtered,
            ..DocumentPairing::default()
        };
        for stratum in &strata {
            let spanned = self.pair_labels(&mut cmp, &stratum.spanned, &out.regions, maximal);
            if !self.skip_tokens {
                let tokens = crate::token_pairs::repair_tokens(&mut cmp, &spanned);
                out.token_pairs.extend(tokens);
            }
            out.pairs.extend(spanned);
            let spanless = self.pair_labels(&mut cmp, &stratum.spanless, &out.regions, maximal);
            out.pairs.extend(spanless);
        }
        log::debug!(
            "paired {} records ({} at token level) over {} regions",
            out.pairs.len(),
            out.token_pairs.len(),
            out.regions.len()
        );
        Ok(out)
    }

    fn candidates(
        &self,
        cmp: &mut Comparison<'_>,
        side: Side,
        labels: &[String],
        regions: &[Span],
        maximal: Span,
    ) -> Vec<Item> {
        let doc = cmp.docs().doc(side);
        let mut items = Vec::new();
        for label in labels {
            for ann in doc.with_label(label) {
                let Some(effective) = self.label_for(ann) else {
                    continue;
                };
                let key = AnnKey { side, id: ann.id };
                items.push(Item {
                    cand: Candidate::new(key, effective),
                    span: cmp.implied_span(key),
                    true_label: ann.label.clone(),
                });
            }
        }
        filter_by_regions(regions, maximal, items, |item| item.span)
    }

    fn pair_labels(
        &self,
        cmp: &mut Comparison<'_>,
        labels: &[String],
        regions: &[Span],
        maximal: Span,
    ) -> Vec<PairRecord> {
        if labels.is_empty() {
            return Vec::new();
        }
        let refs = self.candidates(cmp, Side::Ref, labels, regions, maximal);
        let hyps = self.candidates(cmp, Side::Hyp, labels, regions, maximal);

        let with_span = |items: &[Item]| -> Vec<(usize, Span)> {
            items
                .iter()
                .enumerate()
                .filter_map(|(i, it)| it.span.map(|s| (i, s)))
                .collect()
        };
        let without_span = |items: &[Item]| -> Vec<(usize, String)> {
            items
                .iter()
                .enumerate()
                .filter(|(_, it)| it.span.is_none())
                .map(|(i, it)| (i, it.true_label.clone()))
                .collect()
        };

        let mut groups = overlap_groups(&with_span(&refs), &with_span(&hyps));
        groups.extend(label_groups(without_span(&refs), without_span(&hyps)));

        let mut pairs = Vec::new();
        for OverlapGroup { refs: ri, hyps: hi } in groups {
            let rc: Vec<Candidate> = ri.iter().map(|&i| refs[i].cand.clone()).collect();
            let hc: Vec<Candidate> = hi.iter().map(|&i| hyps[i].cand.clone()).collect();
            pairs.extend(match_group(cmp, &rc, &hc, false));
        }
        pairs
    }
}

struct Item {
    cand: Candidate,
    span: Option<Span>,
    true_label: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::MethodRegistry;
    use concord_core::{AnnotationType, AttrKind, AttributeDecl, SegmentStatus, TypeCatalog};
    use std::sync::Arc;

    fn catalog() -> Arc<TypeCatalog> {
        Arc::new(
            TypeCatalog::new()
                .with_type(AnnotationType::spanned("PERSON"))
                .with_type(AnnotationType::spanned("ORG"))
                .with_type(
                    AnnotationType::spanless("MEET").with_attribute(
                        AttributeDecl::set("who", AttrKind::Annotation).restricted_to(["PERSON"]),
                    ),
                ),
        )
    }

    fn pairer() -> Pairer {
        Pairer::new(SimilarityEngine::compile(catalog(), None, &MethodRegistry::new()).unwrap())
    }

    const TEXT: &str = "John met Mary at the IBM office.";

    #[test]
    fn test_match_and_missing() {
        let mut r = Document::new(TEXT);
        r.add_spanned("PERSON", 0, 4).unwrap();
        r.add_spanned("PERSON", 9, 13).unwrap();
        let mut h = Document::new(TEXT);
        h.add_spanned("PERSON", 0, 4).unwrap();
        let out = pairer().pair(&r, &h, GoldRestriction::default()).unwrap();
        assert_eq!(out.pairs.len(), 2);
        assert!(out.pairs[0].is_match());
        assert_eq!(out.pairs[1].type_name(), "missing");
        assert!(!out.filtered);
        // One match and one missing at token level too.
        assert_eq!(out.token_pairs.len(), 2);
    }

    #[test]
    fn test_signal_mismatch() {
        let r = Document::new("abc");
        let h = Document::new("abd");
        let err = pairer().pair(&r, &h, GoldRestriction::default()).unwrap_err();
        assert!(matches!(err, Error::Pairing(_)));
    }

    #[test]
    fn test_more_than_two_documents() {
        let d = Document::new(TEXT);
        let err = pairer()
            .pair_all(&[&d, &d, &d], GoldRestriction::default())
            .unwrap_err();
        assert!(err.to_string().contains("exactly two"));
    }

    #[test]
    fn test_zones_filter_annotations() {
        let mut r = Document::new(TEXT);
        r.add_zone(0, 8).unwrap();
        r.add_spanned("PERSON", 0, 4).unwrap();
        r.add_spanned("PERSON", 9, 13).unwrap();
        let mut h = r.clone();
        h.add_spanned("ORG", 21, 24).unwrap();
        let out = pairer().pair(&r, &h, GoldRestriction::default()).unwrap();
        assert_eq!(out.pairs.len(), 1);
        assert!(out.pairs[0].is_match());
    }

    #[test]
    fn test_gold_restriction() {
        let mut r = Document::new(TEXT);
        r.add_segment(0, 8, SegmentStatus::HumanGold).unwrap();
        r.add_segment(8, TEXT.len(), SegmentStatus::NonGold).unwrap();
        r.add_spanned("PERSON", 9, 13).unwrap();
        let h = Document::new(TEXT);
        let gold = GoldRestriction {
            reference: true,
            hypothesis: false,
        };
        let out = pairer().pair(&r, &h, gold).unwrap();
        assert!(out.filtered);
        assert_eq!(out.regions, vec![Span::new(0, 8)]);
        assert!(out.pairs.is_empty());
    }

    #[test]
    fn test_ignored_and_equivalent_labels() {
        let mut r = Document::new(TEXT);
        r.add_spanned("PERSON", 0, 4).unwrap();
        r.add_spanned("ORG", 21, 24).unwrap();
        let h = r.clone();
        let mut classes = BTreeMap::new();
        classes.insert("PERSON".to_string(), "ENTITY".to_string());
        let p = pairer()
            .with_equivalence_classes(classes)
            .with_labels_to_ignore(["ORG"]);
        let out = p.pair(&r, &h, GoldRestriction::default()).unwrap();
        assert_eq!(out.pairs.len(), 1);
        assert_eq!(out.pairs[0].reference.as_ref().unwrap().label, "ENTITY");
    }

    #[test]
    fn test_spanless_pairs_through_implied_spans() {
        let mut r = Document::new(TEXT);
        let john = r.add_spanned("PERSON", 0, 4).unwrap();
        let mary = r.add_spanned("PERSON", 9, 13).unwrap();
        let ev = r.add_spanless("MEET");
        r.set_attr(ev, "who", concord_core::Value::Many(vec![john.into(), mary.into()]))
            .unwrap();
        let h = r.clone();
        let out = pairer().pair(&r, &h, GoldRestriction::default()).unwrap();
        assert_eq!(out.pairs.len(), 3);
        assert!(out.pairs.iter().all(PairRecord::is_match));
        // Spanless annotations never reach token level.
        assert_eq!(out.token_pairs.len(), 2);
    }

    #[test]
    fn test_spanless_without_extent_grouped_by_label() {
        let mut r = Document::new(TEXT);
        r.add_spanless("MEET");
        let mut h = Document::new(TEXT);
        h.add_spanless("MEET");
        let out = pairer().pair(&r, &h, GoldRestriction::default()).unwrap();
        assert_eq!(out.pairs.len(), 1);
        assert!(out.pairs[0].reference.is_some());
        assert!(out.pairs[0].hypothesis.is_some());
    }
}
