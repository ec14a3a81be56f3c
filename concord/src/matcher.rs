//! Resolving one overlap group into pair records.
//!
//! | Group shape | Outcome |
//! |-------------|---------|
//! | refs only   | every ref missing |
//! | hyps only   | every hyp spurious |
//! | 1 × 1       | paired unless the similarity is zero |
//! | n × m       | maximum-similarity assignment; leftovers missing/spurious |

use crate::munkres;
use crate::record::{PairRecord, PairSide, Status, UNKNOWNCLASH};
use crate::similarity::{Candidate, Comparison, SimResult};

/// Pair the members of one group.
///
/// Outside token mode every accepted pair is recorded on `cmp`, so that
/// annotation-valued attributes of later strata can see it.
pub fn match_group(
    cmp: &mut Comparison<'_>,
    refs: &[Candidate],
    hyps: &[Candidate],
    token_mode: bool,
) -> Vec<PairRecord> {
    if hyps.is_empty() {
        return refs
            .iter()
            .map(|r| PairRecord::missing(r.label.clone(), r.key.id))
            .collect();
    }
    if refs.is_empty() {
        return hyps
            .iter()
            .map(|h| PairRecord::spurious(h.label.clone(), h.key.id))
            .collect();
    }

    let mut out = Vec::new();
    if refs.len() == 1 && hyps.len() == 1 {
        let (r, h) = (&refs[0], &hyps[0]);
        let sim = cmp.compute_similarity(r, h, token_mode);
        accept(cmp, r, h, &sim, token_mode, &mut out);
        return out;
    }

    let sims: Vec<Vec<SimResult>> = refs
        .iter()
        .map(|r| {
            hyps.iter()
                .map(|h| cmp.compute_similarity(r, h, token_mode))
                .collect()
        })
        .collect();
    let scores: Vec<Vec<f64>> = sims
        .iter()
        .map(|row| row.iter().map(|s| s.score).collect())
        .collect();

    let mut ref_used = vec![false; refs.len()];
    let mut hyp_used = vec![false; hyps.len()];
    for (i, j) in munkres::maximize(&scores) {
        ref_used[i] = true;
        hyp_used[j] = true;
        accept(cmp, &refs[i], &hyps[j], &sims[i][j], token_mode, &mut out);
    }
    for (r, used) in refs.iter().zip(&ref_used) {
        if !used {
            out.push(PairRecord::missing(r.label.clone(), r.key.id));
        }
    }
    for (h, used) in hyps.iter().zip(&hyp_used) {
        if !used {
            out.push(PairRecord::spurious(h.label.clone(), h.key.id));
        }
    }
    out
}

fn accept(
    cmp: &mut Comparison<'_>,
    r: &Candidate,
    h: &Candidate,
    sim: &SimResult,
    token_mode: bool,
    out: &mut Vec<PairRecord>,
) {
    if sim.score == 0.0 {
        out.push(PairRecord::missing(r.label.clone(), r.key.id));
        out.push(PairRecord::spurious(h.label.clone(), h.key.id));
        return;
    }
    let (r_status, h_status) = statuses(sim);
    if !token_mode {
        cmp.record_pair(r.key.id, h.key.id);
    }
    out.push(PairRecord::paired(
        PairSide {
            label: r.label.clone(),
            ann: r.key.id,
            status: r_status,
        },
        PairSide {
            label: h.label.clone(),
            ann: h.key.id,
            status: h_status,
        },
    ));
}

/// Per-side statuses of an accepted pair.
#[must_use]
pub fn statuses(sim: &SimResult) -> (Status, Status) {
    if sim.score == 1.0 {
        return (Status::Match, Status::Match);
    }
    match &sim.errs {
        Some((r, h)) if !r.is_empty() || !h.is_empty() => {
            let side = |errs: &std::collections::BTreeSet<String>| {
                if errs.is_empty() {
                    Status::clash(UNKNOWNCLASH)
                } else {
                    Status::Clash(errs.clone())
                }
            };
            (side(r), side(h))
        }
        _ => (Status::clash(UNKNOWNCLASH), Status::clash(UNKNOWNCLASH)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnnKey, DocPair};
    use crate::similarity::{MethodRegistry, SimilarityEngine};
    use concord_core::{AnnotationType, Document, TypeCatalog};
    use std::sync::Arc;

    fn engine() -> SimilarityEngine {
        let catalog = TypeCatalog::new()
            .with_type(AnnotationType::spanned("PERSON"))
            .with_type(AnnotationType::spanned("ORG"));
        SimilarityEngine::compile(Arc::new(catalog), None, &MethodRegistry::new()).unwrap()
    }

    fn doc(anns: &[(&str, usize, usize)]) -> (Document, Vec<Candidate>) {
        let mut d = Document::new("John Smith met Mary Jones at noon.");
        let mut out = Vec::new();
        for &(label, s, e) in anns {
            let id = d.add_spanned(label, s, e).unwrap();
            out.push((label, id));
        }
        let cands = out
            .into_iter()
            .map(|(l, id)| Candidate::new(AnnKey::reference(id), l))
            .collect();
        (d, cands)
    }

    fn as_hyp(c: Vec<Candidate>) -> Vec<Candidate> {
        c.into_iter()
            .map(|c| Candidate::new(AnnKey::hypothesis(c.key.id), c.label))
            .collect()
    }

    #[test]
    fn test_exact_match() {
        let engine = engine();
        let (r, rc) = doc(&[("PERSON", 0, 10)]);
        let (h, hc) = doc(&[("PERSON", 0, 10)]);
        let mut cmp = engine.comparison(DocPair::new(&r, &h));
        let out = match_group(&mut cmp, &rc, &as_hyp(hc), false);
        assert_eq!(out.len(), 1);
        assert!(out[0].is_match());
    }

    #[test]
    fn test_label_clash() {
        let engine = engine();
        let (r, rc) = doc(&[("PERSON", 0, 10)]);
        let (h, hc) = doc(&[("ORG", 0, 10)]);
        let mut cmp = engine.comparison(DocPair::new(&r, &h));
        let out = match_group(&mut cmp, &rc, &as_hyp(hc), false);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].type_name(), "tagclash");
    }

    #[test]
    fn test_one_sided_groups() {
        let engine = engine();
        let (r, rc) = doc(&[("PERSON", 0, 10), ("PERSON", 15, 25)]);
        let h = Document::new(r.signal());
        let mut cmp = engine.comparison(DocPair::new(&r, &h));
        let out = match_group(&mut cmp, &rc, &[], false);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|p| p.type_name() == "missing"));
    }

    #[test]
    fn test_n_by_m_leaves_extra_spurious() {
        let engine = engine();
        // One long reference overlapped by two hypotheses.
        let (r, rc) = doc(&[("PERSON", 0, 10)]);
        let (h, hc) = doc(&[("PERSON", 0, 4), ("PERSON", 5, 10)]);
        let mut cmp = engine.comparison(DocPair::new(&r, &h));
        let out = match_group(&mut cmp, &rc, &as_hyp(hc), false);
        assert_eq!(out.len(), 2);
        let paired = out.iter().filter(|p| p.reference.is_some() && p.hypothesis.is_some());
        assert_eq!(paired.count(), 1);
        assert_eq!(out.iter().filter(|p| p.type_name() == "spurious").count(), 1);
        // The longer overlap wins.
        let winner = out.iter().find(|p| p.reference.is_some()).unwrap();
        assert_eq!(winner.hypothesis.as_ref().unwrap().ann, concord_core::AnnotationId(1));
    }

    #[test]
    fn test_unknownclash_without_tokens() {
        let sim = SimResult {
            score: 0.5,
            errs: None,
        };
        let (r, h) = statuses(&sim);
        assert_eq!(r.to_string(), "unknownclash");
        assert_eq!(h.to_string(), "unknownclash");
    }
}
