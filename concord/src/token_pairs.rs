//! Token-granularity re-pairing and token counting.
//!
//! Phrase-level pairs are broken down into elementary intervals so that
//! partial overlaps can be credited token by token:
//!
//! ```text
//! ref   [----------)          missing residue | overlap | spurious residue
//! hyp        [-----------)
//!       ^    ^      ^    ^
//! ```
//!
//! The overlap is re-paired in token mode, where spans count as equal.
//! Residues from all pairs are cut at every residue boundary and each
//! interval is matched again in token mode.

use crate::matcher::match_group;
use crate::record::{AnnKey, PairRecord, PairSide, Side, TokenPairRecord};
use crate::similarity::{Candidate, Comparison};
use concord_core::Span;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

fn candidate(side: Side, ps: &PairSide) -> Candidate {
    Candidate::new(AnnKey { side, id: ps.ann }, ps.label.clone())
}

/// Break spanned phrase-level pairs into token-level pairs.
pub fn repair_tokens(cmp: &mut Comparison<'_>, pairs: &[PairRecord]) -> Vec<TokenPairRecord> {
    let docs = cmp.docs();
    let span_of = |side: Side, ps: &PairSide| docs.doc(side).get(ps.ann).and_then(|a| a.span);

    let mut residues: Vec<(Candidate, Span)> = Vec::new();
    let mut out = Vec::new();
    for pair in pairs {
        match (&pair.reference, &pair.hypothesis) {
            (Some(r), None) => {
                if let Some(span) = span_of(Side::Ref, r) {
                    residues.push((candidate(Side::Ref, r), span));
                }
            }
            (None, Some(h)) => {
                if let Some(span) = span_of(Side::Hyp, h) {
                    residues.push((candidate(Side::Hyp, h), span));
                }
            }
            (Some(r), Some(h)) => {
                let (Some(rs), Some(hs)) = (span_of(Side::Ref, r), span_of(Side::Hyp, h)) else {
                    continue;
                };
                let rc = candidate(Side::Ref, r);
                let hc = candidate(Side::Hyp, h);
                if rs.start < hs.start {
                    residues.push((rc.clone(), Span::new(rs.start, hs.start)));
                } else if rs.start > hs.start {
                    residues.push((hc.clone(), Span::new(hs.start, rs.start)));
                }
                if rs.end > hs.end {
                    residues.push((rc.clone(), Span::new(hs.end, rs.end)));
                } else if rs.end < hs.end {
                    residues.push((hc.clone(), Span::new(rs.end, hs.end)));
                }
                if let Some(overlap) = rs.intersection(&hs) {
                    for rec in match_group(cmp, &[rc], &[hc], true) {
                        out.push(TokenPairRecord {
                            pair: rec,
                            span: overlap,
                        });
                    }
                }
            }
            (None, None) => {}
        }
    }

    let boundaries: BTreeSet<usize> = residues
        .iter()
        .flat_map(|(_, s)| [s.start, s.end])
        .collect();
    let mut intervals: BTreeMap<Span, (Vec<Candidate>, Vec<Candidate>)> = BTreeMap::new();
    for (cand, span) in residues {
        let cuts: Vec<usize> = boundaries.range(span.start..=span.end).copied().collect();
        for w in cuts.windows(2) {
            let slot = intervals.entry(Span::new(w[0], w[1])).or_default();
            match cand.key.side {
                Side::Ref => slot.0.push(cand.clone()),
                Side::Hyp => slot.1.push(cand.clone()),
            }
        }
    }
    for (span, (refs, hyps)) in intervals {
        for rec in match_group(cmp, &refs, &hyps, true) {
            out.push(TokenPairRecord { pair: rec, span });
        }
    }
    out
}

// ============================================================================
// Token counting
// ============================================================================

/// Maps spans to ranges of indexed units (tokens or pseudo-tokens).
pub trait UnitIndex {
    /// Units wholly covered by `span`, or `None` if a boundary is not a
    /// unit boundary.
    fn range(&self, span: Span) -> Option<Range<usize>>;

    /// Units in the document.
    fn total(&self) -> usize;

    /// Number of units covered by `span`.
    fn count(&self, span: Span) -> Option<usize> {
        self.range(span).map(|r| r.len())
    }
}

/// Token boundaries taken from the document's token annotations.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    starts: HashMap<usize, usize>,
    ends: HashMap<usize, usize>,
    total: usize,
}

impl TokenIndex {
    /// Index sorted token spans: a token's start maps to `i`, its end to
    /// `i + 1`.
    #[must_use]
    pub fn new(mut tokens: Vec<Span>) -> Self {
        tokens.sort();
        let mut index = Self {
            total: tokens.len(),
            ..Self::default()
        };
        for (i, t) in tokens.iter().enumerate() {
            index.starts.insert(t.start, i);
            index.ends.insert(t.end, i + 1);
        }
        index
    }
}

impl UnitIndex for TokenIndex {
    // A token end is also a valid start (the next token) and a token start
    // a valid end (the previous one); residues are cut at such offsets.
    fn range(&self, span: Span) -> Option<Range<usize>> {
        let start = *self.starts.get(&span.start).or_else(|| self.ends.get(&span.start))?;
        let end = *self.ends.get(&span.end).or_else(|| self.starts.get(&span.end))?;
        Some(start..end.max(start))
    }

    fn total(&self) -> usize {
        self.total
    }
}

/// Whitespace-delimited chunks counted between annotation boundaries.
///
/// The signal is cut at every boundary; each piece contributes its own
/// whitespace-split chunk count, so a word straddling a boundary counts
/// once on each side.
#[derive(Debug, Clone, Default)]
pub struct PseudoTokens {
    cumulative: BTreeMap<usize, usize>,
}

impl PseudoTokens {
    /// Count pseudo-tokens of `signal` cut at `boundaries` (character
    /// offsets). The signal end is always a boundary.
    #[must_use]
    pub fn new(signal: &str, boundaries: impl IntoIterator<Item = usize>) -> Self {
        let chars: Vec<char> = signal.chars().collect();
        let mut points: BTreeSet<usize> = boundaries
            .into_iter()
            .filter(|&b| b <= chars.len())
            .collect();
        points.insert(0);
        points.insert(chars.len());

        let mut cumulative = BTreeMap::new();
        let mut prev = 0usize;
        let mut running = 0usize;
        for p in points {
            let piece: String = chars[prev..p].iter().collect();
            running += piece.split_whitespace().count();
            cumulative.insert(p, running);
            prev = p;
        }
        Self { cumulative }
    }
}

impl UnitIndex for PseudoTokens {
    fn range(&self, span: Span) -> Option<Range<usize>> {
        let start = *self.cumulative.get(&span.start)?;
        let end = *self.cumulative.get(&span.end)?;
        Some(start..end.max(start))
    }

    fn total(&self) -> usize {
        self.cumulative.values().next_back().copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DocPair;
    use crate::similarity::{MethodRegistry, SimilarityEngine};
    use concord_core::{AnnotationType, Document, TypeCatalog};
    use std::sync::Arc;

    fn engine() -> SimilarityEngine {
        let catalog = TypeCatalog::new().with_type(AnnotationType::spanned("PERSON"));
        SimilarityEngine::compile(Arc::new(catalog), None, &MethodRegistry::new()).unwrap()
    }

    #[test]
    fn test_partial_overlap_splits_three_ways() {
        let engine = engine();
        let mut r = Document::new("aa bb cc dd");
        let ra = r.add_spanned("PERSON", 0, 5).unwrap();
        let mut h = Document::new("aa bb cc dd");
        let ha = h.add_spanned("PERSON", 3, 8).unwrap();
        let mut cmp = engine.comparison(DocPair::new(&r, &h));
        let sim = cmp.compute_similarity(
            &Candidate::new(AnnKey::reference(ra), "PERSON"),
            &Candidate::new(AnnKey::hypothesis(ha), "PERSON"),
            false,
        );
        let (rs, hs) = crate::matcher::statuses(&sim);
        let pair = PairRecord::paired(
            PairSide { label: "PERSON".into(), ann: ra, status: rs },
            PairSide { label: "PERSON".into(), ann: ha, status: hs },
        );
        let toks = repair_tokens(&mut cmp, &[pair]);
        assert_eq!(toks.len(), 3);
        assert!(toks[0].pair.is_match());
        assert_eq!(toks[0].span, Span::new(3, 5));
        assert_eq!(toks[1].span, Span::new(0, 3));
        assert_eq!(toks[1].pair.type_name(), "missing");
        assert_eq!(toks[2].span, Span::new(5, 8));
        assert_eq!(toks[2].pair.type_name(), "spurious");
    }

    #[test]
    fn test_residues_cut_at_boundaries() {
        let engine = engine();
        let mut r = Document::new("aa bb cc dd");
        let ra = r.add_spanned("PERSON", 0, 8).unwrap();
        let mut h = Document::new("aa bb cc dd");
        let hb = h.add_spanned("PERSON", 3, 11).unwrap();
        let mut cmp = engine.comparison(DocPair::new(&r, &h));
        let pairs = vec![PairRecord::missing("PERSON", ra), PairRecord::spurious("PERSON", hb)];
        let toks = repair_tokens(&mut cmp, &pairs);
        let spans: Vec<Span> = toks.iter().map(|t| t.span).collect();
        assert_eq!(spans, vec![Span::new(0, 3), Span::new(3, 8), Span::new(8, 11)]);
        assert_eq!(toks[0].pair.type_name(), "missing");
        assert!(toks[1].pair.is_match());
        assert_eq!(toks[2].pair.type_name(), "spurious");
    }

    #[test]
    fn test_token_index() {
        let idx = TokenIndex::new(vec![Span::new(3, 5), Span::new(0, 2), Span::new(6, 9)]);
        assert_eq!(idx.count(Span::new(0, 5)), Some(2));
        assert_eq!(idx.range(Span::new(3, 9)), Some(1..3));
        assert_eq!(idx.count(Span::new(1, 5)), None);
        assert_eq!(idx.range(Span::new(2, 9)), Some(1..3));
        assert_eq!(idx.count(Span::new(0, 3)), Some(1));
        assert_eq!(idx.total(), 3);
    }

    #[test]
    fn test_pseudo_tokens_split_words_at_boundaries() {
        let pt = PseudoTokens::new("John Smith met Mary", [0, 7, 10]);
        assert_eq!(pt.count(Span::new(0, 7)), Some(2));
        assert_eq!(pt.count(Span::new(7, 10)), Some(1));
        assert_eq!(pt.total(), 5);
        assert_eq!(pt.count(Span::new(2, 7)), None);
    }
}
