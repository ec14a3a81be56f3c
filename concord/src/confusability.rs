//! Token confusability matrix.
//!
//! Counts, for every token (or pseudo-token), which hypothesis label and
//! which reference label claimed it. Tokens claimed by no pair land in the
//! `null`/`null` cell. If any unit is claimed twice the matrix is
//! meaningless and is abandoned.

use crate::error::Result;
use crate::record::TokenPairRecord;
use crate::table::format::layout;
use crate::token_pairs::UnitIndex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Which units the matrix counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    /// Token annotations.
    Tokens,
    /// Whitespace chunks between annotation boundaries.
    PseudoTokens,
}

/// Hypothesis label by reference label counts.
#[derive(Debug, Clone, Default)]
pub struct Confusability {
    units: Option<Units>,
    matrix: BTreeMap<Option<String>, BTreeMap<Option<String>, u64>>,
    tags: BTreeSet<String>,
}

impl Confusability {
    /// Empty matrix.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units counted so far; `None` before the first document.
    #[must_use]
    pub fn units(&self) -> Option<Units> {
        self.units
    }

    /// Add `n` units to a cell.
    pub fn add_pair(&mut self, reference: Option<&str>, hypothesis: Option<&str>, n: u64) {
        *self
            .matrix
            .entry(hypothesis.map(str::to_string))
            .or_default()
            .entry(reference.map(str::to_string))
            .or_insert(0) += n;
    }

    /// Declare the labels the matrix shows, in addition to `null`.
    pub fn declare_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    /// Count one document. Returns `false` when a unit is claimed by two
    /// pairs; the matrix must then be dropped.
    pub fn add_document(
        &mut self,
        units: Units,
        index: &dyn UnitIndex,
        token_pairs: &[TokenPairRecord],
    ) -> bool {
        self.units.get_or_insert(units);
        let mut claimed: HashSet<usize> = HashSet::new();
        let mut unclaimed = index.total() as u64;
        for tp in token_pairs {
            let Some(range) = index.range(tp.span) else {
                continue;
            };
            let n = range.len() as u64;
            for i in range {
                if !claimed.insert(i) {
                    log::warn!(
                        "A token or pseudo-token participates in more than one pair; skipping confusability table"
                    );
                    return false;
                }
            }
            let reference = tp.pair.reference.as_ref().map(|s| s.label.as_str());
            let hypothesis = tp.pair.hypothesis.as_ref().map(|s| s.label.as_str());
            self.add_pair(reference, hypothesis, n);
            unclaimed = unclaimed.saturating_sub(n);
        }
        self.add_pair(None, None, unclaimed);
        true
    }

    fn ordered_tags(&self) -> Vec<Option<&str>> {
        self.tags
            .iter()
            .map(|t| Some(t.as_str()))
            .chain(std::iter::once(None))
            .collect()
    }

    /// Header and rows: hypothesis labels down, reference labels across.
    #[must_use]
    pub fn rows(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let tags = self.ordered_tags();
        let name = |t: Option<&str>, side: &str| format!("{} ({})", t.unwrap_or("null"), side);
        let header = std::iter::once(String::new())
            .chain(tags.iter().map(|&t| name(t, "ref")))
            .collect();
        let rows = tags
            .iter()
            .map(|&hyp| {
                let counts = self.matrix.get(&hyp.map(str::to_string));
                std::iter::once(name(hyp, "hyp"))
                    .chain(tags.iter().map(|&r| {
                        counts
                            .and_then(|c| c.get(&r.map(str::to_string)))
                            .copied()
                            .unwrap_or(0)
                            .to_string()
                    }))
                    .collect()
            })
            .collect();
        (header, rows)
    }

    /// Text rendering.
    #[must_use]
    pub fn format(&self) -> String {
        let (header, rows) = self.rows();
        layout(&header, &rows)
    }

    /// Write the matrix as CSV.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let (header, rows) = self.rows();
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(&header)?;
        for row in &rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{PairRecord, PairSide, Status};
    use crate::token_pairs::TokenIndex;
    use concord_core::{AnnotationId, Span};

    fn side(label: &str, status: Status) -> PairSide {
        PairSide {
            label: label.into(),
            ann: AnnotationId(0),
            status,
        }
    }

    fn tokens() -> TokenIndex {
        // "John Smith met IBM"
        TokenIndex::new(vec![
            Span::new(0, 4),
            Span::new(5, 10),
            Span::new(11, 14),
            Span::new(15, 18),
        ])
    }

    #[test]
    fn test_counts_and_nulls() {
        let pairs = vec![
            TokenPairRecord {
                pair: PairRecord::paired(side("PER", Status::Match), side("PER", Status::Match)),
                span: Span::new(0, 10),
            },
            TokenPairRecord {
                pair: PairRecord::paired(
                    side("ORG", Status::clash("tagclash")),
                    side("LOC", Status::clash("tagclash")),
                ),
                span: Span::new(15, 18),
            },
        ];
        let mut c = Confusability::new();
        assert!(c.add_document(Units::Tokens, &tokens(), &pairs));
        c.declare_tags(["LOC", "ORG", "PER"]);
        let (header, rows) = c.rows();
        assert_eq!(header, vec!["", "LOC (ref)", "ORG (ref)", "PER (ref)", "null (ref)"]);
        assert_eq!(rows[0], vec!["LOC (hyp)", "0", "1", "0", "0"]);
        assert_eq!(rows[2], vec!["PER (hyp)", "0", "0", "2", "0"]);
        assert_eq!(rows[3], vec!["null (hyp)", "0", "0", "0", "1"]);
        assert_eq!(c.units(), Some(Units::Tokens));
    }

    #[test]
    fn test_double_claim_aborts() {
        let pair = TokenPairRecord {
            pair: PairRecord::missing("PER", AnnotationId(0)),
            span: Span::new(0, 10),
        };
        let mut c = Confusability::new();
        assert!(!c.add_document(Units::Tokens, &tokens(), &[pair.clone(), pair]));
    }
}
