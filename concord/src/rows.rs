//! Accumulator rows.
//!
//! Every count table is backed by a [`RowArena`]. Rows refer to each other
//! by [`RowId`]: a file aggregate lists its leaf children, a tag aggregate
//! lists the file rows it sums. What a slot means for a row is decided by
//! the slot's [`Derivation`] and the row's [`RowKind`]:
//!
//! | Derivation  | Leaf    | FileAggregate | TagAggregate |
//! |-------------|---------|---------------|--------------|
//! | `Count`     | literal | ColumnSum     | ColumnSum    |
//! | `TestToks`  | literal | FirstChild    | ColumnSum of file `<all>/<none>` rows |
//! | `Sum`, metrics | formula | formula    | formula      |
//! | `Stat`      | empty   | empty         | bootstrap value |

use crate::table::cell::{Cell, CellValue};
use crate::table::formula::{Formula, SlotRef};
use std::collections::BTreeMap;

/// Token count slot.
pub const TEST_TOKS: &str = "test_toks";
/// Matched count.
pub const MATCH: &str = "match";
/// Reference-side clash count.
pub const REFCLASH: &str = "refclash";
/// Missing count.
pub const MISSING: &str = "missing";
/// Hypothesis-side clash count.
pub const HYPCLASH: &str = "hypclash";
/// Spurious count.
pub const SPURIOUS: &str = "spurious";
/// The counts every table accumulates.
pub const BASE_SLOTS: [&str; 5] = [MATCH, REFCLASH, MISSING, HYPCLASH, SPURIOUS];

/// Precision, recall and F-measure.
pub const TAG_METRICS: [&str; 3] = ["precision", "recall", "fmeasure"];
/// Accuracy metrics of token, pseudo-token and character tables.
pub const TOKEN_METRICS: [&str; 4] = [
    "tag_sensitive_accuracy",
    "tag_sensitive_error_rate",
    "tag_blind_accuracy",
    "tag_blind_error_rate",
];

/// Index of a row in its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(pub usize);

/// Where a row sits in the aggregation hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    /// Counts for one label and subset in one file.
    Leaf,
    /// Sum over a file's leaves.
    FileAggregate,
    /// Sum over every file.
    TagAggregate,
}

/// Bootstrap statistics of one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Mean over samples.
    pub mean: f64,
    /// Population variance over samples.
    pub variance: f64,
    /// Square root of the variance.
    pub stddev: f64,
}

impl Stats {
    /// Mean and population variance of `values`, or `None` when empty.
    #[must_use]
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            variance,
            stddev: variance.sqrt(),
        })
    }
}

/// Which bootstrap statistic a column shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// `<metric>_mean`
    Mean,
    /// `<metric>_variance`
    Variance,
    /// `<metric>_stddev`
    StdDeviation,
}

impl StatKind {
    /// All three, in column order.
    pub const ALL: [StatKind; 3] = [StatKind::Mean, StatKind::Variance, StatKind::StdDeviation];

    /// Column suffix.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            StatKind::Mean => "_mean",
            StatKind::Variance => "_variance",
            StatKind::StdDeviation => "_stddev",
        }
    }
}

/// How a slot's value is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// An accumulated count.
    Count,
    /// The token count of the row's scope.
    TestToks,
    /// Sum of other slots in the same row.
    Sum(Vec<String>),
    /// Precision from hypothesis total and matches.
    Precision {
        /// Hypothesis total slot.
        hyp_total: String,
        /// Match slot.
        matched: String,
    },
    /// Recall from reference total and matches.
    Recall {
        /// Reference total slot.
        ref_total: String,
        /// Match slot.
        matched: String,
    },
    /// F-measure from precision and recall.
    Fmeasure {
        /// Precision slot.
        precision: String,
        /// Recall slot.
        recall: String,
    },
    /// Accuracy from a token count and error counts.
    Accuracy {
        /// Token count slot.
        test_toks: String,
        /// Error slots.
        errors: Vec<String>,
    },
    /// One minus an accuracy slot.
    ErrorRate {
        /// Accuracy slot.
        accuracy: String,
    },
    /// A bootstrap statistic of a metric slot.
    Stat {
        /// Which statistic.
        kind: StatKind,
        /// Metric slot.
        metric: String,
    },
}

impl Derivation {
    /// True for whole-number slots.
    #[must_use]
    pub fn is_count(&self) -> bool {
        matches!(self, Derivation::Count | Derivation::TestToks | Derivation::Sum(_))
    }
}

/// One accumulator row.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    /// Position in the hierarchy.
    pub kind: RowKind,
    /// File basename, or `<all>` for corpus rows.
    pub file: String,
    /// Label or aggregation name.
    pub tag: String,
    /// Decomposition value, `<none>` for the undecomposed row.
    pub subset: String,
    /// Token count of the file (leaves), or the fallback when a file
    /// aggregate has no children.
    pub test_toks: u64,
    /// Accumulated counts, by slot.
    pub counts: BTreeMap<String, u64>,
    /// Rows summed into this one.
    pub children: Vec<RowId>,
    /// File `<all>/<none>` rows whose token counts a tag aggregate sums.
    pub total_toks: Vec<RowId>,
    /// Bootstrap statistics by metric slot.
    pub stats: BTreeMap<String, Stats>,
}

impl ScoreRow {
    /// An empty leaf row.
    #[must_use]
    pub fn leaf(
        file: impl Into<String>,
        tag: impl Into<String>,
        subset: impl Into<String>,
        test_toks: u64,
    ) -> Self {
        Self::new(RowKind::Leaf, file, tag, subset, test_toks)
    }

    /// An empty row of any kind.
    #[must_use]
    pub fn new(
        kind: RowKind,
        file: impl Into<String>,
        tag: impl Into<String>,
        subset: impl Into<String>,
        test_toks: u64,
    ) -> Self {
        Self {
            kind,
            file: file.into(),
            tag: tag.into(),
            subset: subset.into(),
            test_toks,
            counts: BTreeMap::new(),
            children: Vec::new(),
            total_toks: Vec::new(),
            stats: BTreeMap::new(),
        }
    }

    /// Add to a count.
    pub fn incr(&mut self, slot: &str, n: u64) {
        *self.counts.entry(slot.to_string()).or_insert(0) += n;
    }

    /// A stored count; 0 when never incremented.
    #[must_use]
    pub fn count(&self, slot: &str) -> u64 {
        self.counts.get(slot).copied().unwrap_or(0)
    }
}

/// Rows plus the derivation of every slot.
#[derive(Debug, Clone, Default)]
pub struct RowArena {
    rows: Vec<ScoreRow>,
    derivations: BTreeMap<String, Derivation>,
}

impl RowArena {
    /// Arena with the standard slots. `with_accuracy` adds the token
    /// accuracy metrics.
    #[must_use]
    pub fn new(with_accuracy: bool) -> Self {
        let s = |x: &str| x.to_string();
        let mut d = BTreeMap::new();
        d.insert(s(TEST_TOKS), Derivation::TestToks);
        d.insert(s("refonly"), Derivation::Sum(vec![s(REFCLASH), s(MISSING)]));
        d.insert(s("reftotal"), Derivation::Sum(vec![s("refonly"), s(MATCH)]));
        d.insert(s("hyponly"), Derivation::Sum(vec![s(HYPCLASH), s(SPURIOUS)]));
        d.insert(s("hyptotal"), Derivation::Sum(vec![s("hyponly"), s(MATCH)]));
        d.insert(
            s("precision"),
            Derivation::Precision {
                hyp_total: s("hyptotal"),
                matched: s(MATCH),
            },
        );
        d.insert(
            s("recall"),
            Derivation::Recall {
                ref_total: s("reftotal"),
                matched: s(MATCH),
            },
        );
        d.insert(
            s("fmeasure"),
            Derivation::Fmeasure {
                precision: s("precision"),
                recall: s("recall"),
            },
        );
        if with_accuracy {
            d.insert(
                s("tag_sensitive_accuracy"),
                Derivation::Accuracy {
                    test_toks: s(TEST_TOKS),
                    errors: vec![s(MISSING), s(SPURIOUS), s(REFCLASH)],
                },
            );
            d.insert(
                s("tag_sensitive_error_rate"),
                Derivation::ErrorRate {
                    accuracy: s("tag_sensitive_accuracy"),
                },
            );
            d.insert(
                s("tag_blind_accuracy"),
                Derivation::Accuracy {
                    test_toks: s(TEST_TOKS),
                    errors: vec![s(MISSING), s(SPURIOUS)],
                },
            );
            d.insert(
                s("tag_blind_error_rate"),
                Derivation::ErrorRate {
                    accuracy: s("tag_blind_accuracy"),
                },
            );
        }
        let metrics: Vec<String> = d
            .iter()
            .filter(|(_, v)| !v.is_count())
            .map(|(k, _)| k.clone())
            .collect();
        for metric in metrics {
            for kind in StatKind::ALL {
                d.insert(
                    format!("{}{}", metric, kind.suffix()),
                    Derivation::Stat {
                        kind,
                        metric: metric.clone(),
                    },
                );
            }
        }
        Self {
            rows: Vec::new(),
            derivations: d,
        }
    }

    /// Same derivations, no rows.
    #[must_use]
    pub fn scratch(&self) -> Self {
        Self {
            rows: Vec::new(),
            derivations: self.derivations.clone(),
        }
    }

    /// Derivation of a slot. Slots never declared are counts.
    #[must_use]
    pub fn derivation(&self, slot: &str) -> &Derivation {
        self.derivations.get(slot).unwrap_or(&Derivation::Count)
    }

    /// Metric slots the bootstrap estimates, in column order.
    #[must_use]
    pub fn metrics(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = TAG_METRICS.to_vec();
        if self.derivations.contains_key(TOKEN_METRICS[0]) {
            out.extend(TOKEN_METRICS);
        }
        out
    }

    /// Add a row.
    pub fn push(&mut self, row: ScoreRow) -> RowId {
        self.rows.push(row);
        RowId(self.rows.len() - 1)
    }

    /// Row by id.
    #[must_use]
    pub fn get(&self, id: RowId) -> &ScoreRow {
        &self.rows[id.0]
    }

    /// Mutable row by id.
    pub fn get_mut(&mut self, id: RowId) -> &mut ScoreRow {
        &mut self.rows[id.0]
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The formula behind a slot, or `None` for literal and empty slots.
    #[must_use]
    pub fn formula(&self, id: RowId, slot: &str) -> Option<Formula> {
        let row = self.get(id);
        let at = |s: &str| SlotRef::new(id, s);
        match (self.derivation(slot), row.kind) {
            (Derivation::Count | Derivation::TestToks, RowKind::Leaf) => None,
            (Derivation::Count, _) => Some(Formula::ColumnSum(
                row.children.iter().map(|&c| SlotRef::new(c, slot)).collect(),
            )),
            (Derivation::TestToks, RowKind::FileAggregate) => Some(Formula::FirstChild {
                child: row.children.first().map(|&c| SlotRef::new(c, TEST_TOKS)),
                fallback: row.test_toks as f64,
            }),
            (Derivation::TestToks, RowKind::TagAggregate) => Some(Formula::ColumnSum(
                row.total_toks
                    .iter()
                    .map(|&c| SlotRef::new(c, TEST_TOKS))
                    .collect(),
            )),
            (Derivation::Sum(parts), _) => Some(Formula::Sum(parts.iter().map(|p| at(p)).collect())),
            (Derivation::Precision { hyp_total, matched }, _) => Some(Formula::Precision {
                hyp_total: at(hyp_total),
                matched: at(matched),
            }),
            (Derivation::Recall { ref_total, matched }, _) => Some(Formula::Recall {
                ref_total: at(ref_total),
                matched: at(matched),
            }),
            (Derivation::Fmeasure { precision, recall }, _) => Some(Formula::Fmeasure {
                precision: at(precision),
                recall: at(recall),
            }),
            (Derivation::Accuracy { test_toks, errors }, _) => Some(Formula::Accuracy {
                test_toks: at(test_toks),
                errors: errors.iter().map(|e| at(e)).collect(),
            }),
            (Derivation::ErrorRate { accuracy }, _) => Some(Formula::ErrorRate {
                accuracy: at(accuracy),
            }),
            (Derivation::Stat { kind, metric }, RowKind::TagAggregate) => {
                row.stats.get(metric).map(|s| match kind {
                    StatKind::Mean => Formula::Mean(s.mean),
                    StatKind::Variance => Formula::Variance(s.variance),
                    StatKind::StdDeviation => Formula::StdDeviation(s.stddev),
                })
            }
            (Derivation::Stat { .. }, _) => None,
        }
    }

    /// The cell a table shows for a slot.
    #[must_use]
    pub fn cell(&self, id: RowId, slot: &str) -> Cell {
        if let Some(f) = self.formula(id, slot) {
            return Cell::Formula(f);
        }
        let row = self.get(id);
        match self.derivation(slot) {
            Derivation::TestToks => Cell::Literal(CellValue::Int(row.test_toks as i64)),
            Derivation::Count => Cell::Literal(CellValue::Int(row.count(slot) as i64)),
            _ => Cell::Empty,
        }
    }

    /// Numeric value of a slot; empty slots are 0.
    #[must_use]
    pub fn value(&self, id: RowId, slot: &str) -> f64 {
        if let Some(f) = self.formula(id, slot) {
            return f.compute(self);
        }
        let row = self.get(id);
        match self.derivation(slot) {
            Derivation::TestToks => row.test_toks as f64,
            Derivation::Count => row.count(slot) as f64,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(arena: &mut RowArena, counts: &[(&str, u64)], toks: u64) -> RowId {
        let mut row = ScoreRow::leaf("f", "PERSON", "<none>", toks);
        for (slot, n) in counts {
            row.incr(slot, *n);
        }
        arena.push(row)
    }

    #[test]
    fn test_leaf_metrics() {
        let mut arena = RowArena::new(false);
        let id = leaf(&mut arena, &[(MATCH, 2), (MISSING, 1), (SPURIOUS, 2)], 10);
        assert_eq!(arena.value(id, "reftotal"), 3.0);
        assert_eq!(arena.value(id, "hyptotal"), 4.0);
        assert_eq!(arena.value(id, "precision"), 0.5);
        assert!((arena.value(id, "recall") - 2.0 / 3.0).abs() < 1e-12);
        assert!(matches!(arena.cell(id, MATCH), Cell::Literal(CellValue::Int(2))));
        assert_eq!(arena.cell(id, "precision_mean"), Cell::Empty);
    }

    #[test]
    fn test_aggregate_sums_children() {
        let mut arena = RowArena::new(true);
        let a = leaf(&mut arena, &[(MATCH, 2)], 10);
        let b = leaf(&mut arena, &[(MATCH, 1), (REFCLASH, 1)], 10);
        let mut fa = ScoreRow::new(RowKind::FileAggregate, "f", "<all>", "<none>", 10);
        fa.children = vec![a, b];
        let fa = arena.push(fa);
        assert_eq!(arena.value(fa, MATCH), 3.0);
        assert_eq!(arena.value(fa, TEST_TOKS), 10.0);
        // 10 tokens, one refclash.
        assert!((arena.value(fa, "tag_sensitive_accuracy") - 0.9).abs() < 1e-12);
        assert_eq!(arena.value(fa, "tag_blind_accuracy"), 1.0);

        let mut ta = ScoreRow::new(RowKind::TagAggregate, "<all>", "<all>", "<none>", 0);
        ta.children = vec![fa];
        ta.total_toks = vec![fa];
        ta.stats.insert(
            "precision".into(),
            Stats::of(&[0.5, 1.0]).unwrap(),
        );
        let ta = arena.push(ta);
        assert_eq!(arena.value(ta, TEST_TOKS), 10.0);
        assert_eq!(arena.value(ta, "precision_mean"), 0.75);
        assert_eq!(arena.value(ta, "precision_variance"), 0.0625);
        assert_eq!(arena.cell(ta, "recall_mean"), Cell::Empty);
    }

    #[test]
    fn test_metrics_follow_tables() {
        assert_eq!(RowArena::new(false).metrics().len(), 3);
        assert_eq!(RowArena::new(true).metrics().len(), 7);
    }
}
