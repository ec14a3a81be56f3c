//! Symbolic spreadsheet formulas.
//!
//! A [`Formula`] refers to other cells by `(row, slot)` and can be either
//! rendered as spreadsheet text or evaluated numerically. The two must
//! agree: whatever a spreadsheet computes from the rendered text is what
//! [`Formula::compute`] returns.
//!
//! | Formula      | Rendered (`excel`) |
//! |--------------|--------------------|
//! | `Sum`        | `=SUM(B2:D2)` |
//! | `Precision`  | `=IF(h = 0,1.00,IF(m = 0,0.0,m / h))` |
//! | `Recall`     | `=IF(r = 0,1.0,IF(m = 0,0.0,m / r))` |
//! | `Fmeasure`   | `=IF((p + r) = 0,0.0,2.0 * ((p * r) / (p + r)))` |
//! | `Accuracy`   | `=IF(t = 0,1.0,(t - e1 - e2)/t)` |
//! | `ErrorRate`  | `=(1 - a)` |

use crate::rows::{RowArena, RowId};
use std::collections::HashMap;

/// Reference to one slot of one accumulator row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Row in the arena.
    pub row: RowId,
    /// Slot name, e.g. `match` or `precision`.
    pub slot: String,
}

impl SlotRef {
    /// Create a reference.
    #[must_use]
    pub fn new(row: RowId, slot: impl Into<String>) -> Self {
        Self {
            row,
            slot: slot.into(),
        }
    }
}

/// A derived cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    /// Sum of cells in the same row.
    Sum(Vec<SlotRef>),
    /// Sum of the same slot over child rows.
    ColumnSum(Vec<SlotRef>),
    /// The first child's cell, or a stored count when there is no child.
    FirstChild {
        /// First child's cell.
        child: Option<SlotRef>,
        /// Value used without a child.
        fallback: f64,
    },
    /// `match / hyptotal` with edge cases.
    Precision {
        /// Hypothesis total.
        hyp_total: SlotRef,
        /// Matches.
        matched: SlotRef,
    },
    /// `match / reftotal` with edge cases.
    Recall {
        /// Reference total.
        ref_total: SlotRef,
        /// Matches.
        matched: SlotRef,
    },
    /// Harmonic mean of precision and recall.
    Fmeasure {
        /// Precision cell.
        precision: SlotRef,
        /// Recall cell.
        recall: SlotRef,
    },
    /// `(t - errors...) / t`, 1 when `t` is 0.
    Accuracy {
        /// Token count.
        test_toks: SlotRef,
        /// Error counts subtracted.
        errors: Vec<SlotRef>,
    },
    /// `1 - accuracy`.
    ErrorRate {
        /// Accuracy cell.
        accuracy: SlotRef,
    },
    /// Bootstrap mean.
    Mean(f64),
    /// Bootstrap population variance.
    Variance(f64),
    /// Bootstrap standard deviation.
    StdDeviation(f64),
}

// ============================================================================
// Metrics
// ============================================================================

/// Precision; 1 when nothing was hypothesized.
#[must_use]
pub fn precision(hyp_total: f64, matched: f64) -> f64 {
    if hyp_total == 0.0 {
        1.0
    } else if matched == 0.0 {
        0.0
    } else {
        matched / hyp_total
    }
}

/// Recall; 1 when the reference is empty.
#[must_use]
pub fn recall(ref_total: f64, matched: f64) -> f64 {
    if ref_total == 0.0 {
        1.0
    } else if matched == 0.0 {
        0.0
    } else {
        matched / ref_total
    }
}

/// F-measure; 0 when precision and recall are both 0.
#[must_use]
pub fn fmeasure(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * ((precision * recall) / (precision + recall))
    }
}

/// Accuracy over `test_toks`; 1 when there are no tokens.
#[must_use]
pub fn accuracy(test_toks: f64, errors: &[f64]) -> f64 {
    if test_toks == 0.0 {
        1.0
    } else {
        (test_toks - errors.iter().sum::<f64>()) / test_toks
    }
}

/// `1 - accuracy`.
#[must_use]
pub fn error_rate(accuracy: f64) -> f64 {
    1.0 - accuracy
}

// ============================================================================
// Rendering
// ============================================================================

/// Maximum number of arguments inside one `SUM(...)`.
const SUM_BATCH: usize = 20;

/// Spreadsheet column letters: 0 is `A`, 25 is `Z`, 26 is `AA`.
#[must_use]
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Spreadsheet reference for a data row and column. Row 1 is the header,
/// so data row 0 is spreadsheet row 2.
#[must_use]
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{}{}", column_name(col), row + 2)
}

/// Render a number the way literal cells show it: whole numbers without
/// a fraction, others in shortest round-trip form.
#[must_use]
pub fn format_number(value: f64, whole: bool) -> String {
    if whole && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:?}", value)
    }
}

/// Where each `(row, slot)` landed in a rendered table.
pub type Locations = HashMap<(RowId, String), (usize, usize)>;

/// What a formula needs to render itself.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// Argument separator: `,` or `;`.
    pub sep: &'a str,
    /// Cell locations of the table being rendered.
    pub locations: &'a Locations,
    /// Rows the references point into.
    pub arena: &'a RowArena,
}

enum Arg {
    Cell(usize, usize),
    Text(String),
}

impl RenderContext<'_> {
    fn locate(&self, r: &SlotRef) -> Option<(usize, usize)> {
        self.locations.get(&(r.row, r.slot.clone())).copied()
    }

    /// A reference, or its value when the referenced cell is not in the
    /// table.
    fn reference(&self, r: &SlotRef) -> String {
        match self.locate(r) {
            Some((row, col)) => cell_name(row, col),
            None => format_number(self.arena.value(r.row, &r.slot), true),
        }
    }

    fn sum(&self, refs: &[SlotRef]) -> String {
        if refs.is_empty() {
            return "0".to_string();
        }
        let args: Vec<Arg> = refs
            .iter()
            .map(|r| match self.locate(r) {
                Some((row, col)) => Arg::Cell(row, col),
                None => Arg::Text(format_number(self.arena.value(r.row, &r.slot), true)),
            })
            .collect();
        let items = collapse_ranges(&args);
        let inner = if items.len() > SUM_BATCH {
            items
                .chunks(SUM_BATCH)
                .map(|chunk| format!("SUM({})", chunk.join(self.sep)))
                .collect::<Vec<_>>()
                .join(self.sep)
        } else {
            items.join(self.sep)
        };
        format!("=SUM({})", inner)
    }
}

/// Merge runs of adjacent cells in one row or one column into ranges.
fn collapse_ranges(args: &[Arg]) -> Vec<String> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < args.len() {
        let Arg::Cell(r0, c0) = args[i] else {
            if let Arg::Text(t) = &args[i] {
                out.push(t.clone());
            }
            i += 1;
            continue;
        };
        let mut j = i + 1;
        let step = match args.get(j) {
            Some(Arg::Cell(r, c)) if *r == r0 && *c == c0 + 1 => Some((0, 1)),
            Some(Arg::Cell(r, c)) if *c == c0 && *r == r0 + 1 => Some((1, 0)),
            _ => None,
        };
        if let Some((dr, dc)) = step {
            let (mut pr, mut pc) = (r0, c0);
            while let Some(Arg::Cell(r, c)) = args.get(j) {
                if *r == pr + dr && *c == pc + dc {
                    pr = *r;
                    pc = *c;
                    j += 1;
                } else {
                    break;
                }
            }
            out.push(format!("{}:{}", cell_name(r0, c0), cell_name(pr, pc)));
        } else {
            out.push(cell_name(r0, c0));
        }
        i = j;
    }
    out
}

impl Formula {
    /// Numeric value.
    #[must_use]
    pub fn compute(&self, arena: &RowArena) -> f64 {
        let v = |r: &SlotRef| arena.value(r.row, &r.slot);
        match self {
            Formula::Sum(refs) | Formula::ColumnSum(refs) => refs.iter().map(v).sum(),
            Formula::FirstChild { child, fallback } => child.as_ref().map_or(*fallback, v),
            Formula::Precision { hyp_total, matched } => precision(v(hyp_total), v(matched)),
            Formula::Recall { ref_total, matched } => recall(v(ref_total), v(matched)),
            Formula::Fmeasure { precision, recall } => fmeasure(v(precision), v(recall)),
            Formula::Accuracy { test_toks, errors } => {
                let errs: Vec<f64> = errors.iter().map(v).collect();
                accuracy(v(test_toks), &errs)
            }
            Formula::ErrorRate { accuracy } => error_rate(v(accuracy)),
            Formula::Mean(x) | Formula::Variance(x) | Formula::StdDeviation(x) => *x,
        }
    }

    /// True when the value is a whole-number count.
    #[must_use]
    pub fn is_count(&self) -> bool {
        matches!(
            self,
            Formula::Sum(_) | Formula::ColumnSum(_) | Formula::FirstChild { .. }
        )
    }

    /// True for formulas that refer outside their own row, or carry
    /// precomputed values; a global summary turns these into literals.
    #[must_use]
    pub fn freezes_in_summary(&self) -> bool {
        matches!(
            self,
            Formula::ColumnSum(_)
                | Formula::FirstChild { .. }
                | Formula::Mean(_)
                | Formula::Variance(_)
                | Formula::StdDeviation(_)
        )
    }

    /// Spreadsheet text.
    #[must_use]
    pub fn render(&self, ctx: &RenderContext<'_>) -> String {
        let sep = ctx.sep;
        match self {
            Formula::Sum(refs) | Formula::ColumnSum(refs) => ctx.sum(refs),
            Formula::FirstChild { child, fallback } => match child {
                Some(r) => format!("={}", ctx.reference(r)),
                None => format_number(*fallback, true),
            },
            Formula::Precision { hyp_total, matched } => {
                let (h, m) = (ctx.reference(hyp_total), ctx.reference(matched));
                format!("=IF({h} = 0{sep}1.00{sep}IF({m} = 0{sep}0.0{sep}{m} / {h}))")
            }
            Formula::Recall { ref_total, matched } => {
                let (r, m) = (ctx.reference(ref_total), ctx.reference(matched));
                format!("=IF({r} = 0{sep}1.0{sep}IF({m} = 0{sep}0.0{sep}{m} / {r}))")
            }
            Formula::Fmeasure { precision, recall } => {
                let (p, r) = (ctx.reference(precision), ctx.reference(recall));
                format!("=IF(({p} + {r}) = 0{sep}0.0{sep}2.0 * (({p} * {r}) / ({p} + {r})))")
            }
            Formula::Accuracy { test_toks, errors } => {
                let t = ctx.reference(test_toks);
                let errs: Vec<String> = errors.iter().map(|e| ctx.reference(e)).collect();
                format!("=IF({t} = 0{sep}1.0{sep}({t} - {})/{t})", errs.join(" - "))
            }
            Formula::ErrorRate { accuracy } => format!("=(1 - {})", ctx.reference(accuracy)),
            Formula::Mean(x) | Formula::Variance(x) | Formula::StdDeviation(x) => {
                format_number(*x, false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
        assert_eq!(cell_name(0, 1), "B2");
    }

    #[test]
    fn test_metric_edge_cases() {
        assert_eq!(precision(0.0, 0.0), 1.0);
        assert_eq!(precision(4.0, 0.0), 0.0);
        assert_eq!(precision(4.0, 3.0), 0.75);
        assert_eq!(recall(0.0, 0.0), 1.0);
        assert_eq!(recall(2.0, 1.0), 0.5);
        assert_eq!(fmeasure(0.0, 0.0), 0.0);
        assert!((fmeasure(0.5, 1.0) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(accuracy(0.0, &[1.0]), 1.0);
        assert_eq!(accuracy(10.0, &[1.0, 2.0]), 0.7);
        assert!((error_rate(0.7) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_collapse_row_and_column_runs() {
        let args = vec![Arg::Cell(0, 1), Arg::Cell(0, 2), Arg::Cell(0, 3), Arg::Cell(4, 3)];
        assert_eq!(collapse_ranges(&args), vec!["B2:D2", "D6"]);
        let args = vec![Arg::Cell(0, 1), Arg::Cell(1, 1), Arg::Cell(3, 1), Arg::Text("7".into())];
        assert_eq!(collapse_ranges(&args), vec!["B2:B3", "B5", "7"]);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0, true), "3");
        assert_eq!(format_number(0.5, true), "0.5");
        assert_eq!(format_number(1.0, false), "1.0");
    }
}
