//! Pair records produced by the pairer.

use concord_core::{Annotation, AnnotationId, Document, Span};
use std::collections::BTreeSet;
use std::fmt;

/// Which document of a comparison an annotation comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    /// Reference document.
    Ref,
    /// Hypothesis document.
    Hyp,
}

impl Side {
    /// The other side.
    #[must_use]
    pub fn flip(self) -> Side {
        match self {
            Side::Ref => Side::Hyp,
            Side::Hyp => Side::Ref,
        }
    }

    /// Column prefix used in tables.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Side::Ref => "ref",
            Side::Hyp => "hyp",
        }
    }
}

/// Identity of an annotation within a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnKey {
    /// Owning document.
    pub side: Side,
    /// Arena index within that document.
    pub id: AnnotationId,
}

impl AnnKey {
    /// Reference-side key.
    #[must_use]
    pub fn reference(id: AnnotationId) -> Self {
        Self { side: Side::Ref, id }
    }

    /// Hypothesis-side key.
    #[must_use]
    pub fn hypothesis(id: AnnotationId) -> Self {
        Self { side: Side::Hyp, id }
    }
}

/// The two documents of a comparison.
#[derive(Debug, Clone, Copy)]
pub struct DocPair<'a> {
    /// Reference document.
    pub reference: &'a Document,
    /// Hypothesis document.
    pub hypothesis: &'a Document,
}

impl<'a> DocPair<'a> {
    /// Pair two documents.
    #[must_use]
    pub fn new(reference: &'a Document, hypothesis: &'a Document) -> Self {
        Self {
            reference,
            hypothesis,
        }
    }

    /// Document on one side.
    #[must_use]
    pub fn doc(&self, side: Side) -> &'a Document {
        match side {
            Side::Ref => self.reference,
            Side::Hyp => self.hypothesis,
        }
    }

    /// Annotation behind a key, if it exists.
    #[must_use]
    pub fn get(&self, key: AnnKey) -> Option<&'a Annotation> {
        self.doc(key.side).get(key.id)
    }
}

/// Clash token: labels differ.
pub const TAGCLASH: &str = "tagclash";
/// Clash token: labels differ only through an effective label attribute.
pub const COMPUTEDTAGCLASH: &str = "computedtagclash";
/// Clash token: one side extends past the other.
pub const OVERMARK: &str = "overmark";
/// Clash token: one side falls short of the other.
pub const UNDERMARK: &str = "undermark";
/// Clash token: spans cross.
pub const OVERLAP: &str = "overlap";
/// Clash token: set-valued attributes differ.
pub const SETCLASH: &str = "setclash";
/// Clash token: referenced annotations paired imperfectly.
pub const ANNCLASH: &str = "annclash";
/// Clash token: referenced annotations were never paired.
pub const ANNATTRIBUTENOTPAIRED: &str = "annattributenotpaired";
/// Clash token: no dimension explained the mismatch.
pub const UNKNOWNCLASH: &str = "unknownclash";

/// Outcome for one side of a pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Paired with a perfect score.
    Match,
    /// Reference with no hypothesis partner.
    Missing,
    /// Hypothesis with no reference partner.
    Spurious,
    /// Paired imperfectly, with the clash tokens from this side's view.
    Clash(BTreeSet<String>),
}

impl Status {
    /// Clash status with a single token.
    #[must_use]
    pub fn clash(token: &str) -> Self {
        Status::Clash(std::iter::once(token.to_string()).collect())
    }

    /// True for [`Status::Clash`].
    #[must_use]
    pub fn is_clash(&self) -> bool {
        matches!(self, Status::Clash(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Match => f.write_str("match"),
            Status::Missing => f.write_str("missing"),
            Status::Spurious => f.write_str("spurious"),
            Status::Clash(tokens) => {
                let joined: Vec<&str> = tokens.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

/// One side of a pair record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairSide {
    /// Effective label.
    pub label: String,
    /// Annotation in that side's document.
    pub ann: AnnotationId,
    /// Outcome from this side's view.
    pub status: Status,
}

/// Result of pairing: a reference, a hypothesis, or both.
///
/// A missing record has no hypothesis; a spurious record has no reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRecord {
    /// Reference side.
    pub reference: Option<PairSide>,
    /// Hypothesis side.
    pub hypothesis: Option<PairSide>,
}

impl PairRecord {
    /// A reference annotation nobody claimed.
    #[must_use]
    pub fn missing(label: impl Into<String>, ann: AnnotationId) -> Self {
        Self {
            reference: Some(PairSide {
                label: label.into(),
                ann,
                status: Status::Missing,
            }),
            hypothesis: None,
        }
    }

    /// A hypothesis annotation with no reference.
    #[must_use]
    pub fn spurious(label: impl Into<String>, ann: AnnotationId) -> Self {
        Self {
            reference: None,
            hypothesis: Some(PairSide {
                label: label.into(),
                ann,
                status: Status::Spurious,
            }),
        }
    }

    /// A paired reference and hypothesis.
    #[must_use]
    pub fn paired(reference: PairSide, hypothesis: PairSide) -> Self {
        Self {
            reference: Some(reference),
            hypothesis: Some(hypothesis),
        }
    }

    /// True when both sides are present and matched.
    #[must_use]
    pub fn is_match(&self) -> bool {
        matches!(&self.reference, Some(PairSide { status: Status::Match, .. }))
    }

    /// Status of the side that is present, reference first. This is the
    /// value of the detail table's `type` column.
    #[must_use]
    pub fn type_name(&self) -> String {
        self.reference
            .as_ref()
            .or(self.hypothesis.as_ref())
            .map(|s| s.status.to_string())
            .unwrap_or_default()
    }
}

/// A pair record restricted to an elementary interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPairRecord {
    /// The pairing within the interval.
    pub pair: PairRecord,
    /// The interval.
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let mut tokens = BTreeSet::new();
        tokens.insert(UNDERMARK.to_string());
        tokens.insert(TAGCLASH.to_string());
        assert_eq!(Status::Clash(tokens).to_string(), "tagclash,undermark");
        assert_eq!(Status::Missing.to_string(), "missing");
    }

    #[test]
    fn test_constructors_keep_one_side() {
        let m = PairRecord::missing("PERSON", AnnotationId(0));
        assert!(m.hypothesis.is_none());
        assert_eq!(m.type_name(), "missing");
        let s = PairRecord::spurious("PERSON", AnnotationId(1));
        assert!(s.reference.is_none());
        assert_eq!(s.type_name(), "spurious");
    }
}
